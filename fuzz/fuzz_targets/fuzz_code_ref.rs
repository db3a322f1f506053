//! Fuzz target for executable reference parsing.
//!
//! Anything that parses must print back to a string that parses to the
//! same reference.
//!
//! Run with: `cargo +nightly fuzz run fuzz_code_ref`

#![no_main]
use libfuzzer_sys::fuzz_target;
use scatter_gather::CodeRef;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(code) = s.parse::<CodeRef>() {
            let printed = code.to_string();
            assert_eq!(printed.parse::<CodeRef>().ok(), Some(code));
        }
    }
});
