//! Fuzz target for workflow config parsing.
//!
//! Feeds arbitrary byte sequences to `WorkflowConfig::from_toml()` and
//! verifies it never panics. A config that parses must also build its
//! calculation specs without panicking.
//!
//! Run with: `cargo +nightly fuzz run fuzz_config_parse`

#![no_main]
use libfuzzer_sys::fuzz_target;
use scatter_gather::factory::build_task_specs;
use scatter_gather::WorkflowConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = WorkflowConfig::from_toml(s) {
            // Keep allocation bounded; huge counts are valid but slow.
            if config.num_calculations <= 4096 {
                let _ = build_task_specs(config.num_calculations, config.base_x, config.base_y);
            }
        }
    }
});
