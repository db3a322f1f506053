//! Logging setup for binaries and demos.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// Report lines are emitted under the `scatter_gather::report` target, so
/// `RUST_LOG=scatter_gather::report=info` shows only the process report.
///
/// # Panics
///
/// If a global subscriber has already been installed.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
