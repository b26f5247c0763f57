//! Tracing setup helpers for binaries and tests

use tracing_subscriber::EnvFilter;

/// Initialize tracing from `RUST_LOG`, defaulting to `info`
///
/// Library code only emits through `tracing` macros; embedding applications
/// that install their own subscriber should skip this.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

/// Like [`init`], but safe to call repeatedly (tests, examples)
pub fn try_init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .try_init();
}
