//! `tracing`-subscriber wiring (SPEC_FULL §0's ambient logging layer).
//! Parsing, CLI wiring, and log-file destinations are the host
//! application's job; this crate only owns a sensible library default.

use tracing_subscriber::EnvFilter;

/// Install a process-wide `tracing` subscriber reading `RUST_LOG`
/// (defaulting to `info`), writing to stderr. Safe to call more than
/// once; subsequent calls are no-ops.
pub fn init_default() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
