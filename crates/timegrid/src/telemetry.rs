//! Tracing and log initialization.
//!
//! The crate logs through both the `log` facade and `tracing` spans.
//! [`init_tracing`] installs a fmt subscriber with an env-filter and
//! bridges `log` records into it. Safe to call more than once; later
//! calls are no-ops.

use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber. `default_filter` applies when
/// `RUST_LOG` is unset, e.g. `"info,timegrid=debug"`.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
