//! Log and trace initialization.
//!
//! Library code logs through the `log` facade. Embedding applications
//! that already run a `tracing` subscriber need nothing from here;
//! standalone hosts call [`init`] once to get a formatted subscriber
//! with `log` records routed into it.

use tracing_log::LogTracer;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global subscriber honoring `RUST_LOG`, defaulting to
/// `info`. Calling it more than once is a no-op.
pub fn init() {
    init_with_filter("info");
}

/// Like [`init`] but with an explicit default filter directive.
pub fn init_with_filter(default_filter: &str) {
    if LogTracer::init().is_err() {
        // A logger is already installed; leave it alone.
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        log::debug!("Global tracing subscriber was already set");
    }
}
