//! Tracing setup for binaries embedding this crate.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a global subscriber writing to stderr.
///
/// Filtering follows `RUST_LOG`, defaulting to `info` for this crate and
/// `warn` for everything else. Safe to call more than once; only the first
/// call installs anything.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,splicer=info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    });
}
