//! Process-wide tracing setup.
//!
//! The library only emits `tracing` events; binaries call [`init`] once to
//! print them.

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::EnvFilter;

static INIT: OnceCell<()> = OnceCell::new();

/// Resolve the log filter: `QASTREAM_LOG_LEVEL`, then `RUST_LOG`, then `info`.
fn resolve_env_filter() -> EnvFilter {
    if let Ok(level) = std::env::var("QASTREAM_LOG_LEVEL") {
        if let Ok(filter) = EnvFilter::try_new(level) {
            return filter;
        }
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a compact stderr subscriber once per process.
///
/// Later calls, or a subscriber installed elsewhere, are left alone.
pub fn init() {
    INIT.get_or_init(|| {
        let console_layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr);
        let _ = tracing_subscriber::registry()
            .with(resolve_env_filter())
            .with(console_layer)
            .try_init();
    });
}
