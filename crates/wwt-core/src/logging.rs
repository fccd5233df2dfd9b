//! Process-wide log output
//!
//! Library code only emits `tracing` events. Hosts that want them printed
//! call [`init_logging`] once; the subscriber is installed the first time and
//! later calls leave it alone.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Install a `fmt` subscriber filtered by `RUST_LOG` or the configured filter
///
/// Returns `true` only for the call that installed the subscriber.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let mut installed_now = false;
    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.filter))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        installed_now = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(config.ansi)
            .with_target(false)
            .try_init()
            .is_ok();
        installed_now
    });
    installed_now
}

/// Whether [`init_logging`] has installed a subscriber in this process
pub fn logging_initialized() -> bool {
    INSTALLED.get().copied().unwrap_or(false)
}
