//! Tracing initialization for hosts.
//!
//! The kernel itself only emits `tracing` events; installing a subscriber is
//! the host's business. This helper wires `KernelConfig::log_level` into an
//! env-filtered subscriber for hosts that don't bring their own.

use tracing_subscriber::EnvFilter;

use crate::config::KernelConfig;

/// Install a global subscriber honoring the config's log level.
///
/// `RUST_LOG` still wins when set. Calling this twice is harmless; the
/// second installation is ignored.
pub fn init(config: &KernelConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("doxa={}", config.log_level.directive())));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
