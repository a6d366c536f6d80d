//! Logger bootstrap.
//!
//! The engine logs through the `log` facade; hosts that already install
//! their own logger can skip this entirely.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes `env_logger` once, respecting `RUST_LOG`.
///
/// Safe to call multiple times; later calls are no-ops. Tests use this to
/// get engine output without fighting over the global logger.
pub fn init() {
    INIT.call_once(|| {
        env_logger::Builder::from_default_env()
            .format_timestamp_millis()
            .try_init()
            .ok();
    });
}
