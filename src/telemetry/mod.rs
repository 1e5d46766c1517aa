//! Tracing initialization helpers.
//!
//! The engine itself only emits `tracing` events and spans; binaries and
//! tests opt into output by installing a subscriber, typically through
//! [`init_tracing`].

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Install a global fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Idempotent; safe to call from every test.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    });
}
