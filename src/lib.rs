//! tiltwatch - handheld tilt monitoring core
//!
//! Converts raw accelerometer readings into tilt angles, detects tilt
//! excursions against a configurable threshold during a timed stable
//! period, drives haptic feedback scaled to tilt magnitude, and persists
//! each session's event timeline.
//!
//! The [`engine::SessionEngine`] is the entry point: construct it with a
//! preference store and the device backends, subscribe to its broadcast
//! channels, and drive it through the recording lifecycle.

pub mod angle;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod events;
pub mod store;
pub mod timer;
pub mod vibration;

pub use engine::{SessionEngine, StatusSnapshot};

/// Initialize logging for binaries and integration tests.
///
/// `RUST_LOG` controls the filter; `log` macro output is routed through
/// the tracing subscriber. Safe to call more than once.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
