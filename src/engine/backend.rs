//! Collaborator traits for the session engine.
//!
//! The engine talks to the outside world through these seams: a push-style
//! accelerometer, a fire-and-forget haptic output, an alert sink for modal
//! and status text, and a time source. Stub implementations let the whole
//! engine run in tests and in the CLI simulator without device hardware.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::error::SensorError;

/// One raw accelerometer reading, unitless, roughly [-1, 1] per axis
/// under gravity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Callback invoked for every pushed sensor reading.
pub type SampleListener = Arc<dyn Fn(RawReading) + Send + Sync>;

/// Push-style accelerometer subscription. Start and stop are idempotent.
pub trait AccelerometerBackend: Send + Sync {
    fn start(&self, listener: SampleListener) -> Result<(), SensorError>;
    fn stop(&self);
    fn is_monitoring(&self) -> bool;
}

/// Fire-and-forget haptic output; may fail when unsupported or
/// unauthorized, and callers treat failures as best-effort.
pub trait HapticBackend: Send + Sync {
    fn vibrate(&self, duration_ms: u64) -> Result<(), SensorError>;
    fn is_available(&self) -> bool;
}

/// UI notification sink: a blocking modal acknowledgement and
/// non-blocking status text.
pub trait AlertSink: Send + Sync {
    fn modal(&self, title: &str, message: &str);
    fn status(&self, message: &str);
}

/// Monotonic plus wall-clock time, injectable for deterministic tests.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
    /// Milliseconds since the Unix epoch.
    fn wall_ms(&self) -> u64;
}

/// Default time source backed by the system clocks.
#[derive(Debug, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

// ============================================================================
// STUBS
// ============================================================================

/// Stub accelerometer driven by explicit `push` calls.
pub struct StubAccelerometer {
    listener: Mutex<Option<SampleListener>>,
    monitoring: AtomicBool,
    supported: bool,
}

impl StubAccelerometer {
    pub fn new() -> Self {
        Self {
            listener: Mutex::new(None),
            monitoring: AtomicBool::new(false),
            supported: true,
        }
    }

    /// A device without an accelerometer.
    pub fn unsupported() -> Self {
        Self {
            listener: Mutex::new(None),
            monitoring: AtomicBool::new(false),
            supported: false,
        }
    }

    /// Deliver one reading to the subscribed listener, synchronously on
    /// the calling thread.
    pub fn push(&self, x: f64, y: f64, z: f64) {
        if !self.monitoring.load(Ordering::SeqCst) {
            return;
        }
        let listener = match self.listener.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        if let Some(listener) = listener {
            listener(RawReading { x, y, z });
        }
    }
}

impl Default for StubAccelerometer {
    fn default() -> Self {
        Self::new()
    }
}

impl AccelerometerBackend for StubAccelerometer {
    fn start(&self, listener: SampleListener) -> Result<(), SensorError> {
        if !self.supported {
            return Err(SensorError::NotSupported);
        }
        if self.monitoring.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Ok(mut slot) = self.listener.lock() {
            *slot = Some(listener);
        }
        Ok(())
    }

    fn stop(&self) {
        self.monitoring.store(false, Ordering::SeqCst);
        if let Ok(mut slot) = self.listener.lock() {
            *slot = None;
        }
    }

    fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }
}

/// Haptic stub recording every pulse duration it receives.
pub struct RecordingHaptics {
    pulses: Mutex<Vec<u64>>,
    supported: bool,
}

impl RecordingHaptics {
    pub fn new() -> Self {
        Self {
            pulses: Mutex::new(Vec::new()),
            supported: true,
        }
    }

    /// A device without vibration hardware.
    pub fn unsupported() -> Self {
        Self {
            pulses: Mutex::new(Vec::new()),
            supported: false,
        }
    }

    pub fn pulses(&self) -> Vec<u64> {
        self.pulses.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Default for RecordingHaptics {
    fn default() -> Self {
        Self::new()
    }
}

impl HapticBackend for RecordingHaptics {
    fn vibrate(&self, duration_ms: u64) -> Result<(), SensorError> {
        if !self.supported {
            return Err(SensorError::VibrationUnavailable);
        }
        if let Ok(mut pulses) = self.pulses.lock() {
            pulses.push(duration_ms);
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.supported
    }
}

/// Alert sink recording modal and status messages.
#[derive(Default)]
pub struct RecordingAlertSink {
    modals: Mutex<Vec<String>>,
    statuses: Mutex<Vec<String>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modals(&self) -> Vec<String> {
        self.modals.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl AlertSink for RecordingAlertSink {
    fn modal(&self, title: &str, message: &str) {
        if let Ok(mut modals) = self.modals.lock() {
            modals.push(format!("{}: {}", title, message));
        }
    }

    fn status(&self, message: &str) {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.push(message.to_string());
        }
    }
}

/// Manually advanced time source for deterministic tests.
pub struct StubTimeSource {
    origin: Instant,
    wall_origin_ms: u64,
    offset_ms: AtomicU64,
}

impl StubTimeSource {
    pub fn new(wall_origin_ms: u64) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin_ms,
            offset_ms: AtomicU64::new(0),
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.offset_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl TimeSource for StubTimeSource {
    fn now(&self) -> Instant {
        self.origin + std::time::Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }

    fn wall_ms(&self) -> u64 {
        self.wall_origin_ms + self.offset_ms.load(Ordering::SeqCst)
    }
}
