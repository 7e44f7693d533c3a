// Radar vibration scheduler
//
// While tilted (and radar mode is on), issues repeating haptic pulses
// whose rate and duration scale with tilt magnitude. Calibration points:
// a near-threshold tilt (~0.5 deg of magnitude) pulses about once a
// second, a 5 deg tilt about every 100 ms, linearly interpolated and then
// clamped to [50, 1000] ms. Haptic failures are swallowed; the timing
// logic is not correctness-critical.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::debug;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::engine::backend::HapticBackend;

/// Repeating check period while active
pub const SCHEDULER_TICK_MS: u64 = 100;

/// Pulse interval for a given tilt magnitude, in milliseconds.
///
/// `clamp(1050 - magnitude * 190, 50, 1000)`: monotonically non-increasing
/// in magnitude and always within [50, 1000].
pub fn pulse_interval_ms(magnitude: f64) -> u64 {
    (1050.0 - magnitude * 190.0).clamp(50.0, 1000.0) as u64
}

/// Pulse duration for a given intensity and tilt magnitude, in
/// milliseconds: `clamp(intensity * min(1, magnitude / 10) / 10, 50, 1000)`.
pub fn pulse_duration_ms(intensity: u32, magnitude: f64) -> u64 {
    let factor = (magnitude / 10.0).min(1.0);
    (intensity as f64 * factor / 10.0).clamp(50.0, 1000.0) as u64
}

/// Duration of the immediate pulse fired on activation.
pub fn initial_pulse_ms(intensity: u32) -> u64 {
    (intensity / 10) as u64
}

/// Result of probing the session for the scheduler's stop condition.
///
/// `Some(magnitude)` while still tilted (checked against the baseline-
/// relative angles, consistent with the state machine), `None` once level.
pub type TiltProbe = Arc<dyn Fn() -> Option<f64> + Send + Sync>;

/// Magnitude-scaled repeating pulse scheduler.
///
/// `activate` is a no-op when already active; `deactivate` is safe to call
/// when inactive. The repeating check stops itself as soon as the probe
/// reports level.
pub struct VibrationScheduler {
    active: AtomicBool,
    interval_ms: AtomicU64,
    /// Wall-clock ms of the last pulse, 0 when none fired yet
    last_pulse_wall_ms: AtomicU64,
    last_pulse: Mutex<Option<Instant>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl VibrationScheduler {
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            interval_ms: AtomicU64::new(1000),
            last_pulse_wall_ms: AtomicU64::new(0),
            last_pulse: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn current_interval_ms(&self) -> u64 {
        self.interval_ms.load(Ordering::SeqCst)
    }

    /// Wall-clock ms of the most recent pulse, if any.
    pub fn last_pulse_wall_ms(&self) -> Option<u64> {
        match self.last_pulse_wall_ms.load(Ordering::SeqCst) {
            0 => None,
            ms => Some(ms),
        }
    }

    /// Recompute the pulse interval; called whenever the tilt magnitude
    /// changes while tilted.
    pub fn update_magnitude(&self, magnitude: f64) {
        if !self.is_active() {
            return;
        }
        self.interval_ms
            .store(pulse_interval_ms(magnitude), Ordering::SeqCst);
    }

    /// Begin pulsing: one immediate pulse of `intensity / 10` ms, then a
    /// repeating check every 100 ms.
    pub fn activate(
        self: Arc<Self>,
        runtime: &Handle,
        intensity: u32,
        initial_magnitude: f64,
        haptics: Arc<dyn HapticBackend>,
        probe: TiltProbe,
        wall_ms: u64,
    ) {
        if self.active.swap(true, Ordering::SeqCst) {
            return;
        }
        self.interval_ms
            .store(pulse_interval_ms(initial_magnitude), Ordering::SeqCst);

        // Immediate pulse; failure is ignored by design of the haptic path.
        if haptics.vibrate(initial_pulse_ms(intensity)).is_err() {
            debug!("Initial vibration pulse failed; continuing");
        }
        self.last_pulse_wall_ms.store(wall_ms, Ordering::SeqCst);
        if let Ok(mut last) = self.last_pulse.lock() {
            *last = Some(Instant::now());
        }
        debug!("Radar vibration activated, intensity={}", intensity);

        let scheduler = Arc::clone(&self);
        let task = runtime.spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(SCHEDULER_TICK_MS)).await;
                if !scheduler.active.load(Ordering::SeqCst) {
                    return;
                }
                let Some(magnitude) = probe() else {
                    debug!("Back within threshold; radar vibration stopping itself");
                    scheduler.active.store(false, Ordering::SeqCst);
                    return;
                };
                scheduler
                    .interval_ms
                    .store(pulse_interval_ms(magnitude), Ordering::SeqCst);
                scheduler.try_pulse(&*haptics, intensity, magnitude);
            }
        });
        if let Ok(mut slot) = self.task.lock() {
            *slot = Some(task);
        }
    }

    /// Fire a pulse if the current interval has elapsed since the last one.
    fn try_pulse(&self, haptics: &dyn HapticBackend, intensity: u32, magnitude: f64) {
        let interval = Duration::from_millis(self.interval_ms.load(Ordering::SeqCst));
        let now = Instant::now();
        let due = match self.last_pulse.lock() {
            Ok(last) => match *last {
                Some(at) => now.duration_since(at) >= interval,
                None => true,
            },
            Err(_) => return,
        };
        if !due {
            return;
        }

        let duration = pulse_duration_ms(intensity, magnitude);
        if haptics.vibrate(duration).is_err() {
            // Best-effort feedback; the timing logic continues regardless.
            debug!("Vibration pulse failed; continuing");
        }
        if let Ok(mut last) = self.last_pulse.lock() {
            *last = Some(now);
        }
        debug!(
            "Vibration pulse: interval={}ms duration={}ms magnitude={:.2}",
            interval.as_millis(),
            duration,
            magnitude
        );
    }

    /// Stop pulsing and clear scheduler state. Idempotent.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
        if let Ok(mut slot) = self.task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
        if let Ok(mut last) = self.last_pulse.lock() {
            *last = None;
        }
        self.last_pulse_wall_ms.store(0, Ordering::SeqCst);
    }
}

impl Default for VibrationScheduler {
    fn default() -> Self {
        Self::new()
    }
}
