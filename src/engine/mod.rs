//! SessionEngine: tilt-monitoring orchestration layer.
//!
//! Owns the session state behind a single mutex, wires the accelerometer
//! stream through the angle filter, baseline tracker, and tilt state
//! machine, sequences the delay/stable timer chain, and drives the
//! vibration scheduler and blink cue. UI collaborators subscribe to
//! broadcast channels instead of binding to mutable fields.

use std::sync::{Arc, Mutex, Weak};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::broadcast;

use crate::angle::{filter_reading, BaselineTracker, TiltAngles};
use crate::config::MonitorConfig;
use crate::detect::{TiltStateMachine, TiltStatus, TiltTransition};
use crate::error::{log_sensor_error, log_storage_error, ErrorCode, SensorError, StorageError};
use crate::events::{EventKind, EventLog, TiltEvent, TiltRecord};
use crate::store::{records, PreferenceStore};
use crate::timer::{format_hms, spawn_blink, spawn_countdown, TimerColor, TimerHandle};
use crate::vibration::{TiltProbe, VibrationScheduler};

pub mod backend;
pub mod broadcasts;

use backend::{
    AccelerometerBackend, AlertSink, HapticBackend, RawReading, SampleListener, SystemTimeSource,
    TimeSource,
};
use broadcasts::BroadcastChannelManager;

/// One-shot pulse fired on tilt start when radar mode is off
const TILT_ALERT_PULSE_MS: u64 = 500;

/// Pulse fired when the stable time ends
const STABLE_END_PULSE_MS: u64 = 1000;

const TIMER_TITLE_STABLE: &str = "Stable time";
const TIMER_TITLE_COUNTDOWN: &str = "Countdown";
const TIMER_TITLE_RECORDING: &str = "Recording";
const TIMER_TEXT_UNBOUNDED: &str = "∞";

/// Snapshot of session state broadcast to UI subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub x_angle: f64,
    pub y_angle: f64,
    pub status: TiltStatus,
    pub is_recording: bool,
    pub is_stable_period: bool,
    pub is_tilted: bool,
    pub tilt_magnitude: f64,
    /// Wall-clock ms of the last haptic pulse, if any
    pub last_vibration_ms: Option<u64>,
    pub timer_title: String,
    pub timer_text: String,
    pub timer_color: TimerColor,
}

/// Effect of one processed sample, handled outside the core lock.
enum TransitionEffect {
    Started { event: TiltEvent, magnitude: f64 },
    Ended { event: TiltEvent },
    Refresh { magnitude: f64 },
}

/// Session state: single writer, guarded by one mutex.
struct SessionCore {
    config: MonitorConfig,
    baseline: BaselineTracker,
    machine: TiltStateMachine,
    log: EventLog,
    is_recording: bool,
    is_stable_period: bool,
    recording_start_wall_ms: Option<u64>,
    session_start_wall_ms: Option<u64>,
    last_angles: TiltAngles,
    timer_title: String,
    timer_text: String,
    timer_color: TimerColor,
}

impl SessionCore {
    fn new(config: MonitorConfig) -> Self {
        let threshold = config.threshold.degrees();
        let timer_text = format_hms(config.stable_seconds as u64);
        Self {
            config,
            baseline: BaselineTracker::new(),
            machine: TiltStateMachine::new(threshold),
            log: EventLog::new(),
            is_recording: false,
            is_stable_period: false,
            recording_start_wall_ms: None,
            session_start_wall_ms: None,
            last_angles: TiltAngles::default(),
            timer_title: TIMER_TITLE_STABLE.to_string(),
            timer_text,
            timer_color: TimerColor::Normal,
        }
    }

    fn make_event(&self, kind: EventKind, rel_x: f64, rel_y: f64, wall_ms: u64) -> TiltEvent {
        TiltEvent {
            absolute_ms: wall_ms,
            relative_ms: wall_ms.saturating_sub(self.recording_start_wall_ms.unwrap_or(wall_ms)),
            stable_offset_ms: wall_ms
                .saturating_sub(self.session_start_wall_ms.unwrap_or(wall_ms)),
            x_angle: rel_x,
            y_angle: rel_y,
            kind,
            is_relative: self.baseline.is_relative(),
        }
    }

    /// Run one sample through the state machine.
    fn process_sample(&mut self, angles: TiltAngles, wall_ms: u64) -> Option<TransitionEffect> {
        self.last_angles = angles;
        if !self.is_stable_period {
            return None;
        }

        let (rel_x, rel_y) = self.baseline.to_relative(angles.x, angles.y);
        match self.machine.evaluate(rel_x, rel_y) {
            TiltTransition::Started => {
                let event = self.make_event(EventKind::Start, rel_x, rel_y, wall_ms);
                let record = TiltRecord {
                    start_ms: wall_ms,
                    end_ms: None,
                    relative_ms: wall_ms
                        .saturating_sub(self.session_start_wall_ms.unwrap_or(wall_ms)),
                    duration_ms: None,
                    x_angle: rel_x,
                    y_angle: rel_y,
                    is_relative: self.baseline.is_relative(),
                };
                self.log.open_record(record, event.clone());
                Some(TransitionEffect::Started {
                    event,
                    magnitude: self.machine.magnitude(),
                })
            }
            TiltTransition::Ended => {
                let event = self.make_event(EventKind::End, rel_x, rel_y, wall_ms);
                self.log.close_record(wall_ms, event.clone());
                Some(TransitionEffect::Ended { event })
            }
            TiltTransition::StillTilted => Some(TransitionEffect::Refresh {
                magnitude: self.machine.magnitude(),
            }),
            TiltTransition::StillLevel => None,
        }
    }

    /// Direct re-check for the vibration scheduler's stop condition,
    /// against the baseline-relative angles (consistent with the state
    /// machine).
    fn still_tilted_magnitude(&self) -> Option<f64> {
        if !self.is_stable_period || !self.machine.is_tilted() {
            return None;
        }
        let (rel_x, rel_y) = self
            .baseline
            .to_relative(self.last_angles.x, self.last_angles.y);
        let threshold = self.machine.threshold_deg();
        if rel_x.abs() >= threshold || rel_y.abs() >= threshold {
            Some(crate::detect::tilt_magnitude(threshold, rel_x, rel_y))
        } else {
            None
        }
    }

    /// Close a tilt excursion left open when recording halts, so stored
    /// timelines always pair Start with End.
    fn close_open_excursion(&mut self, wall_ms: u64) -> Option<TiltEvent> {
        if !self.machine.is_tilted() || !self.log.has_open_record() {
            return None;
        }
        let (rel_x, rel_y) = self
            .baseline
            .to_relative(self.last_angles.x, self.last_angles.y);
        let event = self.make_event(EventKind::End, rel_x, rel_y, wall_ms);
        self.log.close_record(wall_ms, event.clone());
        Some(event)
    }

    fn snapshot(&self, last_vibration_ms: Option<u64>) -> StatusSnapshot {
        let (rel_x, rel_y) = self
            .baseline
            .to_relative(self.last_angles.x, self.last_angles.y);
        StatusSnapshot {
            x_angle: self.last_angles.x,
            y_angle: self.last_angles.y,
            status: TiltStatus::classify(
                self.config.threshold.degrees(),
                rel_x,
                rel_y,
                self.baseline.is_relative(),
            ),
            is_recording: self.is_recording,
            is_stable_period: self.is_stable_period,
            is_tilted: self.machine.is_tilted(),
            tilt_magnitude: self.machine.magnitude(),
            last_vibration_ms,
            timer_title: self.timer_title.clone(),
            timer_text: self.timer_text.clone(),
            timer_color: self.timer_color,
        }
    }
}

/// Timer tasks need a runtime; attach to the caller's when present,
/// otherwise own a small one.
enum RuntimeHolder {
    Attached(Handle),
    Owned(Runtime),
}

impl RuntimeHolder {
    fn acquire() -> Self {
        match Handle::try_current() {
            Ok(handle) => RuntimeHolder::Attached(handle),
            Err(_) => RuntimeHolder::Owned(
                Builder::new_multi_thread()
                    .worker_threads(1)
                    .enable_all()
                    .build()
                    .expect("Failed to create Tokio runtime for session timers"),
            ),
        }
    }

    fn handle(&self) -> Handle {
        match self {
            RuntimeHolder::Attached(handle) => handle.clone(),
            RuntimeHolder::Owned(runtime) => runtime.handle().clone(),
        }
    }
}

fn broadcast_status(
    core: &Mutex<SessionCore>,
    vibration: &VibrationScheduler,
    tx: &broadcast::Sender<StatusSnapshot>,
) {
    if let Ok(core) = core.lock() {
        let _ = tx.send(core.snapshot(vibration.last_pulse_wall_ms()));
    }
}

/// SessionEngine orchestrates monitoring and recording sessions.
pub struct SessionEngine {
    store: Arc<dyn PreferenceStore>,
    accel: Arc<dyn AccelerometerBackend>,
    haptics: Arc<dyn HapticBackend>,
    alerts: Arc<dyn AlertSink>,
    time: Arc<dyn TimeSource>,
    runtime: RuntimeHolder,
    core: Arc<Mutex<SessionCore>>,
    broadcasts: BroadcastChannelManager,
    vibration: Arc<VibrationScheduler>,
    countdown: Mutex<Option<TimerHandle>>,
    blink: Mutex<Option<TimerHandle>>,
    status_tx: broadcast::Sender<StatusSnapshot>,
    event_tx: broadcast::Sender<TiltEvent>,
    /// Self-reference for timer completion callbacks
    weak: Weak<SessionEngine>,
}

impl SessionEngine {
    pub fn new(
        store: Arc<dyn PreferenceStore>,
        accel: Arc<dyn AccelerometerBackend>,
        haptics: Arc<dyn HapticBackend>,
        alerts: Arc<dyn AlertSink>,
    ) -> Arc<Self> {
        Self::with_time_source(store, accel, haptics, alerts, Arc::new(SystemTimeSource))
    }

    pub fn with_time_source(
        store: Arc<dyn PreferenceStore>,
        accel: Arc<dyn AccelerometerBackend>,
        haptics: Arc<dyn HapticBackend>,
        alerts: Arc<dyn AlertSink>,
        time: Arc<dyn TimeSource>,
    ) -> Arc<Self> {
        let config = MonitorConfig::load(&*store);
        let broadcasts = BroadcastChannelManager::new();
        let status_tx = broadcasts.init_status();
        let event_tx = broadcasts.init_tilt_events();

        Arc::new_cyclic(|weak| Self {
            store,
            accel,
            haptics,
            alerts,
            time,
            runtime: RuntimeHolder::acquire(),
            core: Arc::new(Mutex::new(SessionCore::new(config))),
            broadcasts,
            vibration: Arc::new(VibrationScheduler::new()),
            countdown: Mutex::new(None),
            blink: Mutex::new(None),
            status_tx,
            event_tx,
            weak: weak.clone(),
        })
    }

    // ========================================================================
    // SUBSCRIPTIONS
    // ========================================================================

    pub fn subscribe_status(&self) -> Option<broadcast::Receiver<StatusSnapshot>> {
        self.broadcasts.subscribe_status()
    }

    pub fn subscribe_tilt_events(&self) -> Option<broadcast::Receiver<TiltEvent>> {
        self.broadcasts.subscribe_tilt_events()
    }

    /// Current session state, for polling consumers.
    pub fn snapshot(&self) -> Option<StatusSnapshot> {
        let core = self.core.lock().ok()?;
        Some(core.snapshot(self.vibration.last_pulse_wall_ms()))
    }

    // ========================================================================
    // SENSOR LIFECYCLE
    // ========================================================================

    /// Subscribe to the accelerometer stream. Idempotent; a missing
    /// sensor surfaces a status message and leaves detection disabled.
    pub fn start_sensor(&self) -> Result<(), SensorError> {
        let listener = self.make_listener();
        match self.accel.start(listener) {
            Ok(()) => {
                info!("Accelerometer monitoring started");
                Ok(())
            }
            Err(err) => {
                log_sensor_error(&err, "start_sensor");
                self.alerts.status(&err.message());
                Err(err)
            }
        }
    }

    /// Unsubscribe from the accelerometer stream. Idempotent.
    pub fn stop_sensor(&self) {
        self.accel.stop();
    }

    fn restart_sensor(&self) {
        if self.accel.is_monitoring() {
            self.accel.stop();
        }
        let _ = self.start_sensor();
    }

    fn make_listener(&self) -> SampleListener {
        let core = Arc::clone(&self.core);
        let vibration = Arc::clone(&self.vibration);
        let haptics = Arc::clone(&self.haptics);
        let time = Arc::clone(&self.time);
        let status_tx = self.status_tx.clone();
        let event_tx = self.event_tx.clone();
        let runtime = self.runtime.handle();

        let probe: TiltProbe = {
            let core = Arc::clone(&self.core);
            Arc::new(move || core.lock().ok().and_then(|c| c.still_tilted_magnitude()))
        };

        Arc::new(move |reading: RawReading| {
            let angles = filter_reading(reading.x, reading.y);
            let wall_ms = time.wall_ms();

            let (effect, vibration_cfg) = match core.lock() {
                Ok(mut guard) => {
                    let effect = guard.process_sample(angles, wall_ms);
                    let cfg = (
                        guard.config.vibration_enabled,
                        guard.config.radar_vibration_enabled,
                        guard.config.vibration_intensity,
                    );
                    (effect, cfg)
                }
                Err(_) => {
                    warn!("Session state lock poisoned; dropping sample");
                    return;
                }
            };

            let (vibration_enabled, radar_enabled, intensity) = vibration_cfg;
            match effect {
                Some(TransitionEffect::Started { event, magnitude }) => {
                    let _ = event_tx.send(event);
                    if radar_enabled && vibration_enabled && haptics.is_available() {
                        Arc::clone(&vibration).activate(
                            &runtime,
                            intensity,
                            magnitude,
                            Arc::clone(&haptics),
                            Arc::clone(&probe),
                            wall_ms,
                        );
                    } else if vibration_enabled && !radar_enabled {
                        // Single alert pulse; skipped silently when the
                        // haptic path is unavailable.
                        let _ = haptics.vibrate(TILT_ALERT_PULSE_MS);
                    }
                }
                Some(TransitionEffect::Ended { event }) => {
                    let _ = event_tx.send(event);
                    vibration.deactivate();
                }
                Some(TransitionEffect::Refresh { magnitude }) => {
                    vibration.update_magnitude(magnitude);
                }
                None => {}
            }

            broadcast_status(&core, &vibration, &status_tx);
        })
    }

    // ========================================================================
    // RECORDING LIFECYCLE
    // ========================================================================

    /// Start a recording session: reload config, clear the log, capture
    /// the baseline, then run the delay countdown (if configured) into
    /// the stable period.
    pub fn start_recording(&self) {
        self.cancel_timers(true);
        self.vibration.deactivate();

        let delay_seconds = match self.core.lock() {
            Ok(mut core) => {
                core.config = MonitorConfig::load(&*self.store);
                core.log.clear();
                let wall_ms = self.time.wall_ms();
                core.recording_start_wall_ms = Some(wall_ms);
                core.session_start_wall_ms = Some(wall_ms);

                let (x, y) = (core.last_angles.x, core.last_angles.y);
                let relative = core.config.relative_baseline;
                core.baseline.capture(x, y, relative);
                let threshold = core.config.threshold.degrees();
                core.machine.reset(threshold);

                core.is_recording = true;
                core.is_stable_period = false;
                core.timer_color = TimerColor::Normal;
                core.config.delay_seconds
            }
            Err(_) => {
                warn!("Session state lock poisoned; cannot start recording");
                return;
            }
        };

        info!("Recording started (delay={}s)", delay_seconds);
        if delay_seconds > 0 {
            self.set_timer(TIMER_TITLE_COUNTDOWN, format_hms(delay_seconds as u64));
            let weak = self.weak.clone();
            let handle = spawn_countdown(
                &self.runtime.handle(),
                delay_seconds,
                self.make_timer_tick(),
                move || {
                    if let Some(engine) = weak.upgrade() {
                        engine.begin_stable_period();
                    }
                },
            );
            if let Ok(mut slot) = self.countdown.lock() {
                *slot = Some(handle);
            }
        } else {
            self.begin_stable_period();
        }
        broadcast_status(&self.core, &self.vibration, &self.status_tx);
    }

    /// Enter the stable period: bounded by a countdown, or unbounded
    /// when stable time is zero.
    fn begin_stable_period(&self) {
        let stable_seconds = match self.core.lock() {
            Ok(mut core) => {
                core.is_stable_period = true;
                core.config.stable_seconds
            }
            Err(_) => return,
        };

        if stable_seconds > 0 {
            info!("Stable period started ({}s)", stable_seconds);
            self.set_timer(TIMER_TITLE_STABLE, format_hms(stable_seconds as u64));
            let weak = self.weak.clone();
            let handle = spawn_countdown(
                &self.runtime.handle(),
                stable_seconds,
                self.make_timer_tick(),
                move || {
                    if let Some(engine) = weak.upgrade() {
                        engine.finish_stable_period();
                    }
                },
            );
            if let Ok(mut slot) = self.countdown.lock() {
                *slot = Some(handle);
            }
        } else {
            info!("Stable period started (unbounded)");
            self.set_timer(TIMER_TITLE_RECORDING, TIMER_TEXT_UNBOUNDED.to_string());
        }
        broadcast_status(&self.core, &self.vibration, &self.status_tx);
    }

    /// Stable time ran out: alert, stop recording, and leave the blink
    /// cue running until the next user action.
    fn finish_stable_period(&self) {
        info!("Stable time ended");
        self.trigger_stable_end_alert();
        self.halt_recording(false);

        let core = Arc::clone(&self.core);
        let vibration = Arc::clone(&self.vibration);
        let status_tx = self.status_tx.clone();
        let handle = spawn_blink(&self.runtime.handle(), move |color| {
            if let Ok(mut guard) = core.lock() {
                guard.timer_color = color;
            }
            broadcast_status(&core, &vibration, &status_tx);
        });
        if let Ok(mut slot) = self.blink.lock() {
            *slot = Some(handle);
        }
    }

    /// Pause the session without flushing records (the start/pause
    /// button). Monitoring continues without recording.
    pub fn pause_recording(&self) {
        self.halt_recording(true);
    }

    /// Stop the session and flush the event timeline to the store.
    pub fn stop_session(&self) -> Result<(), StorageError> {
        self.halt_recording(true);
        let events = match self.core.lock() {
            Ok(mut core) => {
                let events = core.log.events().to_vec();
                core.log.clear();
                events
            }
            Err(_) => Vec::new(),
        };
        if events.is_empty() {
            return Ok(());
        }
        records::flush_session(&*self.store, &events)
    }

    /// The settings collaborator finished editing: flush any active
    /// session, pick up the new configuration, and restart the sensor.
    pub fn settings_changed(&self) {
        if let Err(err) = self.stop_session() {
            log_storage_error(&err, "settings_changed");
        }
        if let Ok(mut core) = self.core.lock() {
            core.config = MonitorConfig::load(&*self.store);
            let threshold = core.config.threshold.degrees();
            core.machine.reset(threshold);
            core.timer_text = format_hms(core.config.stable_seconds as u64);
        }
        self.restart_sensor();
        broadcast_status(&self.core, &self.vibration, &self.status_tx);
    }

    /// Cancel timers and the scheduler, close any open excursion, and
    /// reset the displayed timer to the configured stable time.
    fn halt_recording(&self, stop_blink: bool) {
        self.cancel_timers(stop_blink);
        self.vibration.deactivate();

        let closing_event = match self.core.lock() {
            Ok(mut core) => {
                let wall_ms = self.time.wall_ms();
                let event = core.close_open_excursion(wall_ms);
                let threshold = core.config.threshold.degrees();
                core.machine.reset(threshold);
                core.is_recording = false;
                core.is_stable_period = false;
                core.timer_title = TIMER_TITLE_STABLE.to_string();
                core.timer_text = format_hms(core.config.stable_seconds as u64);
                if stop_blink {
                    core.timer_color = TimerColor::Normal;
                }
                event
            }
            Err(_) => None,
        };
        if let Some(event) = closing_event {
            let _ = self.event_tx.send(event);
        }
        broadcast_status(&self.core, &self.vibration, &self.status_tx);
    }

    fn cancel_timers(&self, stop_blink: bool) {
        if let Ok(mut slot) = self.countdown.lock() {
            if let Some(handle) = slot.take() {
                handle.cancel();
            }
        }
        if stop_blink {
            if let Ok(mut slot) = self.blink.lock() {
                if let Some(handle) = slot.take() {
                    handle.cancel();
                }
            }
        }
    }

    fn set_timer(&self, title: &str, text: String) {
        if let Ok(mut core) = self.core.lock() {
            core.timer_title = title.to_string();
            core.timer_text = text;
        }
    }

    /// Per-second countdown tick: refresh the displayed remaining time.
    fn make_timer_tick(&self) -> impl Fn(u32) + Send + 'static {
        let core = Arc::clone(&self.core);
        let vibration = Arc::clone(&self.vibration);
        let status_tx = self.status_tx.clone();
        move |remaining| {
            if let Ok(mut guard) = core.lock() {
                guard.timer_text = format_hms(remaining as u64);
            }
            broadcast_status(&core, &vibration, &status_tx);
        }
    }

    /// Stable-time-ended alert: a long pulse when vibration is usable,
    /// otherwise a blocking modal acknowledgement.
    fn trigger_stable_end_alert(&self) {
        let vibration_enabled = self
            .core
            .lock()
            .map(|core| core.config.vibration_enabled)
            .unwrap_or(true);
        if vibration_enabled && self.haptics.is_available() {
            if self.haptics.vibrate(STABLE_END_PULSE_MS).is_err() {
                log::debug!("Stable-end pulse failed; falling back to modal");
                self.alerts.modal("Notice", "Stable time has ended");
            }
        } else {
            self.alerts.modal("Notice", "Stable time has ended");
        }
    }

    // ========================================================================
    // RECORDS
    // ========================================================================

    /// Render the "view records" report for the last stored session.
    pub fn records_report(&self) -> String {
        records::report(&*self.store)
    }

    /// Cumulative event count across sessions.
    pub fn cumulative_record_count(&self) -> i64 {
        records::cumulative_count(&*self.store)
    }

    /// Reset the cumulative counter.
    pub fn clear_records(&self) {
        records::clear_count(&*self.store);
        info!("Cumulative record counter cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::backend::{
        RecordingAlertSink, RecordingHaptics, StubAccelerometer, StubTimeSource,
    };
    use super::*;
    use crate::config::keys;
    use crate::store::MemoryStore;

    struct Harness {
        engine: Arc<SessionEngine>,
        accel: Arc<StubAccelerometer>,
        haptics: Arc<RecordingHaptics>,
        alerts: Arc<RecordingAlertSink>,
        time: Arc<StubTimeSource>,
        store: Arc<MemoryStore>,
    }

    fn harness(configure: impl FnOnce(&MemoryStore)) -> Harness {
        let store = Arc::new(MemoryStore::new());
        configure(&store);
        let accel = Arc::new(StubAccelerometer::new());
        let haptics = Arc::new(RecordingHaptics::new());
        let alerts = Arc::new(RecordingAlertSink::new());
        let time = Arc::new(StubTimeSource::new(1_700_000_000_000));
        let engine = SessionEngine::with_time_source(
            store.clone(),
            accel.clone(),
            haptics.clone(),
            alerts.clone(),
            time.clone(),
        );
        Harness {
            engine,
            accel,
            haptics,
            alerts,
            time,
            store,
        }
    }

    /// Push a reading given in degrees (the stub takes raw axis units).
    fn push_deg(h: &Harness, x_deg: f64, y_deg: f64) {
        h.accel.push(x_deg / 90.0, y_deg / 90.0, 1.0);
    }

    #[tokio::test]
    async fn test_ramp_scenario_produces_one_closed_record() {
        let h = harness(|_| {});
        h.engine.start_sensor().unwrap();
        push_deg(&h, 0.0, 0.0);
        h.engine.start_recording();

        let mut events = h.engine.subscribe_tilt_events().unwrap();
        for x in [0.0, 1.0, 4.0, 4.0, 1.0, 0.0] {
            h.time.advance_ms(1000);
            push_deg(&h, x, 0.0);
        }

        let start = events.try_recv().unwrap();
        assert_eq!(start.kind, EventKind::Start);
        assert_eq!(start.x_angle, 4.0);

        let end = events.try_recv().unwrap();
        assert_eq!(end.kind, EventKind::End);
        assert_eq!(end.x_angle, 1.0);
        assert!(events.try_recv().is_err());

        let core = h.engine.core.lock().unwrap();
        assert_eq!(core.log.records().len(), 1);
        let record = &core.log.records()[0];
        assert!(!record.is_open());
        assert_eq!(record.x_angle, 4.0);
        assert_eq!(record.duration_ms, Some(2000));
        assert_eq!(core.log.start_count(), 1);
    }

    #[tokio::test]
    async fn test_start_recording_applies_stored_threshold() {
        let h = harness(|_| {});
        h.engine.start_sensor().unwrap();
        push_deg(&h, 0.0, 0.0);

        // Threshold tightened after engine construction is picked up by
        // the state-machine reset at recording start
        h.store.set_f64(keys::THRESHOLD, 2.0);
        h.engine.start_recording();

        let mut events = h.engine.subscribe_tilt_events().unwrap();
        push_deg(&h, 2.5, 0.0);
        let start = events.try_recv().unwrap();
        assert_eq!(start.kind, EventKind::Start);
        assert_eq!(start.x_angle, 2.5);
    }

    #[tokio::test]
    async fn test_relative_baseline_scenario() {
        let h = harness(|store| {
            store.set_bool(keys::RELATIVE_BASELINE, true);
            store.set_f64(keys::THRESHOLD, 2.5);
        });
        h.engine.start_sensor().unwrap();

        // Orientation at recording start becomes the baseline
        push_deg(&h, 2.0, -1.0);
        h.engine.start_recording();

        let mut events = h.engine.subscribe_tilt_events().unwrap();
        push_deg(&h, 5.0, -1.0);

        let start = events.try_recv().unwrap();
        assert_eq!(start.kind, EventKind::Start);
        assert_eq!(start.x_angle, 3.0);
        assert_eq!(start.y_angle, 0.0);
        assert!(start.is_relative);
    }

    #[tokio::test]
    async fn test_no_detection_outside_stable_period() {
        let h = harness(|_| {});
        h.engine.start_sensor().unwrap();

        // Strong tilt while merely monitoring: label changes, no events
        push_deg(&h, 30.0, 0.0);
        let snapshot = h.engine.snapshot().unwrap();
        assert_eq!(snapshot.status, TiltStatus::Tilted);
        assert!(!snapshot.is_tilted);

        let core = h.engine.core.lock().unwrap();
        assert_eq!(core.log.event_count(), 0);
    }

    #[tokio::test]
    async fn test_tilt_start_fires_single_alert_pulse() {
        let h = harness(|_| {});
        h.engine.start_sensor().unwrap();
        push_deg(&h, 0.0, 0.0);
        h.engine.start_recording();

        push_deg(&h, 5.0, 0.0);
        assert_eq!(h.haptics.pulses(), vec![TILT_ALERT_PULSE_MS]);

        // Staying tilted does not re-fire the one-shot alert
        push_deg(&h, 6.0, 0.0);
        assert_eq!(h.haptics.pulses().len(), 1);
    }

    #[tokio::test]
    async fn test_radar_mode_activates_scheduler() {
        let h = harness(|store| {
            store.set_bool(keys::RADAR_VIBRATION_ENABLED, true);
        });
        h.engine.start_sensor().unwrap();
        push_deg(&h, 0.0, 0.0);
        h.engine.start_recording();

        push_deg(&h, 5.0, 0.0);
        assert!(h.engine.vibration.is_active());
        // Immediate activation pulse of intensity/10 ms
        assert_eq!(h.haptics.pulses(), vec![50]);

        push_deg(&h, 0.0, 0.0);
        assert!(!h.engine.vibration.is_active());
    }

    #[tokio::test]
    async fn test_stop_session_flushes_and_clears() {
        let h = harness(|_| {});
        h.engine.start_sensor().unwrap();
        push_deg(&h, 0.0, 0.0);
        h.engine.start_recording();

        h.time.advance_ms(1000);
        push_deg(&h, 5.0, 0.0);
        h.time.advance_ms(1000);
        push_deg(&h, 0.0, 0.0);

        h.engine.stop_session().unwrap();
        assert_eq!(h.engine.cumulative_record_count(), 2);

        let loaded = records::load_last_session(&*h.store).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].kind, EventKind::Start);
        assert_eq!(loaded[1].kind, EventKind::End);

        // Double stop does not double-count
        h.engine.stop_session().unwrap();
        assert_eq!(h.engine.cumulative_record_count(), 2);
    }

    #[tokio::test]
    async fn test_halt_closes_open_excursion() {
        let h = harness(|_| {});
        h.engine.start_sensor().unwrap();
        push_deg(&h, 0.0, 0.0);
        h.engine.start_recording();

        h.time.advance_ms(1000);
        push_deg(&h, 5.0, 0.0);
        h.engine.stop_session().unwrap();

        let loaded = records::load_last_session(&*h.store).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].kind, EventKind::End);
    }

    #[tokio::test]
    async fn test_unsupported_sensor_degrades() {
        let store = Arc::new(MemoryStore::new());
        let accel = Arc::new(StubAccelerometer::unsupported());
        let haptics = Arc::new(RecordingHaptics::new());
        let alerts = Arc::new(RecordingAlertSink::new());
        let engine = SessionEngine::new(store, accel, haptics, alerts.clone());

        assert_eq!(engine.start_sensor(), Err(SensorError::NotSupported));
        let statuses = alerts.statuses();
        assert!(statuses[0].contains("not supported"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_then_bounded_stable_period() {
        let h = harness(|store| {
            store.set_i64(keys::DELAY_SECONDS, 2);
            store.set_i64(keys::STABLE_SECONDS, 3);
        });
        h.engine.start_sensor().unwrap();
        push_deg(&h, 0.0, 0.0);
        h.engine.start_recording();

        assert!(!h.engine.snapshot().unwrap().is_stable_period);
        assert_eq!(h.engine.snapshot().unwrap().timer_title, "Countdown");

        // Let the delay countdown finish
        tokio::time::sleep(std::time::Duration::from_millis(2500)).await;
        let snapshot = h.engine.snapshot().unwrap();
        assert!(snapshot.is_stable_period);
        assert_eq!(snapshot.timer_title, "Stable time");

        // Let the stable countdown finish: session stops itself
        tokio::time::sleep(std::time::Duration::from_millis(3500)).await;
        let snapshot = h.engine.snapshot().unwrap();
        assert!(!snapshot.is_recording);
        assert!(!snapshot.is_stable_period);
        // Stable-end alert pulse fired
        assert_eq!(h.haptics.pulses(), vec![STABLE_END_PULSE_MS]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stable_end_modal_without_vibration() {
        let store = Arc::new(MemoryStore::new());
        store.set_i64(keys::STABLE_SECONDS, 1);
        let accel = Arc::new(StubAccelerometer::new());
        let haptics = Arc::new(RecordingHaptics::unsupported());
        let alerts = Arc::new(RecordingAlertSink::new());
        let time = Arc::new(StubTimeSource::new(1_700_000_000_000));
        let engine = SessionEngine::with_time_source(store, accel.clone(), haptics, alerts.clone(), time);
        engine.start_sensor().unwrap();
        accel.push(0.0, 0.0, 1.0);
        engine.start_recording();

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        let modals = alerts.modals();
        assert_eq!(modals.len(), 1);
        assert!(modals[0].contains("Stable time has ended"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blink_runs_after_auto_stop_until_user_action() {
        let h = harness(|store| {
            store.set_i64(keys::STABLE_SECONDS, 1);
        });
        h.engine.start_sensor().unwrap();
        push_deg(&h, 0.0, 0.0);
        h.engine.start_recording();

        tokio::time::sleep(std::time::Duration::from_millis(1600)).await;
        // Blink cue has toggled to the alert color at least once
        assert_eq!(h.engine.snapshot().unwrap().timer_color, TimerColor::Alert);

        h.engine.pause_recording();
        assert_eq!(h.engine.snapshot().unwrap().timer_color, TimerColor::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_cancels_countdown() {
        let h = harness(|store| {
            store.set_i64(keys::DELAY_SECONDS, 5);
        });
        h.engine.start_sensor().unwrap();
        push_deg(&h, 0.0, 0.0);
        h.engine.start_recording();

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        h.engine.pause_recording();

        // Countdown cancelled: the stable period never begins
        tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        let snapshot = h.engine.snapshot().unwrap();
        assert!(!snapshot.is_stable_period);
        assert!(!snapshot.is_recording);
        assert_eq!(snapshot.timer_text, format_hms(0));
    }

    #[tokio::test]
    async fn test_settings_changed_restarts_sensor_and_reloads_config() {
        let h = harness(|_| {});
        h.engine.start_sensor().unwrap();
        push_deg(&h, 0.0, 0.0);
        h.engine.start_recording();

        h.store.set_f64(keys::THRESHOLD, 8.0);
        h.engine.settings_changed();

        assert!(h.accel.is_monitoring());
        assert!(!h.engine.snapshot().unwrap().is_recording);
        let core = h.engine.core.lock().unwrap();
        assert_eq!(core.config.threshold.degrees(), 8.0);
    }

    #[tokio::test]
    async fn test_status_broadcast_on_every_sample() {
        let h = harness(|_| {});
        h.engine.start_sensor().unwrap();
        let mut rx = h.engine.subscribe_status().unwrap();

        push_deg(&h, 1.5, -0.5);
        let snapshot = rx.try_recv().unwrap();
        assert_eq!(snapshot.x_angle, 1.5);
        assert_eq!(snapshot.y_angle, -0.5);
        assert_eq!(snapshot.status, TiltStatus::Level);
    }
}
