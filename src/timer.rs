// Countdown and blink timers
//
// Timers run as tokio tasks but expose a cancellable handle with a hard
// guarantee: once cancel() returns, no further callback fires. The tick
// gate serializes callback execution against cancellation, which is what
// lets the rest of the crate mutate session state from timer callbacks
// without orphaned mutations after a stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Countdown tick period
const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Blink toggle period
const BLINK_TICK: Duration = Duration::from_millis(500);

/// Timer text color for the visual blink cue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerColor {
    Normal,
    Alert,
}

impl TimerColor {
    fn toggled(self) -> Self {
        match self {
            TimerColor::Normal => TimerColor::Alert,
            TimerColor::Alert => TimerColor::Normal,
        }
    }
}

/// Format whole seconds as hh:mm:ss.
pub fn format_hms(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Outcome of one countdown tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStep {
    /// Seconds remaining after this tick
    Running(u32),
    /// Reached zero on this tick
    Finished,
}

/// Pure countdown core: `seconds` ticks, the last of which finishes.
///
/// Kept separate from the task machinery so the tick arithmetic is
/// testable without a runtime.
#[derive(Debug)]
pub struct CountdownClock {
    remaining: u32,
}

impl CountdownClock {
    pub fn new(seconds: u32) -> Self {
        Self { remaining: seconds }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn tick(&mut self) -> CountdownStep {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            CountdownStep::Finished
        } else {
            CountdownStep::Running(self.remaining)
        }
    }
}

struct TimerInner {
    cancelled: AtomicBool,
    gate: Mutex<()>,
}

/// Handle to a running countdown or blink task.
///
/// `cancel` is idempotent and blocks until any in-flight callback has
/// finished, so after it returns no callback will fire again.
pub struct TimerHandle {
    inner: Arc<TimerInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TimerHandle {
    fn new(inner: Arc<TimerInner>, task: JoinHandle<()>) -> Self {
        Self {
            inner,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            // Already cancelled, or the timer completed on its own.
            return;
        }
        // Wait out any callback currently holding the gate.
        if let Ok(_gate) = self.inner.gate.lock() {}
        if let Ok(mut slot) = self.task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }

    /// True once cancelled or completed.
    pub fn is_finished(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn new_inner() -> Arc<TimerInner> {
    Arc::new(TimerInner {
        cancelled: AtomicBool::new(false),
        gate: Mutex::new(()),
    })
}

/// Spawn a one-per-second countdown.
///
/// `on_tick` receives the remaining seconds after each tick (including 0
/// on the final one); `on_complete` fires exactly once when the countdown
/// reaches zero, and never after `cancel` has returned.
pub fn spawn_countdown<T, C>(
    runtime: &Handle,
    seconds: u32,
    on_tick: T,
    on_complete: C,
) -> TimerHandle
where
    T: Fn(u32) + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    let inner = new_inner();
    let task_inner = Arc::clone(&inner);
    let task = runtime.spawn(async move {
        let mut clock = CountdownClock::new(seconds);
        let mut on_complete = Some(on_complete);
        loop {
            tokio::time::sleep(COUNTDOWN_TICK).await;
            let gate = match task_inner.gate.lock() {
                Ok(gate) => gate,
                Err(_) => return,
            };
            if task_inner.cancelled.load(Ordering::SeqCst) {
                return;
            }
            match clock.tick() {
                CountdownStep::Running(remaining) => on_tick(remaining),
                CountdownStep::Finished => {
                    on_tick(0);
                    // Mark finished before the callback so a reentrant
                    // cancel() from inside it returns immediately.
                    task_inner.cancelled.store(true, Ordering::SeqCst);
                    if let Some(complete) = on_complete.take() {
                        complete();
                    }
                    drop(gate);
                    return;
                }
            }
        }
    });
    TimerHandle::new(inner, task)
}

/// Spawn the 500 ms blink cue, alternating the timer color until cancelled.
pub fn spawn_blink<F>(runtime: &Handle, on_toggle: F) -> TimerHandle
where
    F: Fn(TimerColor) + Send + 'static,
{
    let inner = new_inner();
    let task_inner = Arc::clone(&inner);
    let task = runtime.spawn(async move {
        let mut color = TimerColor::Normal;
        loop {
            tokio::time::sleep(BLINK_TICK).await;
            let _gate = match task_inner.gate.lock() {
                Ok(gate) => gate,
                Err(_) => return,
            };
            if task_inner.cancelled.load(Ordering::SeqCst) {
                return;
            }
            color = color.toggled();
            on_toggle(color);
        }
    });
    TimerHandle::new(inner, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(61), "00:01:01");
        assert_eq!(format_hms(3700), "01:01:40");
        assert_eq!(format_hms(25 * 3600), "25:00:00");
    }

    #[test]
    fn test_clock_ticks_exactly_n_times() {
        let mut clock = CountdownClock::new(5);
        let mut steps = Vec::new();
        loop {
            let step = clock.tick();
            steps.push(step);
            if step == CountdownStep::Finished {
                break;
            }
        }
        assert_eq!(
            steps,
            vec![
                CountdownStep::Running(4),
                CountdownStep::Running(3),
                CountdownStep::Running(2),
                CountdownStep::Running(1),
                CountdownStep::Finished,
            ]
        );
    }

    #[test]
    fn test_zero_clock_finishes_immediately() {
        let mut clock = CountdownClock::new(0);
        assert_eq!(clock.tick(), CountdownStep::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_completes_once() {
        let ticks = Arc::new(AtomicU32::new(0));
        let completions = Arc::new(AtomicU32::new(0));

        let t = Arc::clone(&ticks);
        let c = Arc::clone(&completions);
        let handle = spawn_countdown(
            &Handle::current(),
            5,
            move |_| {
                t.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                c.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 5);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks_and_completion() {
        let ticks = Arc::new(AtomicU32::new(0));
        let completions = Arc::new(AtomicU32::new(0));

        let t = Arc::clone(&ticks);
        let c = Arc::clone(&completions);
        let handle = spawn_countdown(
            &Handle::current(),
            5,
            move |_| {
                t.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                c.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_millis(2500)).await;
        handle.cancel();
        let ticks_at_cancel = ticks.load(Ordering::SeqCst);
        assert_eq!(ticks_at_cancel, 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), ticks_at_cancel);
        assert_eq!(completions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let handle = spawn_countdown(&Handle::current(), 5, |_| {}, || {});
        handle.cancel();
        handle.cancel();
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blink_alternates_colors() {
        let toggles = Arc::new(Mutex::new(Vec::new()));
        let t = Arc::clone(&toggles);
        let handle = spawn_blink(&Handle::current(), move |color| {
            t.lock().unwrap().push(color);
        });

        tokio::time::sleep(Duration::from_millis(2250)).await;
        handle.cancel();

        let seen = toggles.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                TimerColor::Alert,
                TimerColor::Normal,
                TimerColor::Alert,
                TimerColor::Normal,
            ]
        );
    }
}
