// Broadcast channel management for engine subscribers
//
// Centralizes the tokio broadcast channels the UI collaborators consume:
// status snapshots on every sensor sample, and tilt events as the state
// machine emits them. Lagged subscribers drop old messages.

use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::engine::StatusSnapshot;
use crate::events::TiltEvent;

const STATUS_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 64;

/// Manages the engine's broadcast channels.
pub struct BroadcastChannelManager {
    status: Mutex<Option<broadcast::Sender<StatusSnapshot>>>,
    tilt_events: Mutex<Option<broadcast::Sender<TiltEvent>>>,
}

impl BroadcastChannelManager {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(None),
            tilt_events: Mutex::new(None),
        }
    }

    /// Initialize the status channel, returning the sender.
    pub fn init_status(&self) -> broadcast::Sender<StatusSnapshot> {
        let (tx, _) = broadcast::channel(STATUS_BUFFER);
        if let Ok(mut slot) = self.status.lock() {
            *slot = Some(tx.clone());
        }
        tx
    }

    /// Subscribe to status snapshots; None before initialization.
    pub fn subscribe_status(&self) -> Option<broadcast::Receiver<StatusSnapshot>> {
        self.status
            .lock()
            .ok()?
            .as_ref()
            .map(|tx| tx.subscribe())
    }

    /// Initialize the tilt-event channel, returning the sender.
    pub fn init_tilt_events(&self) -> broadcast::Sender<TiltEvent> {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        if let Ok(mut slot) = self.tilt_events.lock() {
            *slot = Some(tx.clone());
        }
        tx
    }

    /// Subscribe to tilt events; None before initialization.
    pub fn subscribe_tilt_events(&self) -> Option<broadcast::Receiver<TiltEvent>> {
        self.tilt_events
            .lock()
            .ok()?
            .as_ref()
            .map(|tx| tx.subscribe())
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}
