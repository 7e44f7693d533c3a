// Tilt records and the per-session event log
//
// One TiltRecord per tilt excursion, created on tilt-start and closed on
// tilt-end. TiltEvents are the append-only timeline used for the records
// report; insertion order is temporal order and is preserved exactly.

use log::warn;
use serde::{Deserialize, Serialize};

/// Kind of a tilt timeline event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Start,
    End,
}

/// One entry in the session timeline.
///
/// Timestamps are milliseconds: `absolute_ms` since the Unix epoch, the
/// offsets since recording start and session (stable-window) start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TiltEvent {
    pub absolute_ms: u64,
    pub relative_ms: u64,
    pub stable_offset_ms: u64,
    pub x_angle: f64,
    pub y_angle: f64,
    pub kind: EventKind,
    pub is_relative: bool,
}

/// One tilt excursion. `end_ms`/`duration_ms` are filled when the tilt ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TiltRecord {
    pub start_ms: u64,
    pub end_ms: Option<u64>,
    pub relative_ms: u64,
    pub duration_ms: Option<u64>,
    pub x_angle: f64,
    pub y_angle: f64,
    pub is_relative: bool,
}

impl TiltRecord {
    pub fn is_open(&self) -> bool {
        self.end_ms.is_none()
    }
}

/// Append-only event timeline plus the parallel record list for the
/// active session. Single writer; cleared at each recording start.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<TiltEvent>,
    records: Vec<TiltRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all events and records. Called at each recording-session start.
    pub fn clear(&mut self) {
        self.events.clear();
        self.records.clear();
    }

    /// Open a new tilt record and append its Start event.
    ///
    /// At most one record may be open at a time; a second open while one
    /// is outstanding is a state-machine fault and is ignored.
    pub fn open_record(&mut self, record: TiltRecord, event: TiltEvent) -> bool {
        if self.has_open_record() {
            warn!("open_record called while a record is already open; ignoring");
            return false;
        }
        debug_assert_eq!(event.kind, EventKind::Start);
        self.records.push(record);
        self.events.push(event);
        true
    }

    /// Close the most recent record and append its End event.
    pub fn close_record(&mut self, end_ms: u64, event: TiltEvent) -> bool {
        debug_assert_eq!(event.kind, EventKind::End);
        match self.records.last_mut() {
            Some(record) if record.is_open() => {
                record.end_ms = Some(end_ms);
                record.duration_ms = Some(end_ms.saturating_sub(record.start_ms));
                self.events.push(event);
                true
            }
            _ => {
                warn!("close_record called with no open record; ignoring");
                false
            }
        }
    }

    pub fn has_open_record(&self) -> bool {
        self.records.last().map(TiltRecord::is_open).unwrap_or(false)
    }

    pub fn events(&self) -> &[TiltEvent] {
        &self.events
    }

    pub fn records(&self) -> &[TiltRecord] {
        &self.records
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Number of Start events, i.e. the number of tilt excursions seen.
    pub fn start_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.kind == EventKind::Start)
            .count()
    }
}
