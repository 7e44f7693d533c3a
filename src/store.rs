// Key-value preference store and event-log persistence
//
// The settings collaborator writes preferences, the session reads them at
// start. The last session's event timeline is serialized as JSON under a
// single key, alongside a cumulative event counter. The only format
// requirement is round-tripping that event sequence.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::warn;

use crate::error::StorageError;
use crate::events::{EventKind, TiltEvent};

/// String-keyed preference store.
///
/// Typed accessors fall back to the supplied default when a key is absent
/// or unparsable, mirroring `Preferences.Get(key, default)` semantics of
/// the host platform.
pub trait PreferenceStore: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;
    fn set_string(&self, key: &str, value: &str);
    fn remove(&self, key: &str);

    fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.get_string(key)
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    }

    fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.get_string(key)
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get_string(key)
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    }

    fn set_f64(&self, key: &str, value: f64) {
        self.set_string(key, &value.to_string());
    }

    fn set_i64(&self, key: &str, value: i64) {
        self.set_string(key, &value.to_string());
    }

    fn set_bool(&self, key: &str, value: bool) {
        self.set_string(key, &value.to_string());
    }
}

/// In-memory store for tests and the simulator.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get_string(&self, key: &str) -> Option<String> {
        self.map.lock().ok()?.get(key).cloned()
    }

    fn set_string(&self, key: &str, value: &str) {
        if let Ok(mut map) = self.map.lock() {
            map.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut map) = self.map.lock() {
            map.remove(key);
        }
    }
}

/// File-backed store persisting the whole map as one JSON object.
///
/// A missing or unparsable file yields an empty map with a warning, the
/// same load-or-default posture used for configuration files elsewhere in
/// the stack. Writes are best-effort: a failed save is logged, not fatal.
pub struct JsonFileStore {
    path: PathBuf,
    map: Mutex<HashMap<String, String>>,
}

impl JsonFileStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let map = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(err) => {
                    warn!(
                        "Failed to parse preference file {:?}: {}. Starting empty.",
                        path, err
                    );
                    HashMap::new()
                }
            },
            Err(err) => {
                warn!(
                    "Failed to read preference file {:?}: {}. Starting empty.",
                    path, err
                );
                HashMap::new()
            }
        };
        Self {
            path,
            map: Mutex::new(map),
        }
    }

    fn persist(&self, map: &HashMap<String, String>) {
        match serde_json::to_string_pretty(map) {
            Ok(json) => {
                if let Err(err) = fs::write(&self.path, json) {
                    warn!("Failed to write preference file {:?}: {}", self.path, err);
                }
            }
            Err(err) => warn!("Failed to serialize preferences: {}", err),
        }
    }
}

impl PreferenceStore for JsonFileStore {
    fn get_string(&self, key: &str) -> Option<String> {
        self.map.lock().ok()?.get(key).cloned()
    }

    fn set_string(&self, key: &str, value: &str) {
        if let Ok(mut map) = self.map.lock() {
            map.insert(key.to_string(), value.to_string());
            self.persist(&map);
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut map) = self.map.lock() {
            map.remove(key);
            self.persist(&map);
        }
    }
}

/// Persistence of the session event timeline and the cumulative counter.
pub mod records {
    use super::*;

    pub const RECORD_COUNT_KEY: &str = "record_count";
    pub const LAST_EVENTS_KEY: &str = "last_tilt_events";

    /// Flush a finished session: bump the cumulative counter by the
    /// session's event count and store the serialized timeline.
    pub fn flush_session(
        store: &dyn PreferenceStore,
        events: &[TiltEvent],
    ) -> Result<(), StorageError> {
        let total = cumulative_count(store) + events.len() as i64;
        store.set_i64(RECORD_COUNT_KEY, total);

        let json = serde_json::to_string(events)?;
        store.set_string(LAST_EVENTS_KEY, &json);
        Ok(())
    }

    /// Cumulative event count across all sessions.
    pub fn cumulative_count(store: &dyn PreferenceStore) -> i64 {
        store.get_i64(RECORD_COUNT_KEY, 0)
    }

    /// Reset the cumulative counter. The last timeline is kept.
    pub fn clear_count(store: &dyn PreferenceStore) {
        store.set_i64(RECORD_COUNT_KEY, 0);
    }

    /// Read back the last session's timeline.
    pub fn load_last_session(store: &dyn PreferenceStore) -> Result<Vec<TiltEvent>, StorageError> {
        match store.get_string(LAST_EVENTS_KEY) {
            None => Ok(Vec::new()),
            Some(json) if json.is_empty() => Ok(Vec::new()),
            Some(json) => Ok(serde_json::from_str(&json)?),
        }
    }

    /// Render the "view records" report for the last session.
    ///
    /// A deserialization failure is reported in the returned text and
    /// treated as an empty record set.
    pub fn report(store: &dyn PreferenceStore) -> String {
        let events = match load_last_session(store) {
            Ok(events) => events,
            Err(err) => {
                crate::error::log_storage_error(&err, "records::report");
                return "Failed to read records".to_string();
            }
        };

        if events.is_empty() {
            return "No records yet".to_string();
        }

        let start_count = events.iter().filter(|e| e.kind == EventKind::Start).count();
        let mut out = String::new();
        out.push_str(&format!("{} tilt events in total\n", events.len()));
        out.push_str(&format!("{} tilt excursions\n", start_count));
        for event in &events {
            let kind = match event.kind {
                EventKind::Start => "tilt started",
                EventKind::End => "tilt ended",
            };
            out.push_str(&format!(
                "\n{} at +{} since stable start\n",
                kind,
                crate::timer::format_hms(event.stable_offset_ms / 1000)
            ));
            out.push_str(&format!(
                "angles: X={:.1} deg, Y={:.1} deg ({})\n",
                event.x_angle,
                event.y_angle,
                if event.is_relative {
                    "relative baseline"
                } else {
                    "absolute horizontal"
                }
            ));
        }
        out
    }
}
