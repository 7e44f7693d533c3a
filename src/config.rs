// Session configuration
//
// Loaded from the preference store at every recording-session start and
// immutable for the session's duration. All validation happens here, at
// the settings boundary; the core only ever sees validated values.

use serde::{Deserialize, Serialize};

use crate::angle::round1;
use crate::error::ConfigError;
use crate::store::PreferenceStore;

pub const DEFAULT_THRESHOLD_DEG: f64 = 3.0;
pub const THRESHOLD_MIN_DEG: f64 = 0.1;
pub const THRESHOLD_MAX_DEG: f64 = 10.0;
pub const DEFAULT_VIBRATION_INTENSITY: u32 = 500;
pub const VIBRATION_INTENSITY_MAX: u32 = 1000;

/// Upper bound for each stored duration entry (delay seconds and the
/// stable hours/minutes/seconds parts). Keeps the summed total well
/// inside u32 seconds.
pub const DURATION_PART_MAX: u32 = 1_000_000;

/// Preference keys read at session start and written by the settings
/// collaborator.
pub mod keys {
    pub const THRESHOLD: &str = "threshold";
    pub const THRESHOLD_IS_CUSTOM: &str = "threshold_is_custom";
    pub const DELAY_SECONDS: &str = "delay_seconds";
    pub const STABLE_HOURS: &str = "stable_hours";
    pub const STABLE_MINUTES: &str = "stable_minutes";
    pub const STABLE_SECONDS: &str = "stable_seconds";
    pub const VIBRATION_ENABLED: &str = "vibration_enabled";
    pub const RADAR_VIBRATION_ENABLED: &str = "radar_vibration_enabled";
    pub const VIBRATION_INTENSITY: &str = "vibration_intensity";
    pub const RELATIVE_BASELINE: &str = "relative_baseline";
}

/// Threshold selection.
///
/// The settings UI offers preset choices plus a free-entry field. A
/// radio value of "0" selects custom entry, never a literal zero
/// threshold; that distinction is a variant here, and `Custom` always
/// carries a validated value in [0.1, 10.0] degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "degrees")]
pub enum ThresholdSetting {
    Preset(f64),
    Custom(f64),
}

impl ThresholdSetting {
    /// Build a custom threshold from user entry, rounding to one decimal.
    pub fn custom(value: f64) -> Result<Self, ConfigError> {
        if !value.is_finite() || !(THRESHOLD_MIN_DEG..=THRESHOLD_MAX_DEG).contains(&value) {
            return Err(ConfigError::ThresholdOutOfRange { value });
        }
        Ok(ThresholdSetting::Custom(round1(value)))
    }

    pub fn degrees(&self) -> f64 {
        match self {
            ThresholdSetting::Preset(v) | ThresholdSetting::Custom(v) => *v,
        }
    }
}

impl Default for ThresholdSetting {
    fn default() -> Self {
        ThresholdSetting::Preset(DEFAULT_THRESHOLD_DEG)
    }
}

/// Complete session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub threshold: ThresholdSetting,
    /// Countdown delay before the stable period begins
    pub delay_seconds: u32,
    /// Stable-period length; 0 means unbounded
    pub stable_seconds: u32,
    pub vibration_enabled: bool,
    pub radar_vibration_enabled: bool,
    /// Haptic intensity, 0..=1000
    pub vibration_intensity: u32,
    pub relative_baseline: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold: ThresholdSetting::default(),
            delay_seconds: 0,
            stable_seconds: 0,
            vibration_enabled: true,
            radar_vibration_enabled: false,
            vibration_intensity: DEFAULT_VIBRATION_INTENSITY,
            relative_baseline: false,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from the preference store.
    ///
    /// Every key falls back to its default when absent; stored values that
    /// are out of range are clamped back to the default so an invalid
    /// state never reaches the core.
    pub fn load(store: &dyn PreferenceStore) -> Self {
        let stored_threshold = store.get_f64(keys::THRESHOLD, DEFAULT_THRESHOLD_DEG);
        let is_custom = store.get_bool(keys::THRESHOLD_IS_CUSTOM, false);
        let threshold = if (THRESHOLD_MIN_DEG..=THRESHOLD_MAX_DEG).contains(&stored_threshold) {
            if is_custom {
                ThresholdSetting::Custom(round1(stored_threshold))
            } else {
                ThresholdSetting::Preset(round1(stored_threshold))
            }
        } else {
            log::warn!(
                "Stored threshold {} out of range; using default {}",
                stored_threshold,
                DEFAULT_THRESHOLD_DEG
            );
            ThresholdSetting::default()
        };

        let hours = load_duration_part(store, keys::STABLE_HOURS);
        let minutes = load_duration_part(store, keys::STABLE_MINUTES);
        let seconds = load_duration_part(store, keys::STABLE_SECONDS);

        let intensity = store.get_i64(
            keys::VIBRATION_INTENSITY,
            DEFAULT_VIBRATION_INTENSITY as i64,
        );
        let vibration_intensity = if (0..=VIBRATION_INTENSITY_MAX as i64).contains(&intensity) {
            intensity as u32
        } else {
            log::warn!(
                "Stored vibration intensity {} out of range; using default",
                intensity
            );
            DEFAULT_VIBRATION_INTENSITY
        };

        Self {
            threshold,
            delay_seconds: load_duration_part(store, keys::DELAY_SECONDS),
            stable_seconds: stable_seconds_from_parts(hours, minutes, seconds),
            vibration_enabled: store.get_bool(keys::VIBRATION_ENABLED, true),
            radar_vibration_enabled: store.get_bool(keys::RADAR_VIBRATION_ENABLED, false),
            vibration_intensity,
            relative_baseline: store.get_bool(keys::RELATIVE_BASELINE, false),
        }
    }

    /// Write this configuration back to the store.
    pub fn save(&self, store: &dyn PreferenceStore) {
        store.set_f64(keys::THRESHOLD, self.threshold.degrees());
        store.set_bool(
            keys::THRESHOLD_IS_CUSTOM,
            matches!(self.threshold, ThresholdSetting::Custom(_)),
        );
        store.set_i64(keys::DELAY_SECONDS, self.delay_seconds as i64);
        store.set_i64(keys::STABLE_HOURS, (self.stable_seconds / 3600) as i64);
        store.set_i64(
            keys::STABLE_MINUTES,
            ((self.stable_seconds % 3600) / 60) as i64,
        );
        store.set_i64(keys::STABLE_SECONDS, (self.stable_seconds % 60) as i64);
        store.set_bool(keys::VIBRATION_ENABLED, self.vibration_enabled);
        store.set_bool(keys::RADAR_VIBRATION_ENABLED, self.radar_vibration_enabled);
        store.set_i64(keys::VIBRATION_INTENSITY, self.vibration_intensity as i64);
        store.set_bool(keys::RELATIVE_BASELINE, self.relative_baseline);
    }
}

/// A stored duration entry, validated like the other preference values:
/// negative or absurdly large values never reach the core.
fn load_duration_part(store: &dyn PreferenceStore, key: &str) -> u32 {
    let value = store.get_i64(key, 0);
    if (0..=DURATION_PART_MAX as i64).contains(&value) {
        value as u32
    } else {
        log::warn!("Stored {} value {} out of range; using 0", key, value);
        0
    }
}

/// Stable time is entered as hours + minutes + seconds and summed.
/// Saturates at u32::MAX seconds.
pub fn stable_seconds_from_parts(hours: u32, minutes: u32, seconds: u32) -> u32 {
    let total = hours as u64 * 3600 + minutes as u64 * 60 + seconds as u64;
    total.min(u32::MAX as u64) as u32
}

/// Parse a custom threshold entry from the settings UI.
pub fn parse_threshold(input: &str) -> Result<ThresholdSetting, ConfigError> {
    let value: f64 = input
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            field: "threshold".to_string(),
            input: input.to_string(),
        })?;
    ThresholdSetting::custom(value)
}

/// Parse the delay-seconds entry from the settings UI.
pub fn parse_delay_seconds(input: &str) -> Result<u32, ConfigError> {
    let value: i64 = input
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            field: "delay seconds".to_string(),
            input: input.to_string(),
        })?;
    if value < 0 {
        return Err(ConfigError::NegativeDuration {
            field: "delay seconds".to_string(),
        });
    }
    Ok(value as u32)
}

/// Validate a vibration-intensity slider value.
pub fn parse_vibration_intensity(value: i64) -> Result<u32, ConfigError> {
    if !(0..=VIBRATION_INTENSITY_MAX as i64).contains(&value) {
        return Err(ConfigError::IntensityOutOfRange { value });
    }
    Ok(value as u32)
}
