//! Engine configuration
//!
//! All caps and thresholds used by the engines. Defaults match the production
//! behavior; a JSON document can override any subset of fields.

use crate::error::IntelError;
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Default maximum number of behavior events kept in memory
pub const DEFAULT_MAX_BEHAVIORS: usize = 1000;

/// Default maximum number of attribution events kept in memory
pub const DEFAULT_MAX_EVENTS: usize = 10_000;

/// Behavior tail written on every save
pub const DEFAULT_PERSISTED_BEHAVIORS: usize = 100;

/// Attribution event tail written on every save
pub const DEFAULT_PERSISTED_EVENTS: usize = 1000;

/// Maximum number of distinct pattern keys
pub const DEFAULT_MAX_PATTERNS: usize = 100;

/// Number of recent actions joined into a sequence pattern key
pub const DEFAULT_SEQUENCE_WINDOW: usize = 10;

/// Minimum pattern frequency before it participates in prediction
pub const DEFAULT_PREDICTION_MIN_FREQUENCY: u32 = 3;

/// Maximum number of predicted next actions
pub const DEFAULT_MAX_PREDICTIONS: usize = 3;

/// Decay constant for time-decay attribution
pub const DEFAULT_TIME_DECAY_RATE: f64 = 0.5;

/// Maximum number of caller-supplied extension fields per event
pub const DEFAULT_MAX_EXTENSION_FIELDS: usize = 20;

/// Largest accepted visitor offset from UTC, in minutes
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Prefix of the persisted storage keys
pub const DEFAULT_STORAGE_NAMESPACE: &str = "leadscope";

/// Tunable engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntelConfig {
    pub max_behaviors: usize,
    pub max_events: usize,
    pub persisted_behaviors: usize,
    pub persisted_events: usize,
    pub max_patterns: usize,
    pub sequence_window: usize,
    pub prediction_min_frequency: u32,
    pub max_predictions: usize,
    pub time_decay_rate: f64,
    pub max_extension_fields: usize,
    /// Visitor's offset from UTC in minutes; hour-of-day analysis uses local time
    pub utc_offset_minutes: i32,
    pub storage_namespace: String,
}

impl Default for IntelConfig {
    fn default() -> Self {
        Self {
            max_behaviors: DEFAULT_MAX_BEHAVIORS,
            max_events: DEFAULT_MAX_EVENTS,
            persisted_behaviors: DEFAULT_PERSISTED_BEHAVIORS,
            persisted_events: DEFAULT_PERSISTED_EVENTS,
            max_patterns: DEFAULT_MAX_PATTERNS,
            sequence_window: DEFAULT_SEQUENCE_WINDOW,
            prediction_min_frequency: DEFAULT_PREDICTION_MIN_FREQUENCY,
            max_predictions: DEFAULT_MAX_PREDICTIONS,
            time_decay_rate: DEFAULT_TIME_DECAY_RATE,
            max_extension_fields: DEFAULT_MAX_EXTENSION_FIELDS,
            utc_offset_minutes: 0,
            storage_namespace: DEFAULT_STORAGE_NAMESPACE.to_string(),
        }
    }
}

impl IntelConfig {
    /// Parse a (possibly partial) JSON configuration and validate it
    pub fn from_json(json: &str) -> Result<Self, IntelError> {
        let config: IntelConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engines cannot run with
    pub fn validate(&self) -> Result<(), IntelError> {
        let capacities = [
            ("max_behaviors", self.max_behaviors),
            ("max_events", self.max_events),
            ("max_patterns", self.max_patterns),
            ("sequence_window", self.sequence_window),
            ("max_predictions", self.max_predictions),
        ];
        for (name, value) in capacities {
            if value == 0 {
                return Err(IntelError::Config(format!("{} must be greater than 0", name)));
            }
        }
        if !self.time_decay_rate.is_finite() || self.time_decay_rate < 0.0 {
            return Err(IntelError::Config(
                "time_decay_rate must be a non-negative number".to_string(),
            ));
        }
        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(IntelError::Config(format!(
                "utc_offset_minutes must be within ±{}",
                MAX_UTC_OFFSET_MINUTES
            )));
        }
        if self.storage_namespace.trim().is_empty() {
            return Err(IntelError::Config(
                "storage_namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Visitor time zone as a fixed offset; out-of-range values fall back to UTC
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }

    /// Storage key of the behavior snapshot
    pub fn behavior_key(&self) -> String {
        format!("{}.behavior", self.storage_namespace)
    }

    /// Storage key of the attribution snapshot
    pub fn attribution_key(&self) -> String {
        format!("{}.attribution", self.storage_namespace)
    }
}
