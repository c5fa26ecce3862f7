//! Error types for Leadscope

use thiserror::Error;

/// Errors that can occur inside the intelligence engines.
///
/// Public tracking and query methods never return these; they surface through
/// persistence helpers, configuration loading, sinks and the C ABI.
#[derive(Debug, Error)]
pub enum IntelError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Reporting sink failed: {0}")]
    Sink(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Observable record of failures the engines absorbed.
///
/// Storage and sink failures never reach callers of the tracking API; this is
/// where they can be inspected instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Diagnostics {
    /// Message of the most recent storage failure, if any
    pub last_storage_error: Option<String>,
    /// Number of failed loads and saves
    pub storage_failures: u64,
    /// Number of failed reporting sink calls
    pub sink_failures: u64,
    /// Whether the last load found a corrupt snapshot and started empty
    pub recovered_from_corrupt_state: bool,
}

impl Diagnostics {
    pub fn record_storage_failure(&mut self, error: &IntelError) {
        self.storage_failures += 1;
        self.last_storage_error = Some(error.to_string());
    }

    pub fn record_sink_failure(&mut self) {
        self.sink_failures += 1;
    }

    /// Combine the diagnostics of two engines
    pub fn merge(&self, other: &Diagnostics) -> Diagnostics {
        Diagnostics {
            last_storage_error: other
                .last_storage_error
                .clone()
                .or_else(|| self.last_storage_error.clone()),
            storage_failures: self.storage_failures + other.storage_failures,
            sink_failures: self.sink_failures + other.sink_failures,
            recovered_from_corrupt_state: self.recovered_from_corrupt_state
                || other.recovered_from_corrupt_state,
        }
    }
}
