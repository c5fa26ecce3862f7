//! Behavior learning engine
//!
//! Owns the bounded behavior history, the pattern set and the current
//! recommendation list. Every tracked behavior runs capture, pattern analysis,
//! recommendation rebuild and a snapshot write before returning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::behavior::patterns::PatternAnalyzer;
use crate::behavior::recommend;
use crate::behavior::types::{
    AdaptiveRecommendation, BehaviorEvent, LearningPattern, RecommendationKind, UserProfile,
};
use crate::clock::{Clock, SystemClock};
use crate::config::IntelConfig;
use crate::error::{Diagnostics, IntelError};
use crate::history::BoundedHistory;
use crate::storage::{KeyValueStore, SnapshotSlot};
use crate::types::EventData;

/// Persisted behavior state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorSnapshot {
    pub behaviors: Vec<BehaviorEvent>,
    pub patterns: Vec<(String, LearningPattern)>,
    pub recommendations: Vec<AdaptiveRecommendation>,
    pub last_updated: DateTime<Utc>,
}

/// Stateful behavior learning engine
pub struct BehaviorEngine {
    config: IntelConfig,
    behaviors: BoundedHistory<BehaviorEvent>,
    patterns: PatternAnalyzer,
    recommendations: Vec<AdaptiveRecommendation>,
    slot: Option<SnapshotSlot>,
    clock: Arc<dyn Clock>,
    diagnostics: Diagnostics,
}

impl Default for BehaviorEngine {
    fn default() -> Self {
        Self::new(IntelConfig::default())
    }
}

impl BehaviorEngine {
    /// Memory-only engine using the system clock
    pub fn new(config: IntelConfig) -> Self {
        Self::build(config, None, Arc::new(SystemClock))
    }

    /// Engine persisting to `store`; previously saved state is loaded immediately
    pub fn with_storage(
        config: IntelConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let slot = SnapshotSlot::new(store, config.behavior_key());
        let mut engine = Self::build(config, Some(slot), clock);
        engine.load();
        engine
    }

    /// Memory-only engine with an explicit clock
    pub fn with_clock(config: IntelConfig, clock: Arc<dyn Clock>) -> Self {
        Self::build(config, None, clock)
    }

    fn build(config: IntelConfig, slot: Option<SnapshotSlot>, clock: Arc<dyn Clock>) -> Self {
        Self {
            behaviors: BoundedHistory::new(config.max_behaviors),
            patterns: PatternAnalyzer::new(config.max_patterns, config.sequence_window)
                .with_utc_offset(config.utc_offset()),
            recommendations: Vec::new(),
            slot,
            clock,
            diagnostics: Diagnostics::default(),
            config,
        }
    }

    /// Record one user action and update everything derived from it
    pub fn track(&mut self, action: &str, page: &str, data: Option<EventData>) {
        let mut data = data;
        if let Some(d) = data.as_mut() {
            d.truncate_extra(self.config.max_extension_fields);
        }
        let event = BehaviorEvent {
            timestamp: self.clock.now(),
            action: action.to_string(),
            page: page.to_string(),
            duration_ms: data.as_ref().and_then(|d| d.duration_ms),
            data,
        };

        let evicted = self.behaviors.push(event.clone());
        if evicted > 0 {
            debug!(evicted, capacity = self.behaviors.capacity(), "behavior history full, oldest evicted");
        }

        let recent: Vec<&str> = self
            .behaviors
            .tail(self.config.sequence_window)
            .map(|b| b.action.as_str())
            .collect();
        let outcome = self.patterns.observe(&event, &recent);
        debug!(
            action = %event.action,
            page = %event.page,
            created = outcome.created,
            reinforced = outcome.reinforced,
            rejected = outcome.rejected,
            "behavior tracked"
        );

        self.recommendations = recommend::generate(&self.user_profile());
        self.persist();
    }

    /// Current recommendations, optionally restricted to one kind, priority descending
    pub fn recommendations(&self, kind: Option<RecommendationKind>) -> Vec<AdaptiveRecommendation> {
        recommend::filter(&self.recommendations, kind)
    }

    /// Up to `max_predictions` likely next actions after `action`
    pub fn predict_next_action(&self, page: &str, action: &str) -> Vec<String> {
        let predictions = self.patterns.predict_weighted(
            action,
            self.config.prediction_min_frequency,
            self.config.max_predictions,
        );
        debug!(page, action, count = predictions.len(), "next action predicted");
        predictions.into_iter().map(|(a, _)| a).collect()
    }

    /// Next actions with their accumulated weights
    pub fn predict_weighted(&self, action: &str) -> Vec<(String, f64)> {
        self.patterns.predict_weighted(
            action,
            self.config.prediction_min_frequency,
            self.config.max_predictions,
        )
    }

    pub fn user_profile(&self) -> UserProfile {
        let behaviors: Vec<&BehaviorEvent> = self.behaviors.iter().collect();
        recommend::build_profile(&behaviors, self.patterns.len(), self.config.utc_offset())
    }

    pub fn behaviors(&self) -> &BoundedHistory<BehaviorEvent> {
        &self.behaviors
    }

    pub fn patterns(&self) -> &PatternAnalyzer {
        &self.patterns
    }

    pub fn pattern(&self, key: &str) -> Option<&LearningPattern> {
        self.patterns.get(key)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Bounded snapshot of the current state
    pub fn snapshot(&self) -> BehaviorSnapshot {
        BehaviorSnapshot {
            behaviors: self.behaviors.tail_vec(self.config.persisted_behaviors),
            patterns: self.patterns.entries().to_vec(),
            recommendations: self.recommendations.clone(),
            last_updated: self.clock.now(),
        }
    }

    /// Replace the in-memory state with `snapshot`
    pub fn restore(&mut self, snapshot: BehaviorSnapshot) {
        self.behaviors = BoundedHistory::from_vec(snapshot.behaviors, self.config.max_behaviors);
        self.patterns = PatternAnalyzer::from_entries(
            snapshot.patterns,
            self.config.max_patterns,
            self.config.sequence_window,
            self.config.utc_offset(),
        );
        self.recommendations = snapshot.recommendations;
    }

    /// Write the snapshot to storage.
    ///
    /// A memory-only engine has nothing to write and succeeds.
    pub fn save(&self) -> Result<(), IntelError> {
        match &self.slot {
            Some(slot) => slot.save(&self.snapshot()),
            None => Ok(()),
        }
    }

    /// Reload state from storage.
    ///
    /// Returns whether a snapshot was restored. A missing snapshot leaves an
    /// empty engine; an unreadable or corrupt one is logged, recorded in the
    /// diagnostics and also leaves an empty engine.
    pub fn load(&mut self) -> bool {
        let Some(slot) = self.slot.clone() else {
            return false;
        };
        self.clear_memory();
        match slot.load::<BehaviorSnapshot>() {
            Ok(Some(snapshot)) => {
                debug!(
                    key = slot.key(),
                    behaviors = snapshot.behaviors.len(),
                    patterns = snapshot.patterns.len(),
                    "behavior snapshot restored"
                );
                self.restore(snapshot);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(key = slot.key(), error = %e, "failed to load behavior snapshot, starting empty");
                self.diagnostics.record_storage_failure(&e);
                if matches!(e, IntelError::Json(_)) {
                    self.diagnostics.recovered_from_corrupt_state = true;
                }
                false
            }
        }
    }

    /// Drop all state, in memory and in storage
    pub fn reset(&mut self) {
        self.clear_memory();
        if let Some(slot) = &self.slot {
            if let Err(e) = slot.clear() {
                warn!(key = slot.key(), error = %e, "failed to clear behavior snapshot");
                self.diagnostics.record_storage_failure(&e);
            }
        }
    }

    fn clear_memory(&mut self) {
        self.behaviors.clear();
        self.patterns.clear();
        self.recommendations.clear();
    }

    fn persist(&mut self) {
        if let Err(e) = self.save() {
            warn!(error = %e, "failed to save behavior snapshot, continuing in memory");
            self.diagnostics.record_storage_failure(&e);
        }
    }
}
