//! Pattern analysis
//!
//! Every behavior reinforces three pattern keys: the recent action sequence,
//! the page/action pair and the hour/action pair. Patterns feed next-action
//! prediction.

use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::behavior::types::{BehaviorEvent, LearningPattern};

/// Confidence of a newly created pattern
pub const INITIAL_CONFIDENCE: f64 = 0.1;

/// Confidence gained per repeated observation
pub const CONFIDENCE_STEP: f64 = 0.1;

/// Upper bound on pattern confidence
pub const MAX_CONFIDENCE: f64 = 1.0;

/// Separator between actions in sequence keys
pub const SEQUENCE_SEPARATOR: &str = "->";

/// What a single observation did to the pattern set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveOutcome {
    pub created: usize,
    pub reinforced: usize,
    /// New keys refused because the pattern set is full
    pub rejected: usize,
}

/// Insertion-ordered store of learning patterns.
///
/// The number of distinct keys never exceeds `max_patterns`. Once full, new
/// keys are rejected and existing keys are kept forever.
#[derive(Debug, Clone)]
pub struct PatternAnalyzer {
    entries: Vec<(String, LearningPattern)>,
    index: HashMap<String, usize>,
    max_patterns: usize,
    sequence_window: usize,
    utc_offset: FixedOffset,
}

impl PatternAnalyzer {
    pub fn new(max_patterns: usize, sequence_window: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            max_patterns,
            sequence_window,
            utc_offset: Utc.fix(),
        }
    }

    /// Derive hour keys in the visitor's local time
    pub fn with_utc_offset(mut self, utc_offset: FixedOffset) -> Self {
        self.utc_offset = utc_offset;
        self
    }

    /// Rebuild from persisted `(key, pattern)` pairs.
    ///
    /// Duplicate keys keep their first occurrence; entries beyond the cap are
    /// dropped.
    pub fn from_entries(
        entries: Vec<(String, LearningPattern)>,
        max_patterns: usize,
        sequence_window: usize,
        utc_offset: FixedOffset,
    ) -> Self {
        let mut analyzer = Self::new(max_patterns, sequence_window).with_utc_offset(utc_offset);
        for (key, pattern) in entries {
            if analyzer.entries.len() >= max_patterns || analyzer.index.contains_key(&key) {
                continue;
            }
            analyzer.index.insert(key.clone(), analyzer.entries.len());
            analyzer.entries.push((key, pattern));
        }
        analyzer
    }

    /// Pattern keys derived from `event` given the recent action names
    /// (oldest first, ending with the event's own action)
    pub fn pattern_keys(&self, event: &BehaviorEvent, recent_actions: &[&str]) -> [String; 3] {
        let start = recent_actions.len().saturating_sub(self.sequence_window);
        let sequence = recent_actions[start..].join(SEQUENCE_SEPARATOR);
        [
            sequence,
            format!("{}:{}", event.page, event.action),
            format!("{}:{}", hour_of_day(event.timestamp, self.utc_offset), event.action),
        ]
    }

    /// Reinforce or create the patterns matching `event`
    pub fn observe(&mut self, event: &BehaviorEvent, recent_actions: &[&str]) -> ObserveOutcome {
        let mut outcome = ObserveOutcome::default();
        for key in self.pattern_keys(event, recent_actions) {
            if let Some(&slot) = self.index.get(&key) {
                let pattern = &mut self.entries[slot].1;
                pattern.frequency = pattern.frequency.saturating_add(1);
                pattern.last_seen = event.timestamp;
                pattern.confidence = (pattern.confidence + CONFIDENCE_STEP).min(MAX_CONFIDENCE);
                if !pattern.associated_actions.iter().any(|a| *a == event.action) {
                    pattern.associated_actions.push(event.action.clone());
                }
                outcome.reinforced += 1;
            } else if self.entries.len() < self.max_patterns {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((
                    key,
                    LearningPattern {
                        confidence: INITIAL_CONFIDENCE,
                        last_seen: event.timestamp,
                        frequency: 1,
                        associated_actions: vec![event.action.clone()],
                    },
                ));
                outcome.created += 1;
            } else {
                debug!(key = %key, max_patterns = self.max_patterns, "pattern set full, key rejected");
                outcome.rejected += 1;
            }
        }
        outcome
    }

    /// Rank likely next actions after `action`.
    ///
    /// Patterns whose key contains `action` and whose frequency reaches
    /// `min_frequency` vote for each of their associated actions (other than
    /// `action` itself) with their confidence. The `max_results` heaviest
    /// actions are returned, descending; ties keep first-vote order.
    pub fn predict_weighted(
        &self,
        action: &str,
        min_frequency: u32,
        max_results: usize,
    ) -> Vec<(String, f64)> {
        let mut weights: Vec<(String, f64)> = Vec::new();
        let mut slots: HashMap<&str, usize> = HashMap::new();
        for (key, pattern) in &self.entries {
            if pattern.frequency < min_frequency || !key.contains(action) {
                continue;
            }
            for associated in &pattern.associated_actions {
                if associated == action {
                    continue;
                }
                match slots.get(associated.as_str()) {
                    Some(&slot) => weights[slot].1 += pattern.confidence,
                    None => {
                        slots.insert(associated.as_str(), weights.len());
                        weights.push((associated.clone(), pattern.confidence));
                    }
                }
            }
        }
        // Stable sort keeps traversal order among equal weights
        weights.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        weights.truncate(max_results);
        weights
    }

    pub fn get(&self, key: &str) -> Option<&LearningPattern> {
        self.index.get(key).map(|&slot| &self.entries[slot].1)
    }

    /// Patterns in creation order
    pub fn entries(&self) -> &[(String, LearningPattern)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

/// Hour of `timestamp` in the zone at `utc_offset`
pub fn hour_of_day(timestamp: DateTime<Utc>, utc_offset: FixedOffset) -> u32 {
    timestamp.with_timezone(&utc_offset).hour()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn event(action: &str, page: &str, hour: u32) -> BehaviorEvent {
        BehaviorEvent {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap(),
            action: action.to_string(),
            page: page.to_string(),
            data: None,
            duration_ms: None,
        }
    }

    /// Feed actions through the analyzer the way the engine does
    fn feed(analyzer: &mut PatternAnalyzer, events: &[BehaviorEvent]) {
        let mut recent: Vec<&str> = Vec::new();
        for e in events {
            recent.push(&e.action);
            analyzer.observe(e, &recent);
        }
    }

    #[test]
    fn test_pattern_keys() {
        let analyzer = PatternAnalyzer::new(100, 10);
        let e = event("contact", "/about", 14);
        let keys = analyzer.pattern_keys(&e, &["view", "scroll", "contact"]);

        assert_eq!(
            keys,
            [
                "view->scroll->contact".to_string(),
                "/about:contact".to_string(),
                "14:contact".to_string()
            ]
        );
    }

    #[test]
    fn test_sequence_key_uses_window() {
        let analyzer = PatternAnalyzer::new(100, 2);
        let e = event("c", "/", 0);
        let keys = analyzer.pattern_keys(&e, &["a", "b", "c"]);
        assert_eq!(keys[0], "b->c");
    }

    #[test]
    fn test_first_observation_creates_patterns() {
        let mut analyzer = PatternAnalyzer::new(100, 10);
        let e = event("view", "/home", 9);
        let outcome = analyzer.observe(&e, &["view"]);

        assert_eq!(outcome.created, 3);
        let pattern = analyzer.get("/home:view").unwrap();
        assert_eq!(pattern.frequency, 1);
        assert!((pattern.confidence - INITIAL_CONFIDENCE).abs() < 1e-9);
        assert_eq!(pattern.associated_actions, vec!["view".to_string()]);
    }

    #[test]
    fn test_reinforcement_caps_confidence() {
        let mut analyzer = PatternAnalyzer::new(100, 10);
        let e = event("view", "/home", 9);
        for _ in 0..15 {
            analyzer.observe(&e, &["view"]);
        }

        let pattern = analyzer.get("/home:view").unwrap();
        assert_eq!(pattern.frequency, 15);
        assert!(pattern.confidence <= MAX_CONFIDENCE);
        assert!((pattern.confidence - MAX_CONFIDENCE).abs() < 1e-9);
    }

    #[test]
    fn test_cap_rejects_new_keys() {
        let mut analyzer = PatternAnalyzer::new(4, 10);
        analyzer.observe(&event("a", "/p", 1), &["a"]);
        let outcome = analyzer.observe(&event("b", "/q", 2), &["b"]);

        assert_eq!(analyzer.len(), 4);
        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.rejected, 2);

        // Existing keys still reinforce once full
        let outcome = analyzer.observe(&event("a", "/p", 1), &["a"]);
        assert_eq!(outcome.reinforced, 3);
        assert_eq!(analyzer.get("/p:a").unwrap().frequency, 2);
    }

    #[test]
    fn test_prediction_requires_frequency() {
        let mut analyzer = PatternAnalyzer::new(100, 10);
        let events = vec![event("view", "/home", 9), event("contact", "/home", 9)];
        feed(&mut analyzer, &events);

        assert!(analyzer.predict_weighted("view", 3, 3).is_empty());
    }

    #[test]
    fn test_prediction_ranks_associated_actions() {
        let mut analyzer = PatternAnalyzer::new(100, 10);
        // "/listing:tour_booked" and "9:tour_booked" both contain "tour"
        let mut events = Vec::new();
        for _ in 0..4 {
            events.push(event("tour", "/listing", 9));
            events.push(event("tour_booked", "/listing", 9));
        }
        feed(&mut analyzer, &events);

        let predictions = analyzer.predict_weighted("tour", 3, 3);
        assert!(!predictions.is_empty());
        assert!(predictions.len() <= 3);
        assert_eq!(predictions[0].0, "tour_booked");
        assert!(predictions.iter().all(|(a, _)| a != "tour"));
        for pair in predictions.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn test_hour_key_uses_utc_offset() {
        let analyzer =
            PatternAnalyzer::new(100, 10).with_utc_offset(FixedOffset::west_opt(5 * 3600).unwrap());
        let e = event("contact", "/about", 2);
        let keys = analyzer.pattern_keys(&e, &["contact"]);
        // 02:00 UTC is 21:00 the previous day at UTC-5
        assert_eq!(keys[2], "21:contact");
    }

    #[test]
    fn test_equal_weights_keep_traversal_order() {
        let pattern = |action: &str| LearningPattern {
            confidence: 0.3,
            last_seen: Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
            frequency: 3,
            associated_actions: vec![action.to_string()],
        };
        let entries = vec![
            ("x->x_b".to_string(), pattern("x_b")),
            ("x->x_a".to_string(), pattern("x_a")),
            ("x->x_c".to_string(), pattern("x_c")),
        ];
        let analyzer = PatternAnalyzer::from_entries(entries, 100, 10, Utc.fix());

        let names: Vec<String> = analyzer
            .predict_weighted("x", 3, 2)
            .into_iter()
            .map(|(a, _)| a)
            .collect();
        assert_eq!(names, vec!["x_b".to_string(), "x_a".to_string()]);
    }

    #[test]
    fn test_from_entries_respects_cap_and_duplicates() {
        let pattern = LearningPattern {
            confidence: 0.5,
            last_seen: Utc::now(),
            frequency: 5,
            associated_actions: vec!["a".to_string()],
        };
        let entries = vec![
            ("k1".to_string(), pattern.clone()),
            ("k1".to_string(), pattern.clone()),
            ("k2".to_string(), pattern.clone()),
            ("k3".to_string(), pattern),
        ];
        let analyzer = PatternAnalyzer::from_entries(entries, 2, 10, Utc.fix());

        assert_eq!(analyzer.len(), 2);
        assert!(analyzer.get("k1").is_some());
        assert!(analyzer.get("k2").is_some());
        assert!(analyzer.get("k3").is_none());
    }
}
