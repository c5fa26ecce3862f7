//! Behavioral learning types
//!
//! Records flowing through the behavior engine and the derived structures it
//! exposes: patterns, recommendations and the user profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::EventData;

/// One user interaction used for pattern learning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorEvent {
    pub timestamp: DateTime<Utc>,
    /// Short free-text label supplied by the caller
    pub action: String,
    /// Route path the action happened on
    pub page: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EventData>,
    /// Time spent, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// A recurring action key with frequency and confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPattern {
    /// Confidence in [0, 1]; grows by a fixed step per observation
    pub confidence: f64,
    pub last_seen: DateTime<Utc>,
    /// Number of observations, at least 1
    pub frequency: u32,
    /// Actions observed under this key, in first-seen order, without duplicates
    pub associated_actions: Vec<String>,
}

/// Recommendation category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Content,
    Feature,
    Navigation,
    Timing,
}

impl RecommendationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationKind::Content => "content",
            RecommendationKind::Feature => "feature",
            RecommendationKind::Navigation => "navigation",
            RecommendationKind::Timing => "timing",
        }
    }

    /// Parse a lower-case kind name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "content" => Some(RecommendationKind::Content),
            "feature" => Some(RecommendationKind::Feature),
            "navigation" => Some(RecommendationKind::Navigation),
            "timing" => Some(RecommendationKind::Timing),
            _ => None,
        }
    }
}

/// A ranked suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveRecommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub target: String,
    pub reason: String,
    pub confidence: f64,
    /// Higher ranks first
    pub priority: u8,
}

/// Count of visits to one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageVisits {
    pub page: String,
    pub visits: u32,
}

/// Number of behaviors observed in one hour of the day (UTC)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourActivity {
    pub hour: u32,
    pub count: u32,
}

/// Summary of what the engine has learned about the current user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Active interest buckets, in bucket order
    pub interests: Vec<String>,
    /// Pages by visit count, descending
    pub preferred_pages: Vec<PageVisits>,
    /// Hours of day by activity, descending
    pub optimal_times: Vec<HourActivity>,
    /// Whether the user repeatedly searches or filters
    pub search_interest: bool,
    pub total_behaviors: usize,
    pub pattern_count: usize,
}
