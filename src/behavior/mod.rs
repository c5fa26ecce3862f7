//! Behavioral learning module
//!
//! Captures user actions, learns recurring patterns from them and turns the
//! learned profile into ranked recommendations.
//!
//! Flow: track → bounded history → pattern analysis → recommendation rebuild → snapshot

pub mod engine;
pub mod patterns;
pub mod recommend;
pub mod types;

pub use engine::{BehaviorEngine, BehaviorSnapshot};
pub use patterns::PatternAnalyzer;
pub use types::{
    AdaptiveRecommendation, BehaviorEvent, HourActivity, LearningPattern, PageVisits,
    RecommendationKind, UserProfile,
};
