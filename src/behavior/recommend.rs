//! Recommendation scoring
//!
//! Derives interests, preferred pages and active hours from the behavior
//! history and turns them into a ranked recommendation list. The list is
//! rebuilt from scratch on every call.

use chrono::FixedOffset;
use std::collections::HashMap;

use crate::behavior::patterns::hour_of_day;
use crate::behavior::types::{
    AdaptiveRecommendation, BehaviorEvent, HourActivity, PageVisits, RecommendationKind,
    UserProfile,
};

/// Interest buckets and the action keywords that feed them
pub const INTEREST_KEYWORDS: &[(&str, &[&str])] = &[
    ("luxury", &["luxury", "premium", "high-end", "exclusive", "penthouse"]),
    ("investment", &["invest", "roi", "market", "portfolio", "valuation"]),
    ("search", &["search", "filter", "browse", "find"]),
    ("location", &["location", "map", "area", "neighborhood", "directions"]),
];

/// Bucket count at which an interest becomes active
pub const INTEREST_THRESHOLD: u32 = 2;

/// Search/filter action count at which advanced search is suggested
pub const SEARCH_INTEREST_THRESHOLD: u32 = 3;

/// Interest bucket counts, in bucket order
pub fn interest_counts<'a>(
    behaviors: impl IntoIterator<Item = &'a BehaviorEvent>,
) -> Vec<(&'static str, u32)> {
    let mut counts: Vec<(&'static str, u32)> =
        INTEREST_KEYWORDS.iter().map(|(name, _)| (*name, 0)).collect();
    for behavior in behaviors {
        let action = behavior.action.to_lowercase();
        for (slot, (_, keywords)) in INTEREST_KEYWORDS.iter().enumerate() {
            if keywords.iter().any(|k| action.contains(k)) {
                counts[slot].1 += 1;
            }
        }
    }
    counts
}

/// Names of interest buckets that reached the threshold
pub fn active_interests<'a>(
    behaviors: impl IntoIterator<Item = &'a BehaviorEvent>,
) -> Vec<String> {
    interest_counts(behaviors)
        .into_iter()
        .filter(|(_, count)| *count >= INTEREST_THRESHOLD)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Visit counts per page, descending; equal counts keep first-visit order
pub fn preferred_pages<'a>(
    behaviors: impl IntoIterator<Item = &'a BehaviorEvent>,
) -> Vec<PageVisits> {
    let mut pages: Vec<PageVisits> = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();
    for behavior in behaviors {
        match slots.get(behavior.page.as_str()) {
            Some(&slot) => pages[slot].visits += 1,
            None => {
                slots.insert(behavior.page.as_str(), pages.len());
                pages.push(PageVisits {
                    page: behavior.page.clone(),
                    visits: 1,
                });
            }
        }
    }
    pages.sort_by(|a, b| b.visits.cmp(&a.visits));
    pages
}

/// Local hour-of-day histogram, descending; equal counts keep first-seen order
pub fn optimal_times<'a>(
    behaviors: impl IntoIterator<Item = &'a BehaviorEvent>,
    utc_offset: FixedOffset,
) -> Vec<HourActivity> {
    let mut hours: Vec<HourActivity> = Vec::new();
    let mut slots = [None::<usize>; 24];
    for behavior in behaviors {
        let hour = hour_of_day(behavior.timestamp, utc_offset);
        match slots[hour as usize] {
            Some(slot) => hours[slot].count += 1,
            None => {
                slots[hour as usize] = Some(hours.len());
                hours.push(HourActivity { hour, count: 1 });
            }
        }
    }
    hours.sort_by(|a, b| b.count.cmp(&a.count));
    hours
}

/// Whether searching or filtering recurs often enough to suggest advanced search
pub fn has_search_interest<'a>(behaviors: impl IntoIterator<Item = &'a BehaviorEvent>) -> bool {
    let searches = behaviors
        .into_iter()
        .filter(|b| {
            let action = b.action.to_lowercase();
            action.contains("search") || action.contains("filter")
        })
        .count() as u32;
    searches >= SEARCH_INTEREST_THRESHOLD
}

/// Build the full user profile
pub fn build_profile(
    behaviors: &[&BehaviorEvent],
    pattern_count: usize,
    utc_offset: FixedOffset,
) -> UserProfile {
    UserProfile {
        interests: active_interests(behaviors.iter().copied()),
        preferred_pages: preferred_pages(behaviors.iter().copied()),
        optimal_times: optimal_times(behaviors.iter().copied(), utc_offset),
        search_interest: has_search_interest(behaviors.iter().copied()),
        total_behaviors: behaviors.len(),
        pattern_count,
    }
}

/// Rebuild the recommendation list from a profile, sorted by priority descending
pub fn generate(profile: &UserProfile) -> Vec<AdaptiveRecommendation> {
    let mut recommendations = Vec::new();
    let has_interest = |name: &str| profile.interests.iter().any(|i| i == name);

    if has_interest("luxury") {
        recommendations.push(AdaptiveRecommendation {
            kind: RecommendationKind::Content,
            target: "luxury-services".to_string(),
            reason: "Repeated interest in luxury properties".to_string(),
            confidence: 0.8,
            priority: 9,
        });
    }

    if has_interest("investment") {
        recommendations.push(AdaptiveRecommendation {
            kind: RecommendationKind::Content,
            target: "market-insights".to_string(),
            reason: "Repeated interest in investment and market data".to_string(),
            confidence: 0.7,
            priority: 8,
        });
    }

    if let Some(top) = profile.preferred_pages.first() {
        recommendations.push(AdaptiveRecommendation {
            kind: RecommendationKind::Navigation,
            target: top.page.clone(),
            reason: format!("Most visited page ({} visits)", top.visits),
            confidence: 0.6,
            priority: 5,
        });
    }

    if let Some(top) = profile.optimal_times.first() {
        recommendations.push(AdaptiveRecommendation {
            kind: RecommendationKind::Timing,
            target: "tour-display".to_string(),
            reason: format!("Most active around {:02}:00", top.hour),
            confidence: 0.5,
            priority: 3,
        });
    }

    if profile.search_interest {
        recommendations.push(AdaptiveRecommendation {
            kind: RecommendationKind::Feature,
            target: "advanced-search".to_string(),
            reason: "Frequent searching and filtering".to_string(),
            confidence: 0.75,
            priority: 7,
        });
    }

    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    recommendations
}

/// Recommendations of `kind` (all when `None`), priority descending
pub fn filter(
    recommendations: &[AdaptiveRecommendation],
    kind: Option<RecommendationKind>,
) -> Vec<AdaptiveRecommendation> {
    let mut selected: Vec<AdaptiveRecommendation> = recommendations
        .iter()
        .filter(|r| kind.map_or(true, |k| r.kind == k))
        .cloned()
        .collect();
    selected.sort_by(|a, b| b.priority.cmp(&a.priority));
    selected
}
