use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use leadscope::{BehaviorEngine, IntelConfig, ManualClock};
use proptest::prelude::*;

const ACTIONS: &[&str] = &[
    "search_properties",
    "view_listing",
    "schedule_tour",
    "filter_price",
    "open_map",
];
const PAGES: &[&str] = &["/", "/listings", "/about", "/contact"];

fn engine(config: IntelConfig) -> (BehaviorEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
    ));
    (BehaviorEngine::with_clock(config, clock.clone()), clock)
}

fn steps() -> impl Strategy<Value = Vec<(usize, usize, i64)>> {
    prop::collection::vec((0..ACTIONS.len(), 0..PAGES.len(), 0i64..7200), 1..80)
}

proptest! {
    #[test]
    fn confidence_is_monotonic_and_capped(steps in steps()) {
        let (mut engine, clock) = engine(IntelConfig::default());
        let mut seen: HashMap<String, f64> = HashMap::new();

        for (action, page, gap) in steps {
            engine.track(ACTIONS[action], PAGES[page], None);
            clock.advance(Duration::seconds(gap));

            for (key, pattern) in engine.patterns().entries() {
                prop_assert!(pattern.confidence <= 1.0);
                prop_assert!(pattern.frequency >= 1);
                if let Some(previous) = seen.get(key) {
                    prop_assert!(pattern.confidence >= *previous, "{} decreased", key);
                }
                seen.insert(key.clone(), pattern.confidence);
            }
        }
    }

    #[test]
    fn pattern_set_never_exceeds_cap_or_forgets(steps in steps(), cap in 1usize..12) {
        let config = IntelConfig { max_patterns: cap, ..IntelConfig::default() };
        let (mut engine, clock) = engine(config);
        let mut keys: HashSet<String> = HashSet::new();

        for (action, page, gap) in steps {
            engine.track(ACTIONS[action], PAGES[page], None);
            clock.advance(Duration::seconds(gap));

            prop_assert!(engine.patterns().len() <= cap);
            for key in &keys {
                prop_assert!(engine.pattern(key).is_some(), "{} was evicted", key);
            }
            keys.extend(engine.patterns().entries().iter().map(|(k, _)| k.clone()));
        }
    }

    #[test]
    fn predictions_are_short_distinct_and_sorted(steps in steps(), query in 0..ACTIONS.len()) {
        let config = IntelConfig { prediction_min_frequency: 1, ..IntelConfig::default() };
        let (mut engine, clock) = engine(config);
        for (action, page, gap) in steps {
            engine.track(ACTIONS[action], PAGES[page], None);
            clock.advance(Duration::seconds(gap));
        }

        let weighted = engine.predict_weighted(ACTIONS[query]);
        prop_assert!(weighted.len() <= 3);
        let distinct: HashSet<&String> = weighted.iter().map(|(a, _)| a).collect();
        prop_assert_eq!(distinct.len(), weighted.len());
        prop_assert!(weighted.iter().all(|(a, _)| a != ACTIONS[query]));
        for pair in weighted.windows(2) {
            prop_assert!(pair[0].1 >= pair[1].1);
        }

        let plain = engine.predict_next_action(PAGES[0], ACTIONS[query]);
        let names: Vec<String> = weighted.into_iter().map(|(a, _)| a).collect();
        prop_assert_eq!(plain, names);
    }

    #[test]
    fn history_keeps_most_recent(count in 1usize..60, cap in 1usize..20) {
        let config = IntelConfig { max_behaviors: cap, ..IntelConfig::default() };
        let (mut engine, _clock) = engine(config);
        for i in 0..count {
            engine.track(&format!("action_{}", i), "/", None);
        }

        let kept: Vec<String> = engine.behaviors().iter().map(|b| b.action.clone()).collect();
        let expected: Vec<String> = (count.saturating_sub(cap)..count)
            .map(|i| format!("action_{}", i))
            .collect();
        prop_assert_eq!(kept, expected);
    }
}
