//! Attribution analytics
//!
//! Funnel counts, multi-model attribution, channel and page rollups. Every
//! figure is recomputed from the full event log on demand.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::attribution::types::{
    AttributionEvent, AttributionModel, Channel, ChannelPerformance, ConversionFunnel, EventKind,
    PagePerformance,
};

/// Form identifiers containing this mark submissions as contact intent
const CONTACT_FORM_MARKER: &str = "contact";

/// Count events per funnel stage
pub fn conversion_funnel(events: &[&AttributionEvent]) -> ConversionFunnel {
    let mut funnel = ConversionFunnel::default();
    for event in events {
        match &event.event_type {
            EventKind::PageView | EventKind::ScrollMilestone => funnel.awareness += 1,
            EventKind::ButtonClick | EventKind::FormFieldFocus => funnel.interest += 1,
            EventKind::FormSubmit => {
                funnel.consideration += 1;
                let is_contact = event
                    .event_data
                    .form_id
                    .as_deref()
                    .is_some_and(|id| id.contains(CONTACT_FORM_MARKER));
                if is_contact {
                    funnel.intent += 1;
                }
            }
            EventKind::UserLogin => funnel.retention += 1,
            _ => {}
        }
        if event.is_conversion() {
            funnel.purchase += 1;
        }
    }
    funnel
}

/// Events of the conversion's session up to and including its timestamp,
/// oldest first
fn touches_before<'a>(
    events: &[&'a AttributionEvent],
    conversion: &AttributionEvent,
) -> Vec<&'a AttributionEvent> {
    let mut touches: Vec<&AttributionEvent> = events
        .iter()
        .copied()
        .filter(|e| e.session_id == conversion.session_id && e.timestamp <= conversion.timestamp)
        .collect();
    touches.sort_by_key(|e| e.timestamp);
    touches
}

/// Credit channels for every conversion under the four attribution models.
///
/// For each conversion the touch path is every event of the same session at
/// or before it. First and last touch get one point each; each distinct
/// channel on the path gets an equal share of one point; each touch at
/// position `i` of `n` adds `exp(-decay_rate * (n - 1 - i))`.
pub fn attribution_model(events: &[&AttributionEvent], decay_rate: f64) -> AttributionModel {
    let mut model = AttributionModel::default();

    for conversion in events.iter().filter(|e| e.is_conversion()) {
        let touches = touches_before(events, conversion);
        let (Some(first), Some(last)) = (touches.first(), touches.last()) else {
            continue;
        };

        *model.first_touch.entry(first.channel()).or_insert(0.0) += 1.0;
        *model.last_touch.entry(last.channel()).or_insert(0.0) += 1.0;

        let mut distinct: Vec<Channel> = Vec::new();
        for touch in &touches {
            if !distinct.contains(&touch.channel()) {
                distinct.push(touch.channel());
            }
        }
        let share = 1.0 / distinct.len() as f64;
        for channel in distinct {
            *model.multi_touch.entry(channel).or_insert(0.0) += share;
        }

        let n = touches.len();
        for (i, touch) in touches.iter().enumerate() {
            let weight = (-decay_rate * (n - 1 - i) as f64).exp();
            *model.time_decay.entry(touch.channel()).or_insert(0.0) += weight;
        }
    }

    model
}

/// Visits, conversions, conversion rate and active span per channel
pub fn channel_performance(events: &[&AttributionEvent]) -> BTreeMap<Channel, ChannelPerformance> {
    struct Accumulator {
        performance: ChannelPerformance,
        first: chrono::DateTime<chrono::Utc>,
        last: chrono::DateTime<chrono::Utc>,
    }

    let mut by_channel: BTreeMap<Channel, Accumulator> = BTreeMap::new();
    for event in events {
        let acc = by_channel.entry(event.channel()).or_insert_with(|| Accumulator {
            performance: ChannelPerformance::default(),
            first: event.timestamp,
            last: event.timestamp,
        });
        if event.event_type == EventKind::PageView {
            acc.performance.visits += 1;
        }
        if event.is_conversion() {
            acc.performance.conversions += 1;
        }
        acc.first = acc.first.min(event.timestamp);
        acc.last = acc.last.max(event.timestamp);
    }

    by_channel
        .into_iter()
        .map(|(channel, acc)| {
            let mut performance = acc.performance;
            performance.conversion_rate = if performance.visits > 0 {
                performance.conversions as f64 / performance.visits as f64 * 100.0
            } else {
                0.0
            };
            performance.avg_session_duration =
                (acc.last - acc.first).num_milliseconds() as f64 / 1000.0;
            (channel, performance)
        })
        .collect()
}

/// Page views and bounces per page, most viewed first.
///
/// A view bounces when its session recorded exactly one event of any type.
pub fn top_pages(events: &[&AttributionEvent]) -> Vec<PagePerformance> {
    let mut session_sizes: HashMap<&str, usize> = HashMap::new();
    for event in events {
        *session_sizes.entry(event.session_id.as_str()).or_insert(0) += 1;
    }

    let mut pages: Vec<PagePerformance> = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();
    for event in events.iter().filter(|e| e.event_type == EventKind::PageView) {
        let bounced = session_sizes.get(event.session_id.as_str()) == Some(&1);
        let slot = *slots.entry(event.page.as_str()).or_insert_with(|| {
            pages.push(PagePerformance {
                page: event.page.clone(),
                views: 0,
                bounces: 0,
                bounce_rate: 0.0,
            });
            pages.len() - 1
        });
        let entry = &mut pages[slot];
        entry.views += 1;
        if bounced {
            entry.bounces += 1;
        }
    }

    for page in &mut pages {
        page.bounce_rate = page.bounces as f64 / page.views as f64 * 100.0;
    }
    pages.sort_by(|a, b| b.views.cmp(&a.views));
    pages
}

/// Events of one session, oldest first
pub fn user_journey(events: &[&AttributionEvent], session_id: &str) -> Vec<AttributionEvent> {
    let mut journey: Vec<AttributionEvent> = events
        .iter()
        .filter(|e| e.session_id == session_id)
        .map(|e| (*e).clone())
        .collect();
    journey.sort_by_key(|e| e.timestamp);
    journey
}

/// Number of distinct sessions in the log
pub fn unique_sessions(events: &[&AttributionEvent]) -> usize {
    events
        .iter()
        .map(|e| e.session_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::types::{DeviceInfo, DeviceType, EventSource};
    use crate::types::EventData;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn event(
        session: &str,
        kind: EventKind,
        channel: Channel,
        page: &str,
        offset_sec: i64,
        data: EventData,
    ) -> AttributionEvent {
        AttributionEvent {
            id: format!("{}-{}", session, offset_sec),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
                + Duration::seconds(offset_sec),
            session_id: session.to_string(),
            user_id: None,
            event_type: kind,
            event_data: data,
            page: page.to_string(),
            source: EventSource {
                channel,
                campaign: None,
                referrer: None,
                landing_page: page.to_string(),
            },
            device: DeviceInfo {
                device_type: DeviceType::Desktop,
                browser: "Chrome".to_string(),
                os: "macOS".to_string(),
            },
            location: None,
        }
    }

    fn refs(events: &[AttributionEvent]) -> Vec<&AttributionEvent> {
        events.iter().collect()
    }

    #[test]
    fn test_empty_log() {
        let events: Vec<&AttributionEvent> = Vec::new();
        assert_eq!(conversion_funnel(&events), ConversionFunnel::default());
        assert!(channel_performance(&events).is_empty());
        assert!(top_pages(&events).is_empty());
        assert_eq!(attribution_model(&events, 0.5), AttributionModel::default());
    }

    #[test]
    fn test_funnel_stages_are_independent() {
        let events = vec![
            event("s", EventKind::PageView, Channel::Direct, "/", 0, EventData::new()),
            event("s", EventKind::ScrollMilestone, Channel::Direct, "/", 1, EventData::new()),
            event("s", EventKind::ButtonClick, Channel::Direct, "/", 2, EventData::new()),
            event("s", EventKind::FormFieldFocus, Channel::Direct, "/", 3, EventData::new()),
            event(
                "s",
                EventKind::FormSubmit,
                Channel::Direct,
                "/contact",
                4,
                EventData::new().with_form_id("contact-form"),
            ),
            event(
                "s",
                EventKind::FormSubmit,
                Channel::Direct,
                "/newsletter",
                5,
                EventData::new().with_form_id("newsletter"),
            ),
            event("s", EventKind::Conversion, Channel::Direct, "/", 6, EventData::conversion(None, None)),
            event("s", EventKind::UserLogin, Channel::Direct, "/", 7, EventData::new()),
        ];
        let funnel = conversion_funnel(&refs(&events));
        assert_eq!(
            funnel,
            ConversionFunnel {
                awareness: 2,
                interest: 2,
                consideration: 2,
                intent: 1,
                purchase: 1,
                retention: 1,
            }
        );
    }

    #[test]
    fn test_attribution_models_over_path() {
        // Path: social -> direct -> organic -> conversion(direct)
        let events = vec![
            event("s", EventKind::PageView, Channel::SocialMedia, "/", 0, EventData::new()),
            event("s", EventKind::PageView, Channel::Direct, "/a", 10, EventData::new()),
            event("s", EventKind::PageView, Channel::OrganicSearch, "/b", 20, EventData::new()),
            event("s", EventKind::Conversion, Channel::Direct, "/b", 30, EventData::conversion(Some(1.0), None)),
            // Later event in the same session is not part of the path
            event("s", EventKind::PageView, Channel::Email, "/c", 40, EventData::new()),
            // Other sessions are ignored
            event("t", EventKind::PageView, Channel::Referral, "/", 5, EventData::new()),
        ];
        let model = attribution_model(&refs(&events), 0.5);

        assert_eq!(model.first_touch, BTreeMap::from([(Channel::SocialMedia, 1.0)]));
        assert_eq!(model.last_touch, BTreeMap::from([(Channel::Direct, 1.0)]));

        let third = 1.0 / 3.0;
        assert_eq!(model.multi_touch.len(), 3);
        for channel in [Channel::SocialMedia, Channel::Direct, Channel::OrganicSearch] {
            assert!((model.multi_touch[&channel] - third).abs() < 1e-9);
        }

        // n = 4: weights e^-1.5, e^-1.0, e^-0.5, e^0
        let social = (-1.5f64).exp();
        let direct = (-1.0f64).exp() + 1.0;
        let organic = (-0.5f64).exp();
        assert!((model.time_decay[&Channel::SocialMedia] - social).abs() < 1e-9);
        assert!((model.time_decay[&Channel::Direct] - direct).abs() < 1e-9);
        assert!((model.time_decay[&Channel::OrganicSearch] - organic).abs() < 1e-9);
        assert!(!model.time_decay.contains_key(&Channel::Email));
    }

    #[test]
    fn test_attribution_accumulates_across_conversions() {
        let events = vec![
            event("a", EventKind::Conversion, Channel::Direct, "/", 0, EventData::conversion(None, None)),
            event("b", EventKind::Conversion, Channel::Direct, "/", 0, EventData::conversion(None, None)),
        ];
        let model = attribution_model(&refs(&events), 0.5);
        assert_eq!(model.first_touch[&Channel::Direct], 2.0);
        assert_eq!(model.multi_touch[&Channel::Direct], 2.0);
        assert_eq!(model.time_decay[&Channel::Direct], 2.0);
    }

    #[test]
    fn test_channel_performance() {
        let events = vec![
            event("s", EventKind::PageView, Channel::Email, "/", 0, EventData::new()),
            event("s", EventKind::PageView, Channel::Email, "/a", 30, EventData::new()),
            event("s", EventKind::Conversion, Channel::Email, "/a", 90, EventData::conversion(None, None)),
            event("t", EventKind::ButtonClick, Channel::Referral, "/", 0, EventData::new()),
        ];
        let performance = channel_performance(&refs(&events));

        let email = &performance[&Channel::Email];
        assert_eq!(email.visits, 2);
        assert_eq!(email.conversions, 1);
        assert!((email.conversion_rate - 50.0).abs() < 1e-9);
        assert!((email.avg_session_duration - 90.0).abs() < 1e-9);

        let referral = &performance[&Channel::Referral];
        assert_eq!(referral.visits, 0);
        assert_eq!(referral.conversion_rate, 0.0);
        assert_eq!(referral.avg_session_duration, 0.0);
    }

    #[test]
    fn test_top_pages_and_bounces() {
        let events = vec![
            event("solo", EventKind::PageView, Channel::Direct, "/about", 0, EventData::new()),
            event("multi", EventKind::PageView, Channel::Direct, "/listings", 0, EventData::new()),
            event("multi", EventKind::PageView, Channel::Direct, "/listings", 5, EventData::new()),
            event("multi", EventKind::PageView, Channel::Direct, "/about", 9, EventData::new()),
            // One event, but not a page view: the session bounces with no view to count
            event("click", EventKind::ButtonClick, Channel::Direct, "/contact", 0, EventData::new()),
        ];
        let pages = top_pages(&refs(&events));

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page, "/about");
        assert_eq!(pages[0].views, 2);
        assert_eq!(pages[0].bounces, 1);
        assert!((pages[0].bounce_rate - 50.0).abs() < 1e-9);
        assert_eq!(pages[1].page, "/listings");
        assert_eq!(pages[1].bounce_rate, 0.0);
    }

    #[test]
    fn test_top_pages_many_distinct_listings() {
        let mut events: Vec<AttributionEvent> = (0..5000)
            .map(|i| {
                let page = format!("/listings/property-{}", i);
                event("browse", EventKind::PageView, Channel::Direct, &page, i, EventData::new())
            })
            .collect();
        events.push(event(
            "browse",
            EventKind::PageView,
            Channel::Direct,
            "/listings/property-2500",
            6000,
            EventData::new(),
        ));
        let pages = top_pages(&refs(&events));

        assert_eq!(pages.len(), 5000);
        assert_eq!(pages[0].page, "/listings/property-2500");
        assert_eq!(pages[0].views, 2);
        // Equal view counts keep first-seen order
        assert_eq!(pages[1].page, "/listings/property-0");
        assert_eq!(pages[4999].page, "/listings/property-4999");
        assert!(pages.iter().all(|p| p.bounces == 0));
    }

    #[test]
    fn test_user_journey_ordered() {
        let events = vec![
            event("s", EventKind::PageView, Channel::Direct, "/b", 20, EventData::new()),
            event("t", EventKind::PageView, Channel::Direct, "/x", 10, EventData::new()),
            event("s", EventKind::PageView, Channel::Direct, "/a", 10, EventData::new()),
        ];
        let journey = user_journey(&refs(&events), "s");
        let pages: Vec<&str> = journey.iter().map(|e| e.page.as_str()).collect();
        assert_eq!(pages, vec!["/a", "/b"]);
        assert_eq!(unique_sessions(&refs(&events)), 2);
    }
}
