//! Intelligence service
//!
//! This module provides the public API for Leadscope. `Intelligence` owns
//! both engines and routes every interaction to the right one; collaborators
//! (page components, forms, routing glue) talk to nothing else.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::attribution::{
    AnalyticsReport, AttributionEngine, AttributionEvent, ConversionFunnel, EventKind,
    NavigationContext,
};
use crate::behavior::{AdaptiveRecommendation, BehaviorEngine, RecommendationKind, UserProfile};
use crate::clock::{Clock, SystemClock};
use crate::config::IntelConfig;
use crate::error::{Diagnostics, IntelError};
use crate::sink::ReportingSink;
use crate::source::{Interaction, InteractionSource};
use crate::storage::KeyValueStore;
use crate::types::{EventData, EventValue};

/// Extension key carrying the action name on `user_action` attribution events
pub const ACTION_FIELD: &str = "action";

/// Summary of what is known about the current visitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInsights {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub profile: UserProfile,
    pub recommendations: Vec<AdaptiveRecommendation>,
    pub funnel: ConversionFunnel,
}

/// Owned intelligence service: behavior learning plus marketing attribution.
///
/// # Example
/// ```ignore
/// let mut intel = Intelligence::with_storage(IntelConfig::default(), store)?;
/// intel.set_navigation(NavigationContext::new(url).with_referrer(referrer));
/// intel.track_user_action("search_properties", "/listings", None);
/// let recs = intel.personalized_recommendations(None);
/// ```
pub struct Intelligence {
    config: IntelConfig,
    behavior: BehaviorEngine,
    attribution: AttributionEngine,
}

impl Default for Intelligence {
    fn default() -> Self {
        let config = IntelConfig::default();
        Self {
            behavior: BehaviorEngine::new(config.clone()),
            attribution: AttributionEngine::new(config.clone()),
            config,
        }
    }
}

impl Intelligence {
    /// Memory-only service.
    ///
    /// # Errors
    /// Returns `IntelError::Config` if `config` fails validation.
    pub fn new(config: IntelConfig) -> Result<Self, IntelError> {
        Self::with_parts(config, None, Arc::new(SystemClock))
    }

    /// Service persisting both engines to `store`.
    ///
    /// Previously saved state is loaded immediately. Missing or corrupt state
    /// never fails construction; it shows up in [`Intelligence::diagnostics`].
    pub fn with_storage(
        config: IntelConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, IntelError> {
        Self::with_parts(config, Some(store), Arc::new(SystemClock))
    }

    /// Service with every collaborator injected
    ///
    /// # Arguments
    /// * `config` - Engine configuration, validated here
    /// * `store` - Snapshot store, or `None` for memory-only
    /// * `clock` - Time source for event timestamps and session ids
    pub fn with_parts(
        config: IntelConfig,
        store: Option<Arc<dyn KeyValueStore>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, IntelError> {
        config.validate()?;
        let (behavior, attribution) = match store {
            Some(store) => (
                BehaviorEngine::with_storage(config.clone(), store.clone(), clock.clone()),
                AttributionEngine::with_storage(config.clone(), store, clock),
            ),
            None => (
                BehaviorEngine::with_clock(config.clone(), clock.clone()),
                AttributionEngine::with_clock(config.clone(), clock),
            ),
        };
        info!(
            namespace = %config.storage_namespace,
            session_id = attribution.session_id(),
            behaviors = behavior.behaviors().len(),
            events = attribution.events().len(),
            "intelligence service initialized"
        );
        Ok(Self {
            config,
            behavior,
            attribution,
        })
    }

    /// Forward every attribution event to `sink`
    pub fn set_sink(&mut self, sink: Box<dyn ReportingSink>) {
        self.attribution.set_sink(sink);
    }

    pub fn config(&self) -> &IntelConfig {
        &self.config
    }

    pub fn behavior(&self) -> &BehaviorEngine {
        &self.behavior
    }

    pub fn attribution(&self) -> &AttributionEngine {
        &self.attribution
    }

    pub fn session_id(&self) -> &str {
        self.attribution.session_id()
    }

    // ---- capture ----

    /// Record a user action.
    ///
    /// Feeds the behavior engine and records a `user_action` attribution event
    /// carrying the page and the caller's data.
    pub fn track_user_action(&mut self, action: &str, page: &str, data: Option<EventData>) {
        self.behavior.track(action, page, data.clone());

        let mut event_data = data.unwrap_or_default();
        if !page.is_empty() {
            event_data.page = Some(page.to_string());
        }
        event_data.insert_extra(
            ACTION_FIELD.to_string(),
            EventValue::Text(action.to_string()),
            self.config.max_extension_fields,
        );
        self.attribution.track_event(EventKind::UserAction, event_data);
    }

    /// Record a raw attribution event
    pub fn track_event(&mut self, kind: EventKind, data: EventData) -> AttributionEvent {
        self.attribution.track_event(kind, data)
    }

    /// Record a conversion. Feeds only the attribution engine.
    pub fn track_conversion(&mut self, value: Option<f64>, currency: Option<String>) {
        self.attribution.track_conversion(value, currency);
    }

    /// Attach an external user id; returns `false` if a different id is already set
    pub fn set_user_id(&mut self, user_id: &str) -> bool {
        self.attribution.set_user_id(user_id)
    }

    /// Replace the navigation context subsequent events are classified against
    pub fn set_navigation(&mut self, context: NavigationContext) {
        self.attribution.set_navigation(context);
    }

    /// Apply one interaction from a source
    pub fn apply(&mut self, interaction: Interaction) {
        match interaction {
            Interaction::Action { action, page, data } => {
                self.track_user_action(&action, &page, data)
            }
            Interaction::Event { kind, data } => {
                self.track_event(kind, data);
            }
            Interaction::Conversion { value, currency } => self.track_conversion(value, currency),
            Interaction::Identify { user_id } => {
                self.set_user_id(&user_id);
            }
            Interaction::Navigate(context) => self.set_navigation(context),
        }
    }

    /// Drain `source`, applying interactions in order. Returns how many were applied.
    pub fn consume(&mut self, source: &mut dyn InteractionSource) -> usize {
        let mut applied = 0;
        while let Some(interaction) = source.next_interaction() {
            self.apply(interaction);
            applied += 1;
        }
        debug!(applied, "interaction source drained");
        applied
    }

    // ---- queries ----

    /// Current recommendations, optionally of one kind, priority descending
    pub fn personalized_recommendations(
        &self,
        kind: Option<RecommendationKind>,
    ) -> Vec<AdaptiveRecommendation> {
        self.behavior.recommendations(kind)
    }

    /// Most likely next actions after `action` on `page`
    pub fn predict_user_behavior(&self, page: &str, action: &str) -> Vec<String> {
        self.behavior.predict_next_action(page, action)
    }

    pub fn user_insights(&self) -> UserInsights {
        UserInsights {
            session_id: self.attribution.session_id().to_string(),
            user_id: self.attribution.user_id().map(str::to_string),
            profile: self.behavior.user_profile(),
            recommendations: self.behavior.recommendations(None),
            funnel: self.attribution.conversion_funnel(),
        }
    }

    pub fn analytics_report(&self) -> AnalyticsReport {
        self.attribution.analytics_report()
    }

    pub fn user_journey(&self, session_id: &str) -> Vec<AttributionEvent> {
        self.attribution.user_journey(session_id)
    }

    /// Failures absorbed by either engine
    pub fn diagnostics(&self) -> Diagnostics {
        self.behavior
            .diagnostics()
            .merge(self.attribution.diagnostics())
    }

    // ---- lifecycle ----

    /// Write both snapshots now
    pub fn save(&self) -> Result<(), IntelError> {
        self.behavior.save()?;
        self.attribution.save()
    }

    /// Drop all state and start a new session
    pub fn reset(&mut self) {
        self.behavior.reset();
        self.attribution.reset();
        info!(session_id = self.attribution.session_id(), "intelligence state reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::Channel;
    use crate::clock::ManualClock;
    use crate::source::IterSource;
    use crate::storage::MemoryStore;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn intel() -> Intelligence {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap(),
        ));
        Intelligence::with_parts(IntelConfig::default(), None, clock).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = IntelConfig {
            max_events: 0,
            ..IntelConfig::default()
        };
        assert!(matches!(Intelligence::new(config), Err(IntelError::Config(_))));
    }

    #[test]
    fn test_user_action_feeds_both_engines() {
        let mut intel = intel();
        intel.track_user_action(
            "view_listing",
            "/listings/12",
            Some(EventData::new().with_extra("listing", "12")),
        );

        assert_eq!(intel.behavior().behaviors().len(), 1);
        let event = intel.attribution().events().last().unwrap();
        assert_eq!(event.event_type, EventKind::UserAction);
        assert_eq!(event.page, "/listings/12");
        assert_eq!(
            event.event_data.extra.get(ACTION_FIELD),
            Some(&EventValue::Text("view_listing".to_string()))
        );
        assert_eq!(
            event.event_data.extra.get("listing"),
            Some(&EventValue::Text("12".to_string()))
        );
    }

    #[test]
    fn test_conversion_feeds_attribution_only() {
        let mut intel = intel();
        intel.track_conversion(Some(1200.0), Some("USD".to_string()));

        assert!(intel.behavior().behaviors().is_empty());
        assert_eq!(intel.analytics_report().funnel.purchase, 1);
    }

    #[test]
    fn test_consume_applies_in_order() {
        let mut intel = intel();
        let mut source = IterSource::new(vec![
            Interaction::Navigate(
                NavigationContext::new("/").with_referrer("https://www.redfin.com/"),
            ),
            Interaction::Identify {
                user_id: "lead-7".to_string(),
            },
            Interaction::Event {
                kind: EventKind::PageView,
                data: EventData::new(),
            },
            Interaction::Conversion {
                value: None,
                currency: None,
            },
        ]);

        assert_eq!(intel.consume(&mut source), 4);
        let insights = intel.user_insights();
        assert_eq!(insights.user_id.as_deref(), Some("lead-7"));
        assert_eq!(insights.funnel.awareness, 1);
        assert_eq!(
            intel.analytics_report().attribution.last_touch[&Channel::RealEstatePortal],
            1.0
        );
    }

    #[test]
    fn test_state_survives_restart() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let session = {
            let mut intel = Intelligence::with_storage(IntelConfig::default(), store.clone()).unwrap();
            intel.track_user_action("search_homes", "/listings", None);
            intel.session_id().to_string()
        };

        let intel = Intelligence::with_storage(IntelConfig::default(), store).unwrap();
        assert_eq!(intel.session_id(), session);
        assert_eq!(intel.behavior().behaviors().len(), 1);
        assert_eq!(intel.user_journey(&session).len(), 1);
        assert_eq!(intel.diagnostics(), Diagnostics::default());
    }

    #[test]
    fn test_reset() {
        let mut intel = intel();
        intel.track_user_action("search_homes", "/listings", None);
        let before = intel.session_id().to_string();
        intel.reset();

        assert_ne!(intel.session_id(), before);
        assert!(intel.personalized_recommendations(None).is_empty());
        assert_eq!(intel.analytics_report().total_events, 0);
    }
}
