//! Attribution engine
//!
//! Records classified attribution events into a bounded log and derives the
//! funnel, attribution model and per-channel/per-page rollups from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::attribution::analytics;
use crate::attribution::channel;
use crate::attribution::types::{
    AnalyticsReport, AttributionEvent, AttributionModel, Channel, ChannelPerformance,
    ConversionFunnel, EventKind, EventSource, NavigationContext, PagePerformance,
};
use crate::clock::{Clock, SystemClock};
use crate::config::IntelConfig;
use crate::error::{Diagnostics, IntelError};
use crate::history::BoundedHistory;
use crate::session::SessionContext;
use crate::sink::ReportingSink;
use crate::storage::{KeyValueStore, SnapshotSlot};
use crate::types::EventData;

/// Persisted attribution state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionSnapshot {
    pub events: Vec<AttributionEvent>,
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub last_updated: DateTime<Utc>,
}

/// Stateful attribution engine
pub struct AttributionEngine {
    config: IntelConfig,
    events: BoundedHistory<AttributionEvent>,
    session: SessionContext,
    navigation: NavigationContext,
    sink: Option<Box<dyn ReportingSink>>,
    slot: Option<SnapshotSlot>,
    clock: Arc<dyn Clock>,
    diagnostics: Diagnostics,
}

impl Default for AttributionEngine {
    fn default() -> Self {
        Self::new(IntelConfig::default())
    }
}

impl AttributionEngine {
    /// Memory-only engine using the system clock
    pub fn new(config: IntelConfig) -> Self {
        Self::build(config, None, Arc::new(SystemClock))
    }

    /// Memory-only engine with an explicit clock
    pub fn with_clock(config: IntelConfig, clock: Arc<dyn Clock>) -> Self {
        Self::build(config, None, clock)
    }

    /// Engine persisting to `store`; a previously saved log and session are loaded immediately
    pub fn with_storage(
        config: IntelConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let slot = SnapshotSlot::new(store, config.attribution_key());
        let mut engine = Self::build(config, Some(slot), clock);
        engine.load();
        engine
    }

    fn build(config: IntelConfig, slot: Option<SnapshotSlot>, clock: Arc<dyn Clock>) -> Self {
        Self {
            events: BoundedHistory::new(config.max_events),
            session: SessionContext::start(clock.now()),
            navigation: NavigationContext::new("/"),
            sink: None,
            slot,
            clock,
            diagnostics: Diagnostics::default(),
            config,
        }
    }

    /// Forward every recorded event to `sink`
    pub fn set_sink(&mut self, sink: Box<dyn ReportingSink>) {
        self.sink = Some(sink);
    }

    /// Replace the navigation context new events are classified against
    pub fn set_navigation(&mut self, context: NavigationContext) {
        debug!(url = %context.url, referrer = ?context.referrer, "navigation context updated");
        self.navigation = context;
    }

    pub fn navigation(&self) -> &NavigationContext {
        &self.navigation
    }

    /// Attach an external user id to the session. See [`SessionContext::set_user_id`].
    pub fn set_user_id(&mut self, user_id: impl Into<String>) -> bool {
        let accepted = self.session.set_user_id(user_id);
        if accepted {
            self.persist();
        }
        accepted
    }

    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.user_id()
    }

    /// Record one attribution event against the current navigation context.
    ///
    /// Returns a copy of the recorded event.
    pub fn track_event(&mut self, kind: EventKind, data: EventData) -> AttributionEvent {
        let mut data = data;
        data.truncate_extra(self.config.max_extension_fields);

        let classification = channel::classify(&self.navigation);
        let page = data
            .page
            .clone()
            .unwrap_or_else(|| classification.landing_page.clone());
        let event = AttributionEvent {
            id: Uuid::new_v4().to_string(),
            timestamp: self.clock.now(),
            session_id: self.session.session_id().to_string(),
            user_id: self.session.user_id().map(str::to_string),
            event_type: kind,
            event_data: data,
            page,
            source: EventSource {
                channel: classification.channel,
                campaign: classification.campaign,
                referrer: self.navigation.referrer.clone(),
                landing_page: classification.landing_page,
            },
            device: channel::classify_device(&self.navigation),
            location: self.navigation.location.clone(),
        };

        debug!(
            event_type = event.event_type.as_str(),
            channel = %event.source.channel,
            page = %event.page,
            "attribution event tracked"
        );

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.record(&event) {
                debug!(event_id = %event.id, error = %e, "reporting sink rejected event");
                self.diagnostics.record_sink_failure();
            }
        }

        let evicted = self.events.push(event.clone());
        if evicted > 0 {
            debug!(evicted, capacity = self.events.capacity(), "event log full, oldest evicted");
        }
        self.persist();
        event
    }

    /// Record a conversion with an optional monetary value
    pub fn track_conversion(&mut self, value: Option<f64>, currency: Option<String>) {
        self.track_event(EventKind::Conversion, EventData::conversion(value, currency));
    }

    pub fn events(&self) -> &BoundedHistory<AttributionEvent> {
        &self.events
    }

    fn event_refs(&self) -> Vec<&AttributionEvent> {
        self.events.iter().collect()
    }

    pub fn conversion_funnel(&self) -> ConversionFunnel {
        analytics::conversion_funnel(&self.event_refs())
    }

    pub fn attribution_model(&self) -> AttributionModel {
        analytics::attribution_model(&self.event_refs(), self.config.time_decay_rate)
    }

    pub fn channel_performance(&self) -> BTreeMap<Channel, ChannelPerformance> {
        analytics::channel_performance(&self.event_refs())
    }

    pub fn top_pages(&self) -> Vec<PagePerformance> {
        analytics::top_pages(&self.event_refs())
    }

    /// Events of `session_id`, oldest first
    pub fn user_journey(&self, session_id: &str) -> Vec<AttributionEvent> {
        analytics::user_journey(&self.event_refs(), session_id)
    }

    /// Every derived metric in one report
    pub fn analytics_report(&self) -> AnalyticsReport {
        let events = self.event_refs();
        AnalyticsReport {
            session_id: self.session.session_id().to_string(),
            user_id: self.session.user_id().map(str::to_string),
            total_events: events.len(),
            unique_sessions: analytics::unique_sessions(&events),
            funnel: analytics::conversion_funnel(&events),
            attribution: analytics::attribution_model(&events, self.config.time_decay_rate),
            channel_performance: analytics::channel_performance(&events),
            top_pages: analytics::top_pages(&events),
            generated_at: self.clock.now(),
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Bounded snapshot of the current state
    pub fn snapshot(&self) -> AttributionSnapshot {
        AttributionSnapshot {
            events: self.events.tail_vec(self.config.persisted_events),
            session_id: self.session.session_id().to_string(),
            user_id: self.session.user_id().map(str::to_string),
            last_updated: self.clock.now(),
        }
    }

    /// Replace the event log and session with `snapshot`
    pub fn restore(&mut self, snapshot: AttributionSnapshot) {
        self.events = BoundedHistory::from_vec(snapshot.events, self.config.max_events);
        self.session = SessionContext::restore(snapshot.session_id, snapshot.user_id);
    }

    /// Write the snapshot to storage. A memory-only engine succeeds trivially.
    pub fn save(&self) -> Result<(), IntelError> {
        match &self.slot {
            Some(slot) => slot.save(&self.snapshot()),
            None => Ok(()),
        }
    }

    /// Reload state from storage, returning whether a snapshot was restored.
    ///
    /// Missing or corrupt snapshots leave an empty log and a fresh session.
    pub fn load(&mut self) -> bool {
        let Some(slot) = self.slot.clone() else {
            return false;
        };
        self.events.clear();
        match slot.load::<AttributionSnapshot>() {
            Ok(Some(snapshot)) => {
                debug!(
                    key = slot.key(),
                    events = snapshot.events.len(),
                    session_id = %snapshot.session_id,
                    "attribution snapshot restored"
                );
                self.restore(snapshot);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(key = slot.key(), error = %e, "failed to load attribution snapshot, starting empty");
                self.diagnostics.record_storage_failure(&e);
                if matches!(e, IntelError::Json(_)) {
                    self.diagnostics.recovered_from_corrupt_state = true;
                }
                false
            }
        }
    }

    /// Drop the event log and start a new session, in memory and in storage
    pub fn reset(&mut self) {
        self.events.clear();
        self.session = SessionContext::start(self.clock.now());
        if let Some(slot) = &self.slot {
            if let Err(e) = slot.clear() {
                warn!(key = slot.key(), error = %e, "failed to clear attribution snapshot");
                self.diagnostics.record_storage_failure(&e);
            }
        }
    }

    fn persist(&mut self) {
        if let Err(e) = self.save() {
            warn!(error = %e, "failed to save attribution snapshot, continuing in memory");
            self.diagnostics.record_storage_failure(&e);
        }
    }
}
