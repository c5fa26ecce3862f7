//! Attribution data types
//!
//! Events recorded for marketing attribution, the navigation context they are
//! classified from, and the derived report structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::EventData;

/// Coarse acquisition-source label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Direct,
    OrganicSearch,
    SocialMedia,
    PaidSearch,
    Email,
    Referral,
    RealEstatePortal,
    Unknown,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Direct => "direct",
            Channel::OrganicSearch => "organic_search",
            Channel::SocialMedia => "social_media",
            Channel::PaidSearch => "paid_search",
            Channel::Email => "email",
            Channel::Referral => "referral",
            Channel::RealEstatePortal => "real_estate_portal",
            Channel::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event type. Known kinds drive the funnel; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PageView,
    ScrollMilestone,
    ButtonClick,
    FormFieldFocus,
    FormSubmit,
    UserLogin,
    Conversion,
    UserAction,
    #[serde(untagged)]
    Custom(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::PageView => "page_view",
            EventKind::ScrollMilestone => "scroll_milestone",
            EventKind::ButtonClick => "button_click",
            EventKind::FormFieldFocus => "form_field_focus",
            EventKind::FormSubmit => "form_submit",
            EventKind::UserLogin => "user_login",
            EventKind::Conversion => "conversion",
            EventKind::UserAction => "user_action",
            EventKind::Custom(name) => name.as_str(),
        }
    }

    /// Map a free-form event type name onto a kind
    pub fn parse(name: &str) -> Self {
        match name {
            "page_view" => EventKind::PageView,
            "scroll_milestone" => EventKind::ScrollMilestone,
            "button_click" => EventKind::ButtonClick,
            "form_field_focus" => EventKind::FormFieldFocus,
            "form_submit" => EventKind::FormSubmit,
            "user_login" => EventKind::UserLogin,
            "conversion" => EventKind::Conversion,
            "user_action" => EventKind::UserAction,
            other => EventKind::Custom(other.to_string()),
        }
    }
}

impl From<&str> for EventKind {
    fn from(name: &str) -> Self {
        EventKind::parse(name)
    }
}

/// Device form factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

/// Coarse geographic location supplied by the platform
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

/// What the platform knows about the current page view
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationContext {
    /// Full URL of the current page, including any campaign query parameters
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl NavigationContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn with_viewport_width(mut self, width: u32) -> Self {
        self.viewport_width = Some(width);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

/// Where an event's visit came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    pub channel: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    pub landing_page: String,
}

/// Device the event was recorded on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub browser: String,
    pub os: String,
}

/// One interaction recorded for marketing attribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub event_type: EventKind,
    #[serde(default)]
    pub event_data: EventData,
    /// Route path the event is counted against
    pub page: String,
    pub source: EventSource,
    pub device: DeviceInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl AttributionEvent {
    pub fn is_conversion(&self) -> bool {
        self.event_data.conversion
    }

    pub fn channel(&self) -> Channel {
        self.source.channel
    }
}

/// Funnel stage counts. Stages are independent counts, not a partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionFunnel {
    pub awareness: u64,
    pub interest: u64,
    pub consideration: u64,
    pub intent: u64,
    pub purchase: u64,
    pub retention: u64,
}

/// Credit per channel under the four attribution models
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionModel {
    pub first_touch: BTreeMap<Channel, f64>,
    pub last_touch: BTreeMap<Channel, f64>,
    pub multi_touch: BTreeMap<Channel, f64>,
    pub time_decay: BTreeMap<Channel, f64>,
}

/// Per-channel rollup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPerformance {
    pub visits: u64,
    pub conversions: u64,
    /// Conversions per visit, in percent
    pub conversion_rate: f64,
    /// Seconds between the channel's first and last event
    pub avg_session_duration: f64,
}

/// Per-page rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePerformance {
    pub page: String,
    pub views: u64,
    pub bounces: u64,
    /// Bounces per view, in percent
    pub bounce_rate: f64,
}

/// Everything the attribution engine reports, in one structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub total_events: usize,
    pub unique_sessions: usize,
    pub funnel: ConversionFunnel,
    pub attribution: AttributionModel,
    pub channel_performance: BTreeMap<Channel, ChannelPerformance>,
    pub top_pages: Vec<PagePerformance>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_serialization() {
        let json = serde_json::to_string(&Channel::RealEstatePortal).unwrap();
        assert_eq!(json, "\"real_estate_portal\"");
        assert_eq!(Channel::OrganicSearch.to_string(), "organic_search");
    }

    #[test]
    fn test_event_kind_known_and_custom() {
        assert_eq!(serde_json::to_string(&EventKind::PageView).unwrap(), "\"page_view\"");

        let custom: EventKind = serde_json::from_str("\"video_play\"").unwrap();
        assert_eq!(custom, EventKind::Custom("video_play".to_string()));
        assert_eq!(serde_json::to_string(&custom).unwrap(), "\"video_play\"");

        let known: EventKind = serde_json::from_str("\"form_submit\"").unwrap();
        assert_eq!(known, EventKind::FormSubmit);
    }

    #[test]
    fn test_event_kind_parse() {
        assert_eq!(EventKind::parse("user_login"), EventKind::UserLogin);
        assert_eq!(EventKind::parse("share").as_str(), "share");
    }

    #[test]
    fn test_channel_map_serializes_as_object() {
        let mut model = AttributionModel::default();
        model.first_touch.insert(Channel::Direct, 1.0);
        let value = serde_json::to_value(&model).unwrap();
        assert_eq!(value["firstTouch"]["direct"], 1.0);
    }
}
