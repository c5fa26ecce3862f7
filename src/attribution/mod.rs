//! Marketing attribution module
//!
//! Flow: navigation context → channel/device classification → bounded event
//! log → funnel, attribution model, channel and page rollups on demand.

pub mod analytics;
pub mod channel;
pub mod engine;
pub mod types;

pub use engine::{AttributionEngine, AttributionSnapshot};
pub use types::{
    AnalyticsReport, AttributionEvent, AttributionModel, Channel, ChannelPerformance,
    ConversionFunnel, DeviceInfo, DeviceType, EventKind, EventSource, Location,
    NavigationContext, PagePerformance,
};
