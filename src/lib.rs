//! Leadscope - On-device behavioral intelligence for real-estate lead generation
//!
//! Leadscope turns raw visitor interactions into learned behavior patterns,
//! personalized recommendations and marketing attribution, entirely in process:
//! capture → bounded history → pattern analysis / channel classification →
//! recommendations and reports → bounded snapshot.
//!
//! ## Modules
//!
//! - **Behavior**: Learn patterns from user actions, predict next actions, rank recommendations
//! - **Attribution**: Classify acquisition channels and compute funnel and attribution reports
//! - **Intelligence**: The owned service object tying both together

pub mod attribution;
pub mod behavior;
pub mod clock;
pub mod config;
pub mod error;
pub mod history;
pub mod intelligence;
pub mod session;
pub mod sink;
pub mod source;
pub mod storage;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use attribution::{AnalyticsReport, AttributionEngine, AttributionEvent, Channel, EventKind, NavigationContext};
pub use behavior::{AdaptiveRecommendation, BehaviorEngine, RecommendationKind, UserProfile};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::IntelConfig;
pub use error::{Diagnostics, IntelError};
pub use intelligence::{Intelligence, UserInsights};
pub use sink::{ReportingSink, TracingSink};
pub use source::{Interaction, InteractionSource, NdjsonSource};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use types::{EventData, EventValue};

/// Leadscope version
pub const LEADSCOPE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name recorded by reporting integrations
pub const PRODUCER_NAME: &str = "leadscope";
