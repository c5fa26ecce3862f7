//! Reporting sinks
//!
//! An optional destination every attribution event is forwarded to after it
//! is recorded. Forwarding is best-effort: a failing sink never affects
//! tracking.

use tracing::info;

use crate::attribution::AttributionEvent;
use crate::error::IntelError;

/// Receives each attribution event as it is recorded
pub trait ReportingSink: Send {
    fn record(&self, event: &AttributionEvent) -> Result<(), IntelError>;
}

/// Mirrors events to `tracing` at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ReportingSink for TracingSink {
    fn record(&self, event: &AttributionEvent) -> Result<(), IntelError> {
        info!(
            event_id = %event.id,
            session_id = %event.session_id,
            event_type = event.event_type.as_str(),
            channel = %event.channel(),
            page = %event.page,
            conversion = event.is_conversion(),
            "attribution event"
        );
        Ok(())
    }
}
