//! Session context
//!
//! One session identifier per engine instantiation plus an optional external
//! user identifier.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

/// Length of the random suffix appended to session identifiers
const SESSION_SUFFIX_LEN: usize = 9;

/// Process-lifetime session identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    session_id: String,
    user_id: Option<String>,
}

impl SessionContext {
    /// Start a new session seeded from `now`
    pub fn start(now: DateTime<Utc>) -> Self {
        Self {
            session_id: generate_session_id(now),
            user_id: None,
        }
    }

    /// Rebuild a session from persisted identifiers
    pub fn restore(session_id: String, user_id: Option<String>) -> Self {
        Self {
            session_id,
            user_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Attach an external user identifier.
    ///
    /// The identifier can be set once. Setting the same value again is a no-op
    /// that returns `true`; a different value is ignored and returns `false`.
    pub fn set_user_id(&mut self, user_id: impl Into<String>) -> bool {
        let user_id = user_id.into();
        match &self.user_id {
            None => {
                debug!(session_id = %self.session_id, user_id = %user_id, "user identified");
                self.user_id = Some(user_id);
                true
            }
            Some(existing) if *existing == user_id => true,
            Some(existing) => {
                warn!(
                    session_id = %self.session_id,
                    existing = %existing,
                    rejected = %user_id,
                    "user id already set for session, ignoring"
                );
                false
            }
        }
    }
}

/// `session_<unix millis>_<random suffix>`
fn generate_session_id(now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "session_{}_{}",
        now.timestamp_millis(),
        &random[..SESSION_SUFFIX_LEN]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_id_format() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();
        let session = SessionContext::start(now);

        let id = session.session_id();
        assert!(id.starts_with(&format!("session_{}_", now.timestamp_millis())));
        assert_eq!(id.rsplit('_').next().unwrap().len(), SESSION_SUFFIX_LEN);
    }

    #[test]
    fn test_sessions_are_unique() {
        let now = Utc::now();
        assert_ne!(
            SessionContext::start(now).session_id(),
            SessionContext::start(now).session_id()
        );
    }

    #[test]
    fn test_user_id_settable_once() {
        let mut session = SessionContext::start(Utc::now());
        assert!(session.user_id().is_none());

        assert!(session.set_user_id("user-1"));
        assert!(session.set_user_id("user-1"));
        assert!(!session.set_user_id("user-2"));
        assert_eq!(session.user_id(), Some("user-1"));
    }

    #[test]
    fn test_restore_keeps_identifiers() {
        let session = SessionContext::restore("session_1_abc".to_string(), Some("u".to_string()));
        assert_eq!(session.session_id(), "session_1_abc");
        assert_eq!(session.user_id(), Some("u"));
    }
}
