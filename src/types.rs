//! Shared event payload types
//!
//! Caller-supplied event metadata is split into typed core fields that the
//! analytics read, plus a bounded map of primitive extension values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::DEFAULT_MAX_EXTENSION_FIELDS;

/// A primitive extension value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl EventValue {
    /// Convert a JSON value; objects, arrays and nulls have no primitive form
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(EventValue::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(EventValue::Number),
            serde_json::Value::String(s) => Some(EventValue::Text(s.clone())),
            _ => None,
        }
    }
}

impl From<bool> for EventValue {
    fn from(value: bool) -> Self {
        EventValue::Bool(value)
    }
}

impl From<f64> for EventValue {
    fn from(value: f64) -> Self {
        EventValue::Number(value)
    }
}

impl From<i64> for EventValue {
    fn from(value: i64) -> Self {
        EventValue::Number(value as f64)
    }
}

impl From<&str> for EventValue {
    fn from(value: &str) -> Self {
        EventValue::Text(value.to_string())
    }
}

impl From<String> for EventValue {
    fn from(value: String) -> Self {
        EventValue::Text(value)
    }
}

/// Event metadata: typed core fields plus bounded primitive extras
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    /// Marks the event as a conversion
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub conversion: bool,
    /// Monetary value attached to a conversion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Identifier of the form involved in form events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_id: Option<String>,
    /// Page the event refers to, when it differs from the current route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Caller-supplied extras
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, EventValue>,
}

impl EventData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload of a conversion event
    pub fn conversion(value: Option<f64>, currency: Option<String>) -> Self {
        Self {
            conversion: true,
            value,
            currency,
            ..Self::default()
        }
    }

    pub fn with_form_id(mut self, form_id: impl Into<String>) -> Self {
        self.form_id = Some(form_id.into());
        self
    }

    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Add an extension value, subject to the default extension cap
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<EventValue>) -> Self {
        self.insert_extra(key.into(), value.into(), DEFAULT_MAX_EXTENSION_FIELDS);
        self
    }

    /// Insert an extension value unless `max_fields` distinct keys already exist.
    ///
    /// Returns whether the value was stored.
    pub fn insert_extra(&mut self, key: String, value: EventValue, max_fields: usize) -> bool {
        if !self.extra.contains_key(&key) && self.extra.len() >= max_fields {
            debug!(key = %key, max_fields, "extension field dropped, payload full");
            return false;
        }
        self.extra.insert(key, value);
        true
    }

    /// Drop extension fields beyond `max_fields` (keeps the lexicographically first keys)
    pub fn truncate_extra(&mut self, max_fields: usize) {
        while self.extra.len() > max_fields {
            let Some(last) = self.extra.keys().next_back().cloned() else {
                break;
            };
            self.extra.remove(&last);
        }
    }

    /// Build event data from a loose JSON object.
    ///
    /// Known keys fill the typed fields (`conversion`, `value`, `currency`,
    /// `formId`/`form_id`, `page`, `duration`/`durationMs`); other primitive
    /// values become extras. Nested objects, arrays and nulls are dropped.
    pub fn from_json_map(
        map: &serde_json::Map<String, serde_json::Value>,
        max_fields: usize,
    ) -> Self {
        let mut data = EventData::default();
        for (key, value) in map {
            match (key.as_str(), value) {
                ("conversion", serde_json::Value::Bool(b)) => data.conversion = *b,
                ("value", serde_json::Value::Number(n)) => data.value = n.as_f64(),
                ("currency", serde_json::Value::String(s)) => data.currency = Some(s.clone()),
                ("formId" | "form_id", serde_json::Value::String(s)) => {
                    data.form_id = Some(s.clone())
                }
                ("page", serde_json::Value::String(s)) => data.page = Some(s.clone()),
                ("duration" | "durationMs" | "duration_ms", serde_json::Value::Number(n)) => {
                    data.duration_ms = n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
                }
                _ => match EventValue::from_json(value) {
                    Some(v) => {
                        data.insert_extra(key.clone(), v, max_fields);
                    }
                    None => debug!(key = %key, "non-primitive event field dropped"),
                },
            }
        }
        data
    }

    /// Parse event data from a JSON object string
    pub fn from_json_str(json: &str, max_fields: usize) -> Result<Self, crate::IntelError> {
        match serde_json::from_str::<serde_json::Value>(json)? {
            serde_json::Value::Object(map) => Ok(Self::from_json_map(&map, max_fields)),
            serde_json::Value::Null => Ok(Self::default()),
            other => Err(crate::IntelError::InvalidInput(format!(
                "event data must be a JSON object, got {}",
                other
            ))),
        }
    }
}
