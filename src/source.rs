//! Interaction sources
//!
//! The platform side of the engine: something that yields user interactions
//! in order. `NdjsonSource` reads newline-delimited JSON, one interaction per
//! line:
//!
//! ```text
//! {"kind":"navigate","url":"https://example.com/?utm_source=google","referrer":"https://google.com"}
//! {"kind":"action","action":"search_properties","page":"/listings","data":{"filter":"3bd"}}
//! {"kind":"event","eventType":"form_submit","data":{"formId":"contact-form"}}
//! {"kind":"identify","userId":"lead-42"}
//! {"kind":"conversion","value":250000,"currency":"USD"}
//! ```

use serde::Deserialize;
use std::io::BufRead;
use tracing::{debug, warn};

use crate::attribution::{EventKind, NavigationContext};
use crate::config::DEFAULT_MAX_EXTENSION_FIELDS;
use crate::types::EventData;

/// One normalized user interaction
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    /// A named user action on a page, fed to both engines
    Action {
        action: String,
        page: String,
        data: Option<EventData>,
    },
    /// A raw attribution event
    Event { kind: EventKind, data: EventData },
    Conversion {
        value: Option<f64>,
        currency: Option<String>,
    },
    Identify { user_id: String },
    /// The platform navigated; replaces the navigation context
    Navigate(NavigationContext),
}

/// Yields interactions in the order they happened
pub trait InteractionSource {
    /// Next interaction, or `None` once the source is exhausted
    fn next_interaction(&mut self) -> Option<Interaction>;
}

/// Adapts any iterator of interactions
pub struct IterSource<I> {
    inner: I,
}

impl<I: Iterator<Item = Interaction>> IterSource<I> {
    pub fn new(inner: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            inner: inner.into_iter(),
        }
    }
}

impl<I: Iterator<Item = Interaction>> InteractionSource for IterSource<I> {
    fn next_interaction(&mut self) -> Option<Interaction> {
        self.inner.next()
    }
}

/// Wire format of one NDJSON line
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum WireInteraction {
    Action {
        action: String,
        #[serde(default)]
        page: String,
        data: Option<serde_json::Value>,
    },
    Event {
        #[serde(rename = "eventType", alias = "event_type", alias = "type")]
        event_type: String,
        data: Option<serde_json::Value>,
    },
    Conversion {
        value: Option<f64>,
        currency: Option<String>,
    },
    Identify {
        #[serde(rename = "userId", alias = "user_id")]
        user_id: String,
    },
    Navigate(NavigationContext),
}

/// Convert a loose JSON payload; anything but an object carries no data
fn event_data(value: Option<serde_json::Value>, max_fields: usize) -> Option<EventData> {
    match value? {
        serde_json::Value::Object(map) => Some(EventData::from_json_map(&map, max_fields)),
        serde_json::Value::Null => None,
        other => {
            debug!(payload = %other, "non-object event data dropped");
            None
        }
    }
}

impl WireInteraction {
    fn normalize(self, max_fields: usize) -> Interaction {
        match self {
            WireInteraction::Action { action, page, data } => Interaction::Action {
                action,
                page,
                data: event_data(data, max_fields),
            },
            WireInteraction::Event { event_type, data } => Interaction::Event {
                kind: EventKind::parse(&event_type),
                data: event_data(data, max_fields).unwrap_or_default(),
            },
            WireInteraction::Conversion { value, currency } => {
                Interaction::Conversion { value, currency }
            }
            WireInteraction::Identify { user_id } => Interaction::Identify { user_id },
            WireInteraction::Navigate(context) => Interaction::Navigate(context),
        }
    }
}

/// Parse a single NDJSON line
pub fn parse_line(line: &str, max_fields: usize) -> Result<Interaction, crate::IntelError> {
    let wire: WireInteraction = serde_json::from_str(line)?;
    Ok(wire.normalize(max_fields))
}

/// Reads interactions from newline-delimited JSON.
///
/// Blank lines are ignored. Malformed lines are logged and skipped; a read
/// error ends the stream.
pub struct NdjsonSource<R> {
    reader: R,
    max_fields: usize,
    line_no: usize,
    skipped: usize,
}

impl<R: BufRead> NdjsonSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            max_fields: DEFAULT_MAX_EXTENSION_FIELDS,
            line_no: 0,
            skipped: 0,
        }
    }

    pub fn with_max_extension_fields(mut self, max_fields: usize) -> Self {
        self.max_fields = max_fields;
        self
    }

    /// Number of malformed lines skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<R: BufRead> InteractionSource for NdjsonSource<R> {
    fn next_interaction(&mut self) -> Option<Interaction> {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    warn!(line = self.line_no + 1, error = %e, "failed to read interaction stream");
                    return None;
                }
            }
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match parse_line(trimmed, self.max_fields) {
                Ok(interaction) => return Some(interaction),
                Err(e) => {
                    self.skipped += 1;
                    warn!(line = self.line_no, error = %e, "skipping malformed interaction");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventValue;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn drain<S: InteractionSource>(source: &mut S) -> Vec<Interaction> {
        let mut out = Vec::new();
        while let Some(i) = source.next_interaction() {
            out.push(i);
        }
        out
    }

    #[test]
    fn test_ndjson_all_kinds() {
        let input = r#"
{"kind":"navigate","url":"/?utm_source=google","referrer":"https://x.com","viewportWidth":500}
{"kind":"action","action":"search_properties","page":"/listings","data":{"filter":"3bd","nested":{"a":1}}}
{"kind":"event","eventType":"form_submit","data":{"formId":"contact-form"}}
{"kind":"identify","userId":"lead-42"}
{"kind":"conversion","value":250000,"currency":"USD"}
"#;
        let mut source = NdjsonSource::new(Cursor::new(input));
        let items = drain(&mut source);
        assert_eq!(items.len(), 5);

        match &items[0] {
            Interaction::Navigate(ctx) => {
                assert_eq!(ctx.url, "/?utm_source=google");
                assert_eq!(ctx.viewport_width, Some(500));
            }
            other => panic!("unexpected {:?}", other),
        }
        match &items[1] {
            Interaction::Action { action, page, data } => {
                assert_eq!(action, "search_properties");
                assert_eq!(page, "/listings");
                let data = data.as_ref().unwrap();
                assert_eq!(data.extra.get("filter"), Some(&EventValue::Text("3bd".into())));
                assert!(!data.extra.contains_key("nested"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            items[2],
            Interaction::Event {
                kind: EventKind::FormSubmit,
                data: EventData::new().with_form_id("contact-form"),
            }
        );
        assert_eq!(
            items[3],
            Interaction::Identify {
                user_id: "lead-42".to_string()
            }
        );
        assert_eq!(
            items[4],
            Interaction::Conversion {
                value: Some(250000.0),
                currency: Some("USD".to_string())
            }
        );
        assert_eq!(source.skipped(), 0);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let input = "not json\n{\"kind\":\"teleport\"}\n{\"kind\":\"action\",\"action\":\"view\"}\n";
        let mut source = NdjsonSource::new(Cursor::new(input));
        let items = drain(&mut source);

        assert_eq!(
            items,
            vec![Interaction::Action {
                action: "view".to_string(),
                page: String::new(),
                data: None,
            }]
        );
        assert_eq!(source.skipped(), 2);
    }

    #[test]
    fn test_custom_event_type_kept() {
        let interaction = parse_line(r#"{"kind":"event","type":"video_play"}"#, 20).unwrap();
        assert_eq!(
            interaction,
            Interaction::Event {
                kind: EventKind::Custom("video_play".to_string()),
                data: EventData::default(),
            }
        );
    }

    #[test]
    fn test_iter_source() {
        let mut source = IterSource::new(vec![Interaction::Identify {
            user_id: "u".to_string(),
        }]);
        assert!(source.next_interaction().is_some());
        assert!(source.next_interaction().is_none());
    }
}
