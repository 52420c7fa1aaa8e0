//! Structured payloads decoded from SSE frames.

use serde_json::{Map, Value};

use crate::client::StreamError;
use crate::sse::frame_payload;

/// The JSON object carried by one frame.
///
/// Only a handful of fields are interpreted (`type`, `content`, `message`);
/// everything else is kept verbatim so `done` summaries can pass through.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Wrap an already parsed JSON object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// The discriminator (`type` field), if present and a string.
    pub fn kind(&self) -> Option<&str> {
        self.fields.get("type").and_then(Value::as_str)
    }

    /// The `content` field of a chunk record.
    pub fn content(&self) -> Option<&str> {
        self.fields.get("content").and_then(Value::as_str)
    }

    /// The `message` field of an error (or start) record.
    pub fn message(&self) -> Option<&str> {
        self.fields.get("message").and_then(Value::as_str)
    }

    /// Look up an arbitrary field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Borrow every field.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consume the record, returning every field except the discriminator.
    pub fn into_summary_fields(mut self) -> Map<String, Value> {
        self.fields.remove("type");
        self.fields
    }
}

/// Parse one frame into a record.
///
/// Returns `Ok(None)` for frames without a `data:` line; those are comments
/// or keep-alives. A payload that is not a JSON object is a protocol
/// violation.
///
/// # Example
/// ```
/// use qastream::record::parse_record;
///
/// let record = parse_record("data: {\"type\":\"chunk\",\"content\":\"hi\"}")
///     .unwrap()
///     .unwrap();
/// assert_eq!(record.kind(), Some("chunk"));
/// assert_eq!(record.content(), Some("hi"));
///
/// assert!(parse_record(": keep-alive").unwrap().is_none());
/// assert!(parse_record("data: not-json").is_err());
/// ```
pub fn parse_record(frame: &str) -> Result<Option<Record>, StreamError> {
    let Some(payload) = frame_payload(frame) else {
        return Ok(None);
    };

    let value: Value = serde_json::from_str(&payload).map_err(|e| {
        StreamError::Protocol(format!(
            "invalid JSON payload ({}): {}",
            e,
            preview(&payload)
        ))
    })?;

    match value {
        Value::Object(fields) => Ok(Some(Record::new(fields))),
        other => Err(StreamError::Protocol(format!(
            "payload is not a JSON object: {}",
            preview(&other.to_string())
        ))),
    }
}

/// Shorten a payload for inclusion in an error message.
fn preview(payload: &str) -> String {
    const MAX_CHARS: usize = 80;
    if payload.chars().count() <= MAX_CHARS {
        payload.to_string()
    } else {
        let head: String = payload.chars().take(MAX_CHARS).collect();
        format!("{}...", head)
    }
}
