//! Events delivered to consumers and the session lifecycle states.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::StreamError;

/// Terminal summary carried by [`Event::Done`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    /// Every field of the `done` record except `type`, passed through verbatim
    /// (e.g. `round_id`, `total_rounds`)
    pub fields: Map<String, Value>,

    /// `false` when the transport ended without the server ever sending a
    /// `done` record
    pub acknowledged: bool,
}

impl Summary {
    /// Summary built from a server `done` record.
    pub fn acknowledged(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            acknowledged: true,
        }
    }

    /// Empty summary for a stream that closed silently.
    pub fn implicit() -> Self {
        Self {
            fields: Map::new(),
            acknowledged: false,
        }
    }

    /// Look up a summary field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Unit of output from a stream session.
///
/// A session emits any number of `Chunk`s followed by at most one `Done` or
/// `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Incremental answer text
    Chunk { content: String },

    /// The stream finished
    Done { summary: Summary },

    /// The stream failed (transport, decoding, protocol, or server error)
    Error { error: StreamError },
}

impl Event {
    /// Whether no further events can follow this one.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Event::Chunk { .. })
    }
}

/// Lifecycle of a stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    /// Terminal states absorb every further input.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Requesting => "requesting",
            SessionState::Streaming => "streaming",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
            SessionState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
