//! Classification of records into events.

use crate::client::StreamError;
use crate::model::{Event, Summary};
use crate::record::Record;

/// Message used when the server sends an `error` record without `message`.
pub const MISSING_ERROR_MESSAGE: &str = "server reported an error without a message";

/// What the session should do with one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Deliver the event to the handler.
    Emit(Event),

    /// Nothing to deliver (e.g. the `start` acknowledgement).
    Skip,
}

/// Map a record to the event it represents.
///
/// `chunk` records are non-terminal; `done` and `error` records are terminal.
/// Unknown or missing discriminators become protocol violations, delivered as
/// an [`Event::Error`].
pub fn dispatch(record: Record) -> Dispatch {
    match record.kind() {
        Some("chunk") => match record.content() {
            Some(content) => Dispatch::Emit(Event::Chunk {
                content: content.to_string(),
            }),
            None => protocol_violation("chunk record without a string `content` field"),
        },
        Some("done") => Dispatch::Emit(Event::Done {
            summary: Summary::acknowledged(record.into_summary_fields()),
        }),
        Some("error") => {
            let message = record.message().unwrap_or(MISSING_ERROR_MESSAGE).to_string();
            Dispatch::Emit(Event::Error {
                error: StreamError::Application(message),
            })
        }
        Some("start") => {
            tracing::debug!(note = record.message().unwrap_or_default(), "stream acknowledged");
            Dispatch::Skip
        }
        Some(other) => protocol_violation(&format!("unrecognized record type `{}`", other)),
        None => match record.get("type") {
            Some(value) => protocol_violation(&format!("record type is not a string: {}", value)),
            None => protocol_violation("record has no `type` field"),
        },
    }
}

fn protocol_violation(message: &str) -> Dispatch {
    Dispatch::Emit(Event::Error {
        error: StreamError::Protocol(message.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse_record;
    use serde_json::json;

    fn dispatch_frame(frame: &str) -> Dispatch {
        dispatch(parse_record(frame).unwrap().unwrap())
    }

    #[test]
    fn test_dispatch_chunk() {
        assert_eq!(
            dispatch_frame(r#"data: {"type":"chunk","content":"hello"}"#),
            Dispatch::Emit(Event::Chunk {
                content: "hello".to_string()
            })
        );
    }

    #[test]
    fn test_dispatch_chunk_without_content() {
        match dispatch_frame(r#"data: {"type":"chunk"}"#) {
            Dispatch::Emit(Event::Error {
                error: StreamError::Protocol(msg),
            }) => assert!(msg.contains("content")),
            other => panic!("unexpected dispatch: {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_done_passes_summary_through() {
        match dispatch_frame(r#"data: {"type":"done","round_id":3,"total_rounds":4}"#) {
            Dispatch::Emit(Event::Done { summary }) => {
                assert!(summary.acknowledged);
                assert_eq!(summary.get("round_id"), Some(&json!(3)));
                assert_eq!(summary.get("total_rounds"), Some(&json!(4)));
                assert_eq!(summary.get("type"), None);
            }
            other => panic!("unexpected dispatch: {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_error() {
        assert_eq!(
            dispatch_frame(r#"data: {"type":"error","message":"bad request"}"#),
            Dispatch::Emit(Event::Error {
                error: StreamError::Application("bad request".to_string())
            })
        );
        assert_eq!(
            dispatch_frame(r#"data: {"type":"error"}"#),
            Dispatch::Emit(Event::Error {
                error: StreamError::Application(MISSING_ERROR_MESSAGE.to_string())
            })
        );
    }

    #[test]
    fn test_dispatch_start_is_skipped() {
        assert_eq!(
            dispatch_frame(r#"data: {"type":"start","message":"thinking..."}"#),
            Dispatch::Skip
        );
    }

    #[test]
    fn test_dispatch_unknown_or_missing_type() {
        for frame in [
            r#"data: {"type":"progress"}"#,
            r#"data: {"content":"x"}"#,
            r#"data: {"type":7}"#,
        ] {
            assert!(
                matches!(
                    dispatch_frame(frame),
                    Dispatch::Emit(Event::Error {
                        error: StreamError::Protocol(_)
                    })
                ),
                "frame: {}",
                frame
            );
        }
    }
}
