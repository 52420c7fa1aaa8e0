//! The stream session state machine.
//!
//! A [`StreamSession`] owns the decode buffer of one streamed response and
//! turns byte deliveries into events:
//!
//! ```text
//! Idle -> Requesting -> Streaming -> Completed | Failed | Cancelled
//! ```
//!
//! Terminal states absorb every further input, so a late delivery after
//! cancellation or completion is a no-op. The handler sees at most one
//! terminal event (`Done` or `Error`) and never a `Chunk` after it.

use std::sync::atomic::{AtomicU64, Ordering};

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::client::StreamError;
use crate::decode::{check_charset, ByteAccumulator};
use crate::dispatch::{dispatch, Dispatch};
use crate::handler::EventHandler;
use crate::model::{Event, SessionState, Summary};
use crate::options::StreamOptions;
use crate::record::parse_record;
use crate::sse::drain_frames;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// One streaming exchange.
#[derive(Debug)]
pub struct StreamSession<H> {
    id: u64,
    state: SessionState,
    accumulator: ByteAccumulator,
    handler: H,
    options: StreamOptions,
    events_emitted: usize,
}

impl<H: EventHandler> StreamSession<H> {
    /// Create an idle session with default options.
    pub fn new(handler: H) -> Self {
        Self::with_options(handler, StreamOptions::default())
    }

    pub fn with_options(handler: H, options: StreamOptions) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            state: SessionState::Idle,
            accumulator: ByteAccumulator::new(),
            handler,
            options,
            events_emitted: 0,
        }
    }

    /// Process-unique id, used in log output.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of events delivered to the handler so far.
    pub fn events_emitted(&self) -> usize {
        self.events_emitted
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Text buffered for a frame that has not been terminated yet.
    pub fn buffered(&self) -> &str {
        self.accumulator.text()
    }

    /// The request is being handed to the transport.
    pub fn start(&mut self) {
        if self.state == SessionState::Idle {
            tracing::info!(session = self.id, "stream session started");
            self.state = SessionState::Requesting;
        }
    }

    /// The transport has a successful response and is about to deliver its
    /// body. `charset` is the charset declared by the response, if any.
    pub fn response_ready(&mut self, charset: Option<&str>) {
        if self.state.is_terminal() {
            return;
        }
        if let Err(e) = check_charset(charset) {
            self.fail(e);
            return;
        }
        self.state = SessionState::Streaming;
        tracing::debug!(session = self.id, "response ready");
    }

    /// Feed one chunk of the response body.
    ///
    /// Complete frames are parsed and dispatched immediately, in order; a
    /// trailing partial frame stays buffered for the next delivery.
    pub fn deliver(&mut self, bytes: &[u8]) {
        if self.state.is_terminal() {
            tracing::trace!(session = self.id, state = %self.state, "delivery ignored");
            return;
        }
        self.state = SessionState::Streaming;

        // Frames completed before an invalid byte are still dispatched.
        let decode_error = self.accumulator.append(bytes).err();

        for frame in drain_frames(self.accumulator.text_mut()) {
            let record = match parse_record(&frame) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    self.fail(e);
                    return;
                }
            };

            tracing::debug!(session = self.id, kind = record.kind().unwrap_or_default(), "record");
            if let Dispatch::Emit(event) = dispatch(record) {
                self.emit(event);
                if self.state.is_terminal() {
                    // Anything after the terminal record is dropped.
                    return;
                }
            }
        }

        if let Some(e) = decode_error {
            self.fail(e);
            return;
        }

        if let Some(limit) = self.options.max_buffer_len {
            let buffered = self.accumulator.text().len();
            if buffered > limit {
                self.fail(StreamError::Protocol(format!(
                    "unterminated frame exceeds {} bytes ({} buffered)",
                    limit, buffered
                )));
            }
        }
    }

    /// The transport reached end-of-stream.
    ///
    /// Without a prior terminal record this is an implicit completion: a
    /// `Done` with an empty, unacknowledged summary. A partial frame still in
    /// the buffer is discarded.
    pub fn finish(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if !self.accumulator.text().trim().is_empty() || self.accumulator.pending_bytes() > 0 {
            tracing::warn!(
                session = self.id,
                buffered = self.accumulator.text().len(),
                "stream ended inside a frame; discarding partial frame"
            );
        }
        tracing::info!(session = self.id, "stream closed without a done record");
        self.emit(Event::Done {
            summary: Summary::implicit(),
        });
    }

    /// The transport failed. Reported once; ignored when already terminal.
    pub fn fail(&mut self, error: StreamError) {
        if self.state.is_terminal() {
            return;
        }
        self.emit(Event::Error { error });
    }

    /// Stop the session without any further callback.
    pub fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        tracing::info!(
            session = self.id,
            events = self.events_emitted,
            "stream session cancelled"
        );
        self.state = SessionState::Cancelled;
        self.accumulator.clear();
    }

    /// Read `body` until the session is terminal or `cancel` fires.
    ///
    /// The body is dropped before returning, which releases the underlying
    /// connection.
    pub async fn drive<S, B, E>(&mut self, body: S, cancel: &CancellationToken) -> SessionState
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<StreamError>,
    {
        futures::pin_mut!(body);

        while !self.state.is_terminal() {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.cancel();
                    break;
                }
                next = body.next() => next,
            };

            match next {
                Some(Ok(bytes)) => self.deliver(bytes.as_ref()),
                Some(Err(e)) => self.fail(e.into()),
                None => self.finish(),
            }
        }

        self.state
    }

    fn emit(&mut self, event: Event) {
        match &event {
            Event::Chunk { .. } => {}
            Event::Done { .. } => {
                self.state = SessionState::Completed;
                self.accumulator.clear();
                tracing::info!(
                    session = self.id,
                    events = self.events_emitted + 1,
                    "stream session completed"
                );
            }
            Event::Error { error } => {
                self.state = SessionState::Failed;
                self.accumulator.clear();
                tracing::warn!(
                    session = self.id,
                    kind = ?error.kind(),
                    error = %error,
                    "stream session failed"
                );
            }
        }
        self.events_emitted += 1;
        self.handler.handle(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::EventQueue;
    use serde_json::json;

    fn session() -> StreamSession<EventQueue> {
        let mut session = StreamSession::new(EventQueue::new());
        session.start();
        session
    }

    fn chunk(content: &str) -> Event {
        Event::Chunk {
            content: content.to_string(),
        }
    }

    #[test]
    fn test_state_transitions() {
        let mut session = StreamSession::new(EventQueue::new());
        assert_eq!(session.state(), SessionState::Idle);
        session.start();
        assert_eq!(session.state(), SessionState::Requesting);
        session.response_ready(None);
        assert_eq!(session.state(), SessionState::Streaming);
        session.deliver(b"data: {\"type\":\"done\"}\n\n");
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn test_first_delivery_starts_streaming() {
        let mut session = session();
        session.deliver(b": hello\n");
        assert_eq!(session.state(), SessionState::Streaming);
        assert_eq!(session.events_emitted(), 0);
    }

    #[test]
    fn test_split_record_across_deliveries() {
        let mut session = session();
        session.deliver(b"data: {\"typ");
        session.deliver(b"e\":\"chunk\",\"content\":\"hel");
        assert!(session.handler().is_empty());
        session.deliver(b"lo\"}\n\n");

        assert_eq!(session.handler_mut().drain(), vec![chunk("hello")]);
        assert_eq!(session.state(), SessionState::Streaming);
    }

    #[test]
    fn test_burst_then_done_ignores_later_bytes() {
        let mut session = session();
        session.deliver(
            b"data: {\"type\":\"chunk\",\"content\":\"a\"}\n\ndata: {\"type\":\"done\",\"score\":9}\n\n",
        );
        session.deliver(b"data: {\"type\":\"chunk\",\"content\":\"late\"}\n\n");
        session.finish();

        let events = session.handler_mut().drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], chunk("a"));
        match &events[1] {
            Event::Done { summary } => {
                assert!(summary.acknowledged);
                assert_eq!(summary.get("score"), Some(&json!(9)));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn test_records_after_done_in_same_burst_are_dropped() {
        let mut session = session();
        session.deliver(
            b"data: {\"type\":\"done\"}\n\ndata: {\"type\":\"chunk\",\"content\":\"x\"}\n\n",
        );
        assert_eq!(session.events_emitted(), 1);
        assert!(session.buffered().is_empty());
    }

    #[test]
    fn test_error_record_is_terminal() {
        let mut session = session();
        session.deliver(b"data: {\"type\":\"error\",\"message\":\"bad request\"}\n\n");
        session.deliver(b"data: {\"type\":\"chunk\",\"content\":\"x\"}\n\n");
        session.fail(StreamError::transport("reset"));

        assert_eq!(
            session.handler_mut().drain(),
            vec![Event::Error {
                error: StreamError::Application("bad request".to_string())
            }]
        );
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_invalid_json_is_protocol_violation() {
        let mut session = session();
        session.deliver(b"data: not-json\n\n");

        let events = session.handler_mut().drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            Event::Error {
                error: StreamError::Protocol(_)
            }
        ));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_partial_frame_waits_for_delimiter() {
        let mut session = session();
        session.deliver(b"data: {\"type\":\"chunk\",\"content\":\"x\"}\n");
        assert!(session.handler().is_empty());
        session.deliver(b"\n");
        assert_eq!(session.handler_mut().drain(), vec![chunk("x")]);
    }

    #[test]
    fn test_keep_alive_and_start_frames_are_ignored() {
        let mut session = session();
        session.deliver(b": keep-alive\n\n");
        session.deliver(b"data: {\"type\":\"start\",\"message\":\"thinking\"}\n\n");
        session.deliver(b"data: {\"type\":\"chunk\",\"content\":\"ok\"}\n\n");
        assert_eq!(session.handler_mut().drain(), vec![chunk("ok")]);
    }

    #[test]
    fn test_finish_without_done_is_implicit_completion() {
        let mut session = session();
        session.deliver(b"data: {\"type\":\"chunk\",\"content\":\"a\"}\n\ndata: {\"type\"");
        session.finish();

        let events = session.handler_mut().drain();
        assert_eq!(
            events,
            vec![
                chunk("a"),
                Event::Done {
                    summary: Summary::implicit()
                }
            ]
        );
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn test_cancel_discards_partial_frame_silently() {
        let mut session = session();
        session.deliver(b"data: {\"type\":\"chunk\",\"content\":\"a\"}\n\ndata: {");
        session.cancel();
        session.deliver(b"}\n\n");
        session.finish();
        session.fail(StreamError::transport("late"));

        assert_eq!(session.handler_mut().drain(), vec![chunk("a")]);
        assert_eq!(session.events_emitted(), 1);
        assert_eq!(session.state(), SessionState::Cancelled);
        assert!(session.buffered().is_empty());
    }

    #[test]
    fn test_transport_failure_before_streaming() {
        let mut session = session();
        session.fail(StreamError::Transport {
            status: Some(503),
            message: "HTTP error! status: 503".to_string(),
        });
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.events_emitted(), 1);
    }

    #[test]
    fn test_unsupported_charset_fails() {
        let mut session = session();
        session.response_ready(Some("iso-8859-1"));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(matches!(
            session.handler_mut().pop(),
            Some(Event::Error {
                error: StreamError::Decode(_)
            })
        ));
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        let mut session = session();
        session.deliver(&[b'd', b'a', 0xc3, 0x28]);
        assert!(matches!(
            session.handler_mut().pop(),
            Some(Event::Error {
                error: StreamError::Decode(_)
            })
        ));
    }

    #[test]
    fn test_frames_before_invalid_byte_are_dispatched() {
        let mut session = session();
        let mut bytes = b"data: {\"type\":\"chunk\",\"content\":\"a\"}\n\n".to_vec();
        bytes.push(0xff);
        session.deliver(&bytes);

        assert_eq!(session.state(), SessionState::Failed);
        let events = session.handler_mut().drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], chunk("a"));
        assert!(matches!(
            &events[1],
            Event::Error {
                error: StreamError::Decode(msg)
            } if msg.contains("offset 38")
        ));
    }

    #[test]
    fn test_buffer_ceiling() {
        let options = StreamOptions::default().with_max_buffer_len(16);
        let mut session = StreamSession::with_options(EventQueue::new(), options);
        session.start();
        session.deliver(b"data: {\"type\":\"chunk\",");
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_drive_to_completion() {
        let body = futures::stream::iter(vec![
            Ok::<_, StreamError>(b"data: {\"type\":\"chunk\",\"content\":\"a\"}\n".to_vec()),
            Ok(b"\ndata: {\"type\":\"done\",\"round_id\":1}\n\n".to_vec()),
        ]);
        let mut session = session();
        let state = session.drive(body, &CancellationToken::new()).await;

        assert_eq!(state, SessionState::Completed);
        assert_eq!(session.events_emitted(), 2);
    }

    #[tokio::test]
    async fn test_drive_transport_error() {
        let body = futures::stream::iter(vec![
            Ok(b"data: {\"type\":\"chunk\",\"content\":\"a\"}\n\n".to_vec()),
            Err(StreamError::transport("connection reset")),
        ]);
        let mut session = session();
        let state = session.drive(body, &CancellationToken::new()).await;

        assert_eq!(state, SessionState::Failed);
        let events = session.handler_mut().drain();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            Event::Error {
                error: StreamError::transport("connection reset")
            }
        );
    }

    #[tokio::test]
    async fn test_drive_cancelled_before_read() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let body = futures::stream::iter(vec![Ok::<_, StreamError>(
            b"data: {\"type\":\"chunk\",\"content\":\"a\"}\n\n".to_vec(),
        )]);
        let mut session = session();
        let state = session.drive(body, &cancel).await;

        assert_eq!(state, SessionState::Cancelled);
        assert_eq!(session.events_emitted(), 0);
    }

    #[tokio::test]
    async fn test_drive_cancelled_between_reads() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<Result<Vec<u8>, StreamError>>();
        for content in ["one", "two", "three"] {
            let frame = format!("data: {}\n\n", json!({"type": "chunk", "content": content}));
            tx.unbounded_send(Ok(frame.into_bytes())).unwrap();
        }

        let cancel = CancellationToken::new();
        let mut session = session();
        let (state, ()) = tokio::join!(session.drive(rx, &cancel), async {
            // The three frames are consumed long before this fires.
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            cancel.cancel();
        });

        assert_eq!(state, SessionState::Cancelled);
        assert_eq!(session.events_emitted(), 3);
        assert!(tx.is_closed());
        assert!(tx
            .unbounded_send(Ok(b"data: {\"type\":\"done\"}\n\n".to_vec()))
            .is_err());
        assert_eq!(
            session.handler_mut().drain(),
            vec![chunk("one"), chunk("two"), chunk("three")]
        );
    }
}
