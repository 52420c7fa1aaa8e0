//! Streaming client, request trait and error types.

use std::borrow::Cow;

use futures::Stream;
use serde::Serialize;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::handler::{EventHandler, EventQueue};
use crate::http::{build_http_client, declared_charset, post_stream};
use crate::model::Event;
use crate::options::{ClientConfig, HttpTransport, StreamOptions, TransportOptions};
use crate::session::StreamSession;
use crate::stream::into_events;

/// Errors that can end a stream session.
///
/// Everything except `Config` reaches consumers through [`Event::Error`];
/// `Config` is returned directly when a client cannot be built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    #[error("Transport error: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Server error: {0}")]
    Application(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`StreamError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Decode,
    Protocol,
    Application,
    Config,
}

impl StreamError {
    /// Transport failure without an HTTP status (reset, read error, ...).
    pub fn transport(message: impl Into<String>) -> Self {
        StreamError::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StreamError::Transport { .. } => ErrorKind::Transport,
            StreamError::Decode(_) => ErrorKind::Decode,
            StreamError::Protocol(_) => ErrorKind::Protocol,
            StreamError::Application(_) => ErrorKind::Application,
            StreamError::Config(_) => ErrorKind::Config,
        }
    }

    /// The bare message, without the kind prefix used by `Display`.
    ///
    /// For server errors this is exactly the `message` the server sent.
    pub fn message(&self) -> &str {
        match self {
            StreamError::Transport { message, .. } => message,
            StreamError::Decode(message)
            | StreamError::Protocol(message)
            | StreamError::Application(message)
            | StreamError::Config(message) => message,
        }
    }

    /// HTTP status of a rejected request, if that is what failed.
    pub fn status(&self) -> Option<u16> {
        match self {
            StreamError::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return StreamError::Decode(e.to_string());
        }
        if e.is_builder() {
            return StreamError::Config(e.to_string());
        }
        StreamError::Transport {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

/// An upstream request that opens an event stream.
///
/// The body is serialized as JSON and POSTed to `path()` below the client's
/// base URL. The session never looks at the body.
pub trait StreamRequest: Serialize + Send + Sync {
    /// Endpoint path relative to the base URL, e.g. `/tutoring/ask-stream`.
    fn path(&self) -> Cow<'_, str>;
}

/// Client that opens streamed requests and drives sessions over them.
///
/// # Example
/// ```no_run
/// use qastream::client::StreamClient;
/// use qastream::model::Event;
/// use qastream::options::{HttpTransport, StreamOptions, TransportOptions};
/// use qastream::requests::SmartQaQuestion;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> Result<(), qastream::StreamError> {
/// let transport = TransportOptions::new(
///     HttpTransport::default().with_base_url("http://localhost:5000/api/cet4".to_string()),
/// );
/// let client = StreamClient::new(transport, StreamOptions::default())?;
///
/// let question = SmartQaQuestion::new(42, "How did I do on listening?");
/// let session = client
///     .run(&question, |event: Event| println!("{:?}", event), CancellationToken::new())
///     .await;
/// println!("finished: {}", session.state());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StreamClient {
    http: reqwest::Client,
    transport_options: TransportOptions<HttpTransport>,
    stream_options: StreamOptions,
}

impl StreamClient {
    /// Create a client with explicit options.
    pub fn new(
        transport_options: TransportOptions<HttpTransport>,
        stream_options: StreamOptions,
    ) -> Result<Self, StreamError> {
        let http = build_http_client(&transport_options)?;
        Ok(Self {
            http,
            transport_options,
            stream_options,
        })
    }

    /// Create a client configured from `QASTREAM_*` environment variables.
    pub fn from_env() -> Result<Self, StreamError> {
        let config = ClientConfig::from_env()?;
        Self::new(config.transport, config.stream)
    }

    pub fn transport_options(&self) -> &TransportOptions<HttpTransport> {
        &self.transport_options
    }

    pub fn stream_options(&self) -> &StreamOptions {
        &self.stream_options
    }

    /// Absolute URL for an endpoint path.
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.transport_options.provider.base_url();
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Send `request` and return the validated streaming response.
    async fn open<R: StreamRequest>(&self, request: &R) -> Result<reqwest::Response, StreamError> {
        let url = self.endpoint(&request.path());
        post_stream(
            &self.http,
            &url,
            request,
            &self.transport_options.provider.extra_headers,
        )
        .await
    }

    /// Run one stream session to a terminal state, delivering events to
    /// `handler`.
    ///
    /// Returns the finished session so callers can inspect its final state
    /// or take back the handler. Cancelling `cancel` stops the session at the
    /// next read without any further callback.
    pub async fn run<R, H>(
        &self,
        request: &R,
        handler: H,
        cancel: CancellationToken,
    ) -> StreamSession<H>
    where
        R: StreamRequest,
        H: EventHandler,
    {
        let mut session = StreamSession::with_options(handler, self.stream_options.clone());
        session.start();

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                session.cancel();
                return session;
            }
            opened = self.open(request) => opened,
        };

        let response = match opened {
            Ok(response) => response,
            Err(e) => {
                session.fail(e);
                return session;
            }
        };

        let charset = declared_charset(response.headers());
        session.response_ready(charset.as_deref());
        session.drive(response.bytes_stream(), &cancel).await;
        session
    }

    /// Run a session on its own task.
    ///
    /// The returned handle cancels or awaits the session.
    pub fn spawn<R, H>(&self, request: R, handler: H) -> StreamHandle<H>
    where
        R: StreamRequest + 'static,
        H: EventHandler + 'static,
    {
        let cancel = CancellationToken::new();
        let client = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { client.run(&request, handler, token).await });
        StreamHandle { cancel, task }
    }

    /// Open `request` and return its events as a stream.
    ///
    /// The stream ends after the terminal event. Dropping it abandons the
    /// underlying response body. A request that cannot be opened yields a
    /// single `Error` event.
    pub async fn events<R: StreamRequest>(&self, request: &R) -> impl Stream<Item = Event> + Send {
        let mut session = StreamSession::with_options(EventQueue::new(), self.stream_options.clone());
        session.start();

        let body = match self.open(request).await {
            Ok(response) => {
                let charset = declared_charset(response.headers());
                session.response_ready(charset.as_deref());
                Some(response.bytes_stream())
            }
            Err(e) => {
                session.fail(e);
                None
            }
        };
        into_events(body, session)
    }
}

/// Handle to a session running on its own task.
#[derive(Debug)]
pub struct StreamHandle<H> {
    cancel: CancellationToken,
    task: JoinHandle<StreamSession<H>>,
}

impl<H> StreamHandle<H> {
    /// Request cancellation; takes effect at the session's next read.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this session, for wiring into other tasks.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to reach a terminal state.
    pub async fn join(self) -> Result<StreamSession<H>, JoinError> {
        self.task.await
    }
}
