//! Transport and stream configuration.

use std::collections::HashMap;
use std::time::Duration;

use crate::client::StreamError;

/// Base URL of the question-answering service when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api/cet4";

/// Default ceiling for text buffered while waiting for a frame delimiter.
pub const DEFAULT_MAX_BUFFER_LEN: usize = 8 * 1024 * 1024;

/// Generic transport options containing truly generic transport fields
/// and transport-specific configuration.
///
/// # Type Parameters
/// - `T`: Transport-specific options type
///
/// # Example
/// ```rust
/// use qastream::options::{TransportOptions, HttpTransport};
/// use std::time::Duration;
///
/// let options = TransportOptions {
///     timeout: Some(Duration::from_secs(10)),
///     provider: HttpTransport {
///         base_url: Some("http://localhost:5000/api/cet4".to_string()),
///         proxy: None,
///         extra_headers: None,
///     },
/// };
/// ```
#[derive(Debug, Clone)]
pub struct TransportOptions<T> {
    /// Connection timeout (streams themselves are unbounded)
    pub timeout: Option<Duration>,

    /// Transport-specific options
    pub provider: T,
}

/// HTTP-specific transport options.
/// Used as the provider field in `TransportOptions<HttpTransport>`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    /// Base URL that endpoint paths are appended to
    pub base_url: Option<String>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl HttpTransport {
    /// Configured base URL, or [`DEFAULT_BASE_URL`].
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Set extra headers.
    pub fn with_extra_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.extra_headers = Some(headers);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }
}

impl<T> TransportOptions<T> {
    /// Create new transport options with transport-specific configuration.
    pub fn new(provider: T) -> Self {
        Self {
            timeout: None,
            provider,
        }
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Limits applied by a stream session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    /// Maximum bytes of undelimited text; exceeding it fails the session.
    /// `None` disables the check.
    pub max_buffer_len: Option<usize>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            max_buffer_len: Some(DEFAULT_MAX_BUFFER_LEN),
        }
    }
}

impl StreamOptions {
    pub fn with_max_buffer_len(mut self, max_buffer_len: usize) -> Self {
        self.max_buffer_len = Some(max_buffer_len);
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.max_buffer_len = None;
        self
    }
}

/// Everything a [`StreamClient`](crate::client::StreamClient) needs,
/// typically loaded from the environment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub transport: TransportOptions<HttpTransport>,
    pub stream: StreamOptions,
}

impl ClientConfig {
    /// Load configuration from `QASTREAM_*` environment variables.
    ///
    /// - `QASTREAM_BASE_URL`: service base URL (default [`DEFAULT_BASE_URL`])
    /// - `QASTREAM_TIMEOUT_SECS`: connection timeout in seconds
    /// - `QASTREAM_PROXY`: HTTP proxy URL
    /// - `QASTREAM_MAX_BUFFER_LEN`: frame buffer ceiling in bytes, `0` for none
    pub fn from_env() -> Result<Self, StreamError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StreamError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut provider = HttpTransport::default();
        if let Some(base_url) = lookup("QASTREAM_BASE_URL") {
            provider = provider.with_base_url(base_url);
        }
        if let Some(proxy) = lookup("QASTREAM_PROXY") {
            provider = provider.with_proxy(proxy);
        }

        let mut transport = TransportOptions::new(provider);
        if let Some(secs) = lookup("QASTREAM_TIMEOUT_SECS") {
            transport = transport.with_timeout(Duration::from_secs(parse_number(
                "QASTREAM_TIMEOUT_SECS",
                &secs,
            )?));
        }

        let mut stream = StreamOptions::default();
        if let Some(len) = lookup("QASTREAM_MAX_BUFFER_LEN") {
            stream = match parse_number("QASTREAM_MAX_BUFFER_LEN", &len)? {
                0 => stream.unbounded(),
                len => stream.with_max_buffer_len(len as usize),
            };
        }

        Ok(Self { transport, stream })
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, StreamError> {
    value
        .trim()
        .parse()
        .map_err(|_| StreamError::Config(format!("{} must be a number, got {:?}", key, value)))
}
