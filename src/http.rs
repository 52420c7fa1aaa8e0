//! HTTP client utilities for opening streamed requests.
//!
//! This module provides the reusable client construction, header handling
//! and response validation that every streaming endpoint shares.

use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use std::collections::HashMap;

use crate::client::StreamError;
use crate::options::{HttpTransport, TransportOptions};

/// Media type of the responses we consume.
pub const EVENT_STREAM: &str = "text/event-stream";

/// Longest error body quoted in a transport error, in characters.
const MAX_ERROR_BODY: usize = 512;

/// Bytes read from an error body; enough for `MAX_ERROR_BODY` characters.
const MAX_ERROR_BODY_BYTES: usize = MAX_ERROR_BODY * 4;

/// Build a configured HTTP client from transport options.
///
/// The timeout bounds connection setup only: a total request timeout would
/// cut long-lived streams short.
///
/// # Example
/// ```ignore
/// let client = build_http_client(&transport_options)?;
/// ```
pub fn build_http_client(
    transport_options: &TransportOptions<HttpTransport>,
) -> Result<Client, StreamError> {
    let mut builder = Client::builder();

    if let Some(timeout) = transport_options.timeout {
        builder = builder.connect_timeout(timeout);
    }

    if let Some(proxy_url) = &transport_options.provider.proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| StreamError::Config(format!("invalid proxy {}: {}", proxy_url, e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| StreamError::Config(format!("cannot build HTTP client: {}", e)))
}

/// Add extra headers to a request if specified in transport options.
///
/// # Example
/// ```ignore
/// let mut req = client.post(url);
/// req = add_extra_headers(req, &transport_options.provider.extra_headers);
/// ```
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// POST `body` as JSON and return the response once its status is known to
/// be successful.
///
/// A non-success status becomes a [`StreamError::Transport`] carrying the
/// status code and (a prefix of) the error body.
pub async fn post_stream<T: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    body: &T,
    extra_headers: &Option<HashMap<String, String>>,
) -> Result<Response, StreamError> {
    let mut req = client
        .post(url)
        .header(ACCEPT, EVENT_STREAM)
        .header(CONTENT_TYPE, "application/json");

    req = add_extra_headers(req, extra_headers);

    tracing::debug!(url, "opening event stream");
    let response = req.json(body).send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = read_error_body(response.bytes_stream(), MAX_ERROR_BODY_BYTES).await;
        return Err(handle_error_response(status, &body));
    }

    Ok(response)
}

/// Read at most `limit` bytes of an error body.
///
/// Stops at the limit, at end of body or at the first read error, so a
/// rejected request with an endless body still returns.
async fn read_error_body<S, B, E>(body: S, limit: usize) -> String
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    futures::pin_mut!(body);
    let mut buf = Vec::new();
    while buf.len() < limit {
        match body.next().await {
            Some(Ok(chunk)) => {
                let chunk = chunk.as_ref();
                let take = chunk.len().min(limit - buf.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            _ => break,
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Build the transport error for a rejected request.
fn handle_error_response(status: reqwest::StatusCode, body: &str) -> StreamError {
    let body = body.trim();
    let message = if body.is_empty() {
        format!("HTTP error! status: {}", status.as_u16())
    } else {
        let quoted: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("HTTP error! status: {}: {}", status.as_u16(), quoted)
    };
    StreamError::Transport {
        status: Some(status.as_u16()),
        message,
    }
}

/// The `charset` parameter of the response's `Content-Type`, if any.
pub fn declared_charset(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    charset_param(content_type).map(str::to_string)
}

fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}
