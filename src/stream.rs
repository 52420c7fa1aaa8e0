//! Pull-based access to session events.
//!
//! Instead of pushing events into a handler, [`into_events`] wraps a response
//! body and a session into a `Stream` of [`Event`]s. Reads happen only when
//! the consumer polls, and dropping the stream drops the body.

use futures::stream::{self, Stream, StreamExt};

use crate::client::StreamError;
use crate::handler::EventQueue;
use crate::model::Event;
use crate::session::StreamSession;

/// Turn a body and its session into a stream of events.
///
/// `body` is `None` when the request never produced a response; the session
/// is then expected to be terminal already (its queued error is yielded).
/// The stream ends right after the terminal event.
///
/// # Example
/// ```
/// use futures::StreamExt;
/// use qastream::handler::EventQueue;
/// use qastream::session::StreamSession;
/// use qastream::stream::into_events;
/// use qastream::StreamError;
///
/// # #[tokio::main]
/// # async fn main() {
/// let body = futures::stream::iter(vec![Ok::<_, StreamError>(
///     b"data: {\"type\":\"chunk\",\"content\":\"hi\"}\n\n".to_vec(),
/// )]);
/// let events: Vec<_> = into_events(Some(body), StreamSession::new(EventQueue::new()))
///     .collect()
///     .await;
/// assert_eq!(events.len(), 2); // the chunk, then an implicit Done
/// # }
/// ```
pub fn into_events<S, B, E>(
    body: Option<S>,
    session: StreamSession<EventQueue>,
) -> impl Stream<Item = Event> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<StreamError> + Send + 'static,
{
    let body = body.map(|b| b.boxed());

    stream::unfold((body, session), |(mut body, mut session)| async move {
        loop {
            // Release the connection as soon as nothing more will be read.
            if session.state().is_terminal() {
                body = None;
            }

            if let Some(event) = session.handler_mut().pop() {
                return Some((event, (body, session)));
            }

            if session.state().is_terminal() {
                return None;
            }

            let Some(byte_stream) = body.as_mut() else {
                // No body and not terminal: nothing will ever arrive.
                session.finish();
                continue;
            };

            match byte_stream.next().await {
                Some(Ok(bytes)) => session.deliver(bytes.as_ref()),
                Some(Err(e)) => session.fail(e.into()),
                None => session.finish(),
            }
        }
    })
}
