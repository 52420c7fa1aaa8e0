//! # qastream - Streaming question-answer client
//!
//! Consumes the `text/event-stream` responses of the tutoring and smart-QA
//! services and turns them into a clean sequence of events.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Incremental UTF-8 decoding that survives characters split across reads
//! - Greedy SSE frame splitting; partial frames wait for the rest
//! - One tagged [`Event`] type (`Chunk | Done | Error`) per session
//! - Push (handler), spawned-task and pull (`Stream`) consumption
//! - Cooperative cancellation with no callbacks after cancel
//!
//! ## Architecture
//!
//! Bytes flow through four small stages owned by one [`StreamSession`]:
//!
//! 1. [`decode::ByteAccumulator`] decodes bytes into a text buffer
//! 2. [`sse::drain_frames`] splits complete frames off that buffer
//! 3. [`record::parse_record`] parses a frame's `data:` payload as JSON
//! 4. [`dispatch::dispatch`] maps the record to an [`Event`]
//!
//! [`StreamClient`] issues the upstream POST and drives a session with the
//! response body.
//!
//! ## Example
//! ```no_run
//! use qastream::client::StreamClient;
//! use qastream::handler::Callbacks;
//! use qastream::requests::SmartQaQuestion;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = StreamClient::from_env()?;
//!     let question = SmartQaQuestion::new(42, "Which part should I review first?");
//!
//!     let callbacks = Callbacks::new(
//!         |content: String| print!("{}", content),
//!         |summary| println!("\n[done] {:?}", summary.fields),
//!         |error| eprintln!("\n[error] {}", error),
//!     );
//!
//!     let session = client.run(&question, callbacks, CancellationToken::new()).await;
//!     println!("session ended: {}", session.state());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod decode;
pub mod dispatch;
pub mod handler;
pub mod http;
pub mod logging;
pub mod model;
pub mod options;
pub mod record;
pub mod requests;
pub mod session;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use client::{ErrorKind, StreamClient, StreamError, StreamHandle, StreamRequest};
pub use handler::{Callbacks, EventHandler, EventQueue};
pub use model::{Event, SessionState, Summary};
pub use session::StreamSession;
