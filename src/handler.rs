//! Consumers of stream events.
//!
//! A session delivers every event to one [`EventHandler`]. Closures taking an
//! [`Event`] implement the trait directly; [`Callbacks`] wires the classic
//! three sinks (`on_chunk`, `on_complete`, `on_error`) onto it.

use std::collections::VecDeque;

use crate::client::StreamError;
use crate::model::{Event, Summary};

/// Receiver of the events of one session.
///
/// Called synchronously, in frame order, from the task driving the session.
pub trait EventHandler: Send {
    fn handle(&mut self, event: Event);
}

impl<F> EventHandler for F
where
    F: FnMut(Event) + Send,
{
    fn handle(&mut self, event: Event) {
        self(event)
    }
}

/// Three separate sinks behind a single handler.
///
/// # Example
/// ```
/// use qastream::handler::{Callbacks, EventHandler};
/// use qastream::model::Event;
///
/// let mut answer = String::new();
/// {
///     let mut callbacks = Callbacks::new(
///         |content: String| answer.push_str(&content),
///         |_summary| {},
///         |_error| {},
///     );
///     callbacks.handle(Event::Chunk { content: "hi".to_string() });
/// }
/// assert_eq!(answer, "hi");
/// ```
pub struct Callbacks<C, D, E> {
    on_chunk: C,
    on_complete: D,
    on_error: E,
}

impl<C, D, E> Callbacks<C, D, E>
where
    C: FnMut(String) + Send,
    D: FnMut(Summary) + Send,
    E: FnMut(StreamError) + Send,
{
    pub fn new(on_chunk: C, on_complete: D, on_error: E) -> Self {
        Self {
            on_chunk,
            on_complete,
            on_error,
        }
    }
}

impl<C, D, E> EventHandler for Callbacks<C, D, E>
where
    C: FnMut(String) + Send,
    D: FnMut(Summary) + Send,
    E: FnMut(StreamError) + Send,
{
    fn handle(&mut self, event: Event) {
        match event {
            Event::Chunk { content } => (self.on_chunk)(content),
            Event::Done { summary } => (self.on_complete)(summary),
            Event::Error { error } => (self.on_error)(error),
        }
    }
}

/// Handler that buffers events for later retrieval.
///
/// Used by the pull-based event stream, and handy in tests.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest buffered event.
    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Remove and return every buffered event.
    pub fn drain(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}

impl EventHandler for EventQueue {
    fn handle(&mut self, event: Event) {
        self.events.push_back(event);
    }
}
