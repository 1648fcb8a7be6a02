//! Source elements that produce messages.

use crate::error::Result;
use crate::message::Message;

/// A source element producing the pipeline's input messages.
///
/// Sources are the entry points of a pipeline. The scheduler polls
/// `produce()` once per tick; the source itself never blocks on downstream
/// completion.
///
/// # Lifecycle
///
/// - `produce()` is called once per scheduler tick
/// - Return `Ok(Some(message))` to emit a message
/// - Return `Ok(None)` to signal exhaustion (the schedule ends)
/// - Return `Err(...)` to signal an error (logged; the schedule ends)
pub trait Source: Send {
    /// Produce the next message.
    ///
    /// Returns `Ok(None)` when the source is exhausted.
    fn produce(&mut self) -> Result<Option<Message>>;

    /// Get the name of this source (for debugging/logging).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A source emitting monotonically increasing integers.
///
/// Get-and-increment semantics: each `produce()` returns the current value
/// and then increments, so the first message carries the initial value.
/// The counter wraps on `i64` overflow; there is no upper bound.
///
/// # Example
///
/// ```rust
/// use conflux::message::Value;
/// use conflux::source::{CounterSource, Source};
///
/// let mut src = CounterSource::starting_at(1);
/// let first = src.produce().unwrap().unwrap();
/// assert_eq!(first.payload(), &Value::Int(1));
/// ```
pub struct CounterSource {
    name: String,
    next: i64,
}

impl CounterSource {
    /// Create a counter source starting at 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create a counter source with a custom initial value.
    pub fn starting_at(initial: i64) -> Self {
        Self {
            name: "counter".to_string(),
            next: initial,
        }
    }

    /// Set a custom name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The value the next `produce()` call will return.
    pub fn current(&self) -> i64 {
        self.next
    }
}

impl Default for CounterSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for CounterSource {
    fn produce(&mut self) -> Result<Option<Message>> {
        let value = self.next;
        self.next = self.next.wrapping_add(1);
        Ok(Some(Message::new(value)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A source backed by a bound generator function.
///
/// The closure is polled once per tick; returning `None` ends the schedule.
///
/// # Example
///
/// ```rust
/// use conflux::message::Message;
/// use conflux::source::{FnSource, Source};
///
/// let mut remaining = 3;
/// let mut src = FnSource::new(move || {
///     if remaining == 0 {
///         return None;
///     }
///     remaining -= 1;
///     Some(Message::new("tick"))
/// });
///
/// assert!(src.produce().unwrap().is_some());
/// ```
pub struct FnSource<F> {
    name: String,
    generate: F,
}

impl<F> FnSource<F>
where
    F: FnMut() -> Option<Message> + Send,
{
    /// Create a source from a generator closure.
    pub fn new(generate: F) -> Self {
        Self {
            name: "fn-source".to_string(),
            generate,
        }
    }

    /// Set a custom name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<F> Source for FnSource<F>
where
    F: FnMut() -> Option<Message> + Send,
{
    fn produce(&mut self) -> Result<Option<Message>> {
        Ok((self.generate)())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
