//! Passive observation taps.

use crate::error::Result;
use crate::message::Message;
use std::sync::atomic::{AtomicU64, Ordering};

/// A passive observer attached to a point in the flow.
///
/// The tap fires exactly once per message, on the same thread and at the
/// same time the primary flow reaches that point, before the message
/// continues to the next stage. A tap never alters the message, and a tap
/// failure is logged and contained: it must not block or break the primary
/// flow.
///
/// Plain closures implement `Tap` directly:
///
/// ```rust
/// use conflux::message::Message;
/// use conflux::tap::Tap;
/// use conflux::Result;
///
/// let quiet = |_msg: &Message| -> Result<()> { Ok(()) };
/// quiet.observe(&Message::new(1i64)).unwrap();
/// ```
pub trait Tap: Send + Sync {
    /// Observe a message flowing past the tapped point.
    fn observe(&self, message: &Message) -> Result<()>;

    /// Get the name of this tap (for debugging/logging).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> Tap for F
where
    F: Fn(&Message) -> Result<()> + Send + Sync,
{
    fn observe(&self, message: &Message) -> Result<()> {
        self(message)
    }
}

/// A tap that logs each observed payload together with the executing
/// thread.
///
/// The side-channel counterpart of [`LogStage`](crate::stages::LogStage):
/// same output, but off the primary path.
pub struct LogTap {
    name: String,
    count: AtomicU64,
}

impl LogTap {
    /// Create a new logging tap.
    pub fn new() -> Self {
        Self {
            name: "log-tap".to_string(),
            count: AtomicU64::new(0),
        }
    }

    /// Create a logging tap with a custom name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: AtomicU64::new(0),
        }
    }

    /// Get the number of messages observed.
    pub fn observed(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for LogTap {
    fn default() -> Self {
        Self::new()
    }
}

impl Tap for LogTap {
    fn observe(&self, message: &Message) -> Result<()> {
        self.count.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            tap = %self.name,
            payload = %message.payload(),
            thread = std::thread::current().name().unwrap_or("unnamed"),
            "observed"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_log_tap_counts() {
        let tap = LogTap::new();

        tap.observe(&Message::new(1i64)).unwrap();
        tap.observe(&Message::new(2i64)).unwrap();

        assert_eq!(tap.observed(), 2);
    }

    #[test]
    fn test_closure_tap_error() {
        let failing = |_msg: &Message| -> Result<()> {
            Err(Error::Aggregation("observer down".into()))
        };

        assert!(failing.observe(&Message::new(0i64)).is_err());
    }
}
