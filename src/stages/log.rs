//! Logging stage for observable pipeline output.

use crate::error::Result;
use crate::message::Message;
use crate::stage::Stage;
use std::sync::atomic::{AtomicU64, Ordering};

/// A stage that logs each message's payload together with the executing
/// thread, then passes the message through unchanged.
///
/// This is the terminal stage of the demonstration pipelines; in a larger
/// deployment it doubles as an inspection point anywhere in the chain.
/// Output goes through `tracing`, not the console directly.
pub struct LogStage {
    name: String,
    count: AtomicU64,
}

impl LogStage {
    /// Create a new logging stage.
    pub fn new() -> Self {
        Self {
            name: "log".to_string(),
            count: AtomicU64::new(0),
        }
    }

    /// Create a logging stage with a custom name.
    ///
    /// The name is carried in every log event, so distinct instances in
    /// one pipeline stay distinguishable.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: AtomicU64::new(0),
        }
    }

    /// Get the number of messages logged.
    pub fn message_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for LogStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for LogStage {
    fn process(&self, message: Message) -> Result<Message> {
        self.count.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            stage = %self.name,
            payload = %message.payload(),
            thread = std::thread::current().name().unwrap_or("unnamed"),
            "message"
        );
        Ok(message)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
