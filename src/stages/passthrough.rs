//! Pass-through stage.

use crate::error::Result;
use crate::message::Message;
use crate::stage::Stage;
use std::sync::atomic::{AtomicU64, Ordering};

/// A stage that passes messages through unchanged while counting them.
///
/// Useful as a placeholder while building pipelines and as an inspection
/// point in tests.
pub struct PassThrough {
    name: String,
    count: AtomicU64,
}

impl PassThrough {
    /// Create a new pass-through stage.
    pub fn new() -> Self {
        Self {
            name: "passthrough".to_string(),
            count: AtomicU64::new(0),
        }
    }

    /// Get the number of messages that have passed through.
    pub fn message_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for PassThrough {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for PassThrough {
    fn process(&self, message: Message) -> Result<Message> {
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(message)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Value;

    #[test]
    fn test_passthrough() {
        let stage = PassThrough::new();

        let out = stage.process(Message::new(7i64)).unwrap();
        assert_eq!(out.payload(), &Value::Int(7));

        stage.process(Message::new(8i64)).unwrap();
        assert_eq!(stage.message_count(), 2);
    }
}
