//! Delay stage for simulating slow processing.

use crate::error::Result;
use crate::message::Message;
use crate::stage::Stage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A stage that sleeps for a fixed duration, then passes the message
/// through unchanged.
///
/// Blocking the executing thread is expected behavior under a dispatching
/// channel (that is the reason the channel exists); under a direct channel
/// it blocks the whole pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use conflux::stages::DelayStage;
/// use std::time::Duration;
///
/// let delay = DelayStage::new(Duration::from_secs(2));
/// ```
pub struct DelayStage {
    name: String,
    delay: Duration,
    count: AtomicU64,
    total_delay: AtomicU64, // in microseconds
}

impl DelayStage {
    /// Create a delay stage with the specified duration.
    pub fn new(delay: Duration) -> Self {
        Self {
            name: "delay".to_string(),
            delay,
            count: AtomicU64::new(0),
            total_delay: AtomicU64::new(0),
        }
    }

    /// Create a delay stage from milliseconds.
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Set a custom name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Get the configured delay duration.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Get the number of messages processed.
    pub fn message_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Get statistics.
    pub fn stats(&self) -> DelayStats {
        DelayStats {
            message_count: self.count.load(Ordering::Relaxed),
            configured_delay: self.delay,
            total_delay_micros: self.total_delay.load(Ordering::Relaxed),
        }
    }
}

impl Stage for DelayStage {
    fn process(&self, message: Message) -> Result<Message> {
        if !self.delay.is_zero() {
            let start = Instant::now();
            std::thread::sleep(self.delay);
            let actual = start.elapsed();
            self.total_delay
                .fetch_add(actual.as_micros() as u64, Ordering::Relaxed);
        }

        self.count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            stage = %self.name,
            payload = %message.payload(),
            thread = std::thread::current().name().unwrap_or("unnamed"),
            "delayed message"
        );
        Ok(message)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Statistics for a [`DelayStage`].
#[derive(Debug, Clone, Copy)]
pub struct DelayStats {
    /// Number of messages processed.
    pub message_count: u64,
    /// Configured delay duration.
    pub configured_delay: Duration,
    /// Total actual delay applied in microseconds.
    pub total_delay_micros: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Value;

    #[test]
    fn test_delay_passthrough() {
        let delay = DelayStage::new(Duration::ZERO);

        let out = delay.process(Message::new(42i64)).unwrap();
        assert_eq!(out.payload(), &Value::Int(42));
        assert_eq!(delay.message_count(), 1);
    }

    #[test]
    fn test_delay_timing() {
        let delay = DelayStage::from_millis(50);

        let start = Instant::now();
        delay.process(Message::new(0i64)).unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(45)); // Allow some margin
        assert!(elapsed < Duration::from_millis(200));
    }

    #[test]
    fn test_delay_stats() {
        let delay = DelayStage::from_millis(10);

        delay.process(Message::new(0i64)).unwrap();
        delay.process(Message::new(1i64)).unwrap();

        let stats = delay.stats();
        assert_eq!(stats.message_count, 2);
        assert!(stats.total_delay_micros >= 20_000); // At least 20ms total
    }

    #[test]
    fn test_delay_with_name() {
        let delay = DelayStage::from_millis(10).with_name("slow-step");
        assert_eq!(delay.name(), "slow-step");
    }
}
