//! Pluggable aggregation strategies: correlate, release, combine.

use super::{CorrelationKey, Group};
use crate::error::Result;
use crate::message::Message;

/// Derives the correlation key grouping a message for aggregation.
///
/// The same message must always map to the same key for the lifetime of
/// its processing.
pub trait CorrelationStrategy: Send + Sync {
    /// Compute the correlation key for a message.
    fn correlation_key(&self, message: &Message) -> CorrelationKey;
}

impl<F> CorrelationStrategy for F
where
    F: Fn(&Message) -> CorrelationKey + Send + Sync,
{
    fn correlation_key(&self, message: &Message) -> CorrelationKey {
        self(message)
    }
}

/// Correlates every message under one constant key.
///
/// Turns the aggregator into a single global batching window: every
/// message lands in the same group, released every time the policy fires.
pub struct ConstantKey {
    key: CorrelationKey,
}

impl ConstantKey {
    /// Create a constant-key strategy.
    pub fn new(key: impl Into<CorrelationKey>) -> Self {
        Self { key: key.into() }
    }
}

impl CorrelationStrategy for ConstantKey {
    fn correlation_key(&self, _message: &Message) -> CorrelationKey {
        self.key.clone()
    }
}

/// Correlates messages on the value of a named header.
///
/// Messages missing the header group together under an empty string key.
pub struct HeaderKey {
    header: String,
}

impl HeaderKey {
    /// Create a header-based strategy.
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }
}

impl CorrelationStrategy for HeaderKey {
    fn correlation_key(&self, message: &Message) -> CorrelationKey {
        message
            .headers()
            .get(&self.header)
            .map(CorrelationKey::from_value)
            .unwrap_or_else(|| CorrelationKey::Str(String::new()))
    }
}

/// Decides when a group is complete and should be emitted.
///
/// Evaluated after each admitted message, inside the group's critical
/// section.
pub trait ReleasePolicy: Send + Sync {
    /// Whether the group should be released now.
    fn should_release(&self, group: &Group) -> bool;
}

impl<F> ReleasePolicy for F
where
    F: Fn(&Group) -> bool + Send + Sync,
{
    fn should_release(&self, group: &Group) -> bool {
        self(group)
    }
}

/// Releases a group once its size strictly exceeds a threshold.
///
/// The boundary is deliberate: with a threshold of 10 the group releases
/// on its 11th message, batching 11 payloads.
pub struct SizeExceeds {
    threshold: usize,
}

impl SizeExceeds {
    /// Create a size-threshold policy.
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// The configured threshold.
    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

impl ReleasePolicy for SizeExceeds {
    fn should_release(&self, group: &Group) -> bool {
        group.len() > self.threshold
    }
}

/// Combines a released group's messages into one terminal message.
pub trait OutputProcessor: Send + Sync {
    /// Consume the group, producing the combined message.
    fn combine(&self, group: Group) -> Result<Message>;
}

impl<F> OutputProcessor for F
where
    F: Fn(Group) -> Result<Message> + Send + Sync,
{
    fn combine(&self, group: Group) -> Result<Message> {
        self(group)
    }
}

/// Joins the textual rendition of each payload, in arrival order, with a
/// separator.
///
/// The combined message carries the group's correlation key in its
/// `correlation-key` header.
pub struct JoinPayloads {
    separator: String,
}

impl JoinPayloads {
    /// Join with the given separator.
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    /// Join with a comma, the demonstration default.
    pub fn commas() -> Self {
        Self::new(",")
    }
}

impl OutputProcessor for JoinPayloads {
    fn combine(&self, group: Group) -> Result<Message> {
        let key = group.key().clone();
        let joined = group
            .messages()
            .iter()
            .map(|m| m.payload().to_string())
            .collect::<Vec<_>>()
            .join(&self.separator);

        Ok(Message::new(joined).with_header("correlation-key", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Value;

    #[test]
    fn test_constant_key() {
        let strategy = ConstantKey::new("all");
        let key = strategy.correlation_key(&Message::new(1i64));
        assert_eq!(key, CorrelationKey::Str("all".into()));
    }

    #[test]
    fn test_header_key() {
        let strategy = HeaderKey::new("order-id");

        let tagged = Message::new("item").with_header("order-id", 7i64);
        assert_eq!(strategy.correlation_key(&tagged), CorrelationKey::Int(7));

        let untagged = Message::new("item");
        assert_eq!(
            strategy.correlation_key(&untagged),
            CorrelationKey::Str(String::new())
        );
    }

    #[test]
    fn test_size_exceeds_boundary() {
        let policy = SizeExceeds::new(2);
        let mut group = Group::new(CorrelationKey::Str("k".into()));

        group.push(Message::new(1i64));
        assert!(!policy.should_release(&group));
        group.push(Message::new(2i64));
        assert!(!policy.should_release(&group));
        group.push(Message::new(3i64));
        assert!(policy.should_release(&group));
    }

    #[test]
    fn test_join_payloads_order_and_key() {
        let mut group = Group::new(CorrelationKey::Str("batch".into()));
        for i in [3i64, 1, 2] {
            group.push(Message::new(i));
        }

        let combined = JoinPayloads::commas().combine(group).unwrap();
        assert_eq!(combined.payload(), &Value::Str("3,1,2".into()));
        assert_eq!(
            combined.headers().get("correlation-key"),
            Some(&Value::Str("batch".into()))
        );
    }
}
