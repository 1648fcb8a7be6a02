//! Correlation-keyed aggregation with pluggable release policies.
//!
//! The aggregator buffers messages by correlation key, evaluates a release
//! policy after each admitted message, and emits one combined message per
//! completed group:
//!
//! - [`CorrelationStrategy`] derives a [`CorrelationKey`] from a message
//! - [`ReleasePolicy`] decides when a [`Group`] is complete
//! - [`OutputProcessor`] combines the released group into one message
//!
//! Each strategy seam accepts plain closures as well as named types.

mod strategy;

pub use strategy::{
    ConstantKey, CorrelationStrategy, HeaderKey, JoinPayloads, OutputProcessor, ReleasePolicy,
    SizeExceeds,
};

use crate::error::Result;
use crate::message::{Message, Value};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Instant;

/// Value grouping related messages into one aggregation unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CorrelationKey {
    /// String key.
    Str(String),
    /// Integer key.
    Int(i64),
    /// Boolean key.
    Bool(bool),
}

impl CorrelationKey {
    /// Derive a key from a payload or header value.
    ///
    /// Values without a hashable representation (floats, bytes) key on
    /// their textual rendition.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Str(s) => CorrelationKey::Str(s.clone()),
            Value::Int(i) => CorrelationKey::Int(*i),
            Value::Bool(b) => CorrelationKey::Bool(*b),
            other => CorrelationKey::Str(other.to_string()),
        }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationKey::Str(s) => f.write_str(s),
            CorrelationKey::Int(i) => write!(f, "{i}"),
            CorrelationKey::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for CorrelationKey {
    fn from(s: &str) -> Self {
        CorrelationKey::Str(s.to_string())
    }
}

impl From<String> for CorrelationKey {
    fn from(s: String) -> Self {
        CorrelationKey::Str(s)
    }
}

impl From<i64> for CorrelationKey {
    fn from(i: i64) -> Self {
        CorrelationKey::Int(i)
    }
}

impl From<bool> for CorrelationKey {
    fn from(b: bool) -> Self {
        CorrelationKey::Bool(b)
    }
}

impl From<CorrelationKey> for Value {
    fn from(key: CorrelationKey) -> Self {
        match key {
            CorrelationKey::Str(s) => Value::Str(s),
            CorrelationKey::Int(i) => Value::Int(i),
            CorrelationKey::Bool(b) => Value::Bool(b),
        }
    }
}

/// An open group of correlated messages awaiting release.
///
/// Owned exclusively by the aggregator while open; handed to the output
/// processor the moment the release policy accepts it. Message order is
/// arrival order.
#[derive(Debug)]
pub struct Group {
    key: CorrelationKey,
    messages: Vec<Message>,
    created_at: Instant,
}

impl Group {
    /// Create an empty group for a key.
    pub fn new(key: CorrelationKey) -> Self {
        Self {
            key,
            messages: Vec::new(),
            created_at: Instant::now(),
        }
    }

    /// Append a message, preserving arrival order.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The group's correlation key.
    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    /// The buffered messages, in arrival order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of buffered messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if the group is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// When the group was opened.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Consume the group, returning its messages in arrival order.
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

/// Default number of shards in the group table.
const DEFAULT_SHARDS: usize = 16;

/// Buffers messages by correlation key and emits one combined message per
/// completed group.
///
/// # Concurrency
///
/// The group table is sharded; a key always maps to the same shard.
/// Append, policy evaluation, and group removal happen under that shard's
/// lock, so concurrent same-key arrivals serialize — a release decision is
/// never based on a stale count, no append is lost, and a group cannot
/// release twice. Different keys usually land on different shards and
/// proceed without contention. Combining runs after the group has been
/// removed, outside the lock.
///
/// # Example
///
/// ```rust
/// use conflux::aggregate::{Aggregator, ConstantKey, JoinPayloads, SizeExceeds};
/// use conflux::message::Message;
///
/// let agg = Aggregator::new(ConstantKey::new("all"), SizeExceeds::new(2), JoinPayloads::commas());
///
/// assert!(agg.offer(Message::new(1i64)).unwrap().is_none());
/// assert!(agg.offer(Message::new(2i64)).unwrap().is_none());
/// let combined = agg.offer(Message::new(3i64)).unwrap().unwrap();
/// assert_eq!(combined.payload().to_string(), "1,2,3");
/// ```
pub struct Aggregator {
    correlate: Box<dyn CorrelationStrategy>,
    release: Box<dyn ReleasePolicy>,
    output: Box<dyn OutputProcessor>,
    shards: Vec<Mutex<HashMap<CorrelationKey, Group>>>,
}

impl Aggregator {
    /// Create an aggregator from its three strategies.
    pub fn new(
        correlate: impl CorrelationStrategy + 'static,
        release: impl ReleasePolicy + 'static,
        output: impl OutputProcessor + 'static,
    ) -> Self {
        Self {
            correlate: Box::new(correlate),
            release: Box::new(release),
            output: Box::new(output),
            shards: (0..DEFAULT_SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    /// Use a custom shard count for the group table.
    ///
    /// Only meaningful before the aggregator starts receiving messages.
    pub fn with_shards(mut self, shards: usize) -> Self {
        let shards = shards.max(1);
        self.shards = (0..shards).map(|_| Mutex::new(HashMap::new())).collect();
        self
    }

    /// Admit a message.
    ///
    /// Returns `Ok(Some(combined))` when this message completed its group,
    /// `Ok(None)` when the group stays open.
    pub fn offer(&self, message: Message) -> Result<Option<Message>> {
        let key = self.correlate.correlation_key(&message);
        let shard = self.shard_for(&key);

        let released = {
            let mut table = shard.lock();
            let group = table
                .entry(key.clone())
                .or_insert_with(|| Group::new(key.clone()));
            group.push(message);

            if self.release.should_release(group) {
                table.remove(&key)
            } else {
                None
            }
        };

        match released {
            Some(group) => {
                tracing::debug!(key = %group.key(), size = group.len(), "group released");
                self.output.combine(group).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Number of currently open groups.
    pub fn open_groups(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    /// Total number of messages buffered in open groups.
    pub fn buffered(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().values().map(Group::len).sum::<usize>())
            .sum()
    }

    /// Discard all open groups, returning how many were dropped.
    ///
    /// Called at pipeline shutdown; no durability is promised for groups
    /// that never completed.
    pub fn discard_open(&self) -> usize {
        let mut discarded = 0;
        for shard in &self.shards {
            let mut table = shard.lock();
            discarded += table.len();
            table.clear();
        }
        if discarded > 0 {
            tracing::debug!(groups = discarded, "discarded open groups at shutdown");
        }
        discarded
    }

    fn shard_for(&self, key: &CorrelationKey) -> &Mutex<HashMap<CorrelationKey, Group>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }
}
