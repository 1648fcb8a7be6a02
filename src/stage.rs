//! Core stage trait.

use crate::error::Result;
use crate::message::Message;

/// A unit of transformation applied to a message.
///
/// Stages sit between channels, receiving a message and producing the next
/// one. A stage dispatched through a worker-pool channel executes
/// concurrently with other in-flight messages, so implementations are
/// shared (`&self`) across workers; keep mutable statistics in atomics.
///
/// A stage error is contained at the stage boundary: the message is dropped
/// from that invocation and the pipeline keeps running.
///
/// Plain closures implement `Stage` directly:
///
/// ```rust
/// use conflux::message::Message;
/// use conflux::stage::Stage;
/// use conflux::Result;
///
/// let upper = |msg: Message| -> Result<Message> {
///     Ok(msg.map_payload(|v| v.to_string().to_uppercase().into()))
/// };
/// let out = upper.process(Message::new("hello")).unwrap();
/// assert_eq!(out.payload().to_string(), "HELLO");
/// ```
pub trait Stage: Send + Sync {
    /// Transform an input message into the next message.
    fn process(&self, message: Message) -> Result<Message>;

    /// Get the name of this stage (for debugging/logging).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> Stage for F
where
    F: Fn(Message) -> Result<Message> + Send + Sync,
{
    fn process(&self, message: Message) -> Result<Message> {
        self(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::message::Value;

    #[test]
    fn test_closure_stage() {
        let double = |msg: Message| -> Result<Message> {
            Ok(msg.map_payload(|v| match v {
                Value::Int(i) => Value::Int(i * 2),
                other => other,
            }))
        };

        let out = double.process(Message::new(21i64)).unwrap();
        assert_eq!(out.payload(), &Value::Int(42));
    }

    #[test]
    fn test_closure_stage_error() {
        let failing = |_msg: Message| -> Result<Message> { Err(Error::stage("failing", "boom")) };

        let err = failing.process(Message::new(0i64)).unwrap_err();
        assert!(err.to_string().contains("failing"));
    }
}
