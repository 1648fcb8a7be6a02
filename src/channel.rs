//! Message channels: direct handoff or worker-pool dispatch.

use crate::error::Result;
use crate::message::Message;
use crate::pool::{PoolConfig, WorkerPool};
use std::sync::Arc;

/// Shared downstream handler invoked for each message leaving a channel.
///
/// Handlers are assembled by the pipeline builder: each one wraps a stage
/// (or tap, or aggregator) together with everything downstream of it.
pub type MessageHandler = Arc<dyn Fn(Message) + Send + Sync>;

/// Channel selection for the stage that follows it in a pipeline.
#[derive(Debug, Clone, Default)]
pub enum ChannelKind {
    /// Execute the next stage synchronously on the caller's thread.
    #[default]
    Direct,
    /// Hand the next stage to a worker pool and return immediately.
    Dispatch(PoolConfig),
}

impl ChannelKind {
    /// A dispatching channel with default pool parameters.
    pub fn dispatch() -> Self {
        Self::Dispatch(PoolConfig::default())
    }

    /// A dispatching channel with explicit pool parameters.
    pub fn dispatch_with(config: PoolConfig) -> Self {
        Self::Dispatch(config)
    }
}

/// A transport between stages.
///
/// `send` either runs the downstream handler inline (direct) or enqueues
/// it onto a worker pool (dispatching). Either way the message count
/// reaching the handler equals the count sent: a direct channel cannot
/// lose messages, and a dispatching pool only drops under an explicit
/// [`OverflowPolicy`](crate::pool::OverflowPolicy) choice.
pub struct Channel {
    inner: ChannelImpl,
}

enum ChannelImpl {
    Direct(MessageHandler),
    Dispatch {
        pool: Arc<WorkerPool>,
        handler: MessageHandler,
    },
}

impl Channel {
    /// Create a direct (same-thread, synchronous) channel.
    pub fn direct(handler: MessageHandler) -> Self {
        Self {
            inner: ChannelImpl::Direct(handler),
        }
    }

    /// Create a dispatching channel over an existing pool.
    pub fn dispatch(pool: Arc<WorkerPool>, handler: MessageHandler) -> Self {
        Self {
            inner: ChannelImpl::Dispatch { pool, handler },
        }
    }

    /// Send a message into the channel.
    ///
    /// For a direct channel this returns only after the downstream handler
    /// has completed. For a dispatching channel this returns as soon as the
    /// job is enqueued.
    pub fn send(&self, message: Message) -> Result<()> {
        match &self.inner {
            ChannelImpl::Direct(handler) => {
                handler(message);
                Ok(())
            }
            ChannelImpl::Dispatch { pool, handler } => {
                let handler = handler.clone();
                pool.execute(move || handler(message))
            }
        }
    }
}
