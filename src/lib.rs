//! # Conflux
//!
//! An in-process message pipeline engine: periodic production, concurrent
//! stage dispatch over bounded worker pools, fan-out tap observation, and
//! correlation-keyed aggregation with pluggable release policies.
//!
//! ## Building blocks
//!
//! - [`Message`](message::Message): immutable payload + headers envelope
//! - [`Source`](source::Source): produces messages, polled at a fixed rate
//! - [`Channel`](channel::Channel): direct (same-thread) or dispatching
//!   (worker-pool) handoff between stages
//! - [`Stage`](stage::Stage): transforms one message into the next
//! - [`Tap`](tap::Tap): passive observer off the primary path
//! - [`Aggregator`](aggregate::Aggregator): buffers by correlation key and
//!   emits one combined message per completed group
//! - [`Pipeline`](pipeline::Pipeline): composes the above and drives them
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use conflux::prelude::*;
//! use std::time::Duration;
//!
//! let pipeline = Pipeline::builder(CounterSource::starting_at(1))
//!     .poll_every(Duration::from_secs(1))
//!     .channel(ChannelKind::dispatch())
//!     .stage(DelayStage::new(Duration::from_secs(2)))
//!     .tap(LogTap::new())
//!     .aggregate(Aggregator::new(
//!         ConstantKey::new("all"),
//!         SizeExceeds::new(10),
//!         JoinPayloads::commas(),
//!     ))
//!     .stage(LogStage::with_name("terminal"))
//!     .build()?;
//!
//! let handle = pipeline.start()?;
//! ```
//!
//! There is no durable queue, no distributed messaging, and no network
//! transport: the engine operates purely in-process.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod channel;
pub mod error;
pub mod message;
pub mod pipeline;
pub mod pool;
pub mod source;
pub mod stage;
pub mod stages;
pub mod tap;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::aggregate::{
        Aggregator, ConstantKey, CorrelationKey, Group, HeaderKey, JoinPayloads, SizeExceeds,
    };
    pub use crate::channel::{Channel, ChannelKind};
    pub use crate::error::{Error, Result};
    pub use crate::message::{Headers, Message, Value};
    pub use crate::pipeline::{Pipeline, PipelineHandle};
    pub use crate::pool::{OverflowPolicy, PoolConfig, WorkerPool};
    pub use crate::source::{CounterSource, FnSource, Source};
    pub use crate::stage::Stage;
    pub use crate::stages::{DelayStage, LogStage, PassThrough};
    pub use crate::tap::{LogTap, Tap};
}

pub use error::{Error, Result};
