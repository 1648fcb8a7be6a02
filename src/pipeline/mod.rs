//! Pipeline construction and execution.
//!
//! A pipeline composes a [`Source`] with a chain of steps — stages behind
//! direct or dispatching channels, taps, aggregators — into a directed
//! flow, built once via [`PipelineBuilder`] and immutable afterwards.
//!
//! # Example
//!
//! ```rust,ignore
//! use conflux::aggregate::{Aggregator, ConstantKey, JoinPayloads, SizeExceeds};
//! use conflux::channel::ChannelKind;
//! use conflux::pipeline::Pipeline;
//! use conflux::source::CounterSource;
//! use conflux::stages::{DelayStage, LogStage};
//! use conflux::tap::LogTap;
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
//! // ... later
//! handle.stop();
//! handle.join()?;
//! ```

mod scheduler;

pub use scheduler::{SchedulerConfig, SchedulerStats};

use crate::aggregate::Aggregator;
use crate::channel::{Channel, ChannelKind, MessageHandler};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::pool::WorkerPool;
use crate::source::Source;
use crate::stage::Stage;
use crate::tap::Tap;
use scheduler::AtomicSchedulerStats;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// One step in the pipeline definition.
enum Step {
    Stage {
        stage: Arc<dyn Stage>,
        channel: ChannelKind,
    },
    Tap(Arc<dyn Tap>),
    Aggregate(Arc<Aggregator>),
}

/// Builder for a [`Pipeline`].
///
/// `channel(...)` selects the transport for the *next* `stage(...)` call;
/// stages default to a direct channel. Taps and aggregators always execute
/// inline on whichever thread carries the message at that point.
pub struct PipelineBuilder {
    source: Box<dyn Source>,
    config: SchedulerConfig,
    steps: Vec<Step>,
    pending_channel: Option<ChannelKind>,
}

impl PipelineBuilder {
    fn new(source: impl Source + 'static) -> Self {
        Self {
            source: Box::new(source),
            config: SchedulerConfig::default(),
            steps: Vec::new(),
            pending_channel: None,
        }
    }

    /// Set the fixed-rate polling period for the source.
    pub fn poll_every(mut self, period: Duration) -> Self {
        self.config.period = period;
        self
    }

    /// Select the channel carrying messages into the next stage.
    pub fn channel(mut self, kind: ChannelKind) -> Self {
        self.pending_channel = Some(kind);
        self
    }

    /// Append a transformation stage.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        let channel = self.pending_channel.take().unwrap_or_default();
        self.steps.push(Step::Stage {
            stage: Arc::new(stage),
            channel,
        });
        self
    }

    /// Attach a passive observer at this point in the flow.
    pub fn tap(mut self, tap: impl Tap + 'static) -> Self {
        self.steps.push(Step::Tap(Arc::new(tap)));
        self
    }

    /// Append a correlation-keyed aggregation step.
    pub fn aggregate(mut self, aggregator: Aggregator) -> Self {
        self.steps.push(Step::Aggregate(Arc::new(aggregator)));
        self
    }

    /// Validate the definition and assemble the pipeline.
    ///
    /// This is the only fatal failure point: an empty chain, a trailing
    /// `channel()` with no stage, or an invalid pool configuration all
    /// refuse to build.
    pub fn build(self) -> Result<Pipeline> {
        if self.steps.is_empty() {
            return Err(Error::InvalidPipeline("pipeline has no steps".into()));
        }
        if self.pending_channel.is_some() {
            return Err(Error::InvalidPipeline(
                "channel selected with no following stage".into(),
            ));
        }

        let mut pools = Vec::new();
        let mut aggregators = Vec::new();

        // Assemble the handler chain from the tail forward. Each handler
        // wraps one step plus everything downstream of it.
        let mut next: MessageHandler = Arc::new(|_message: Message| {});
        for step in self.steps.into_iter().rev() {
            next = match step {
                Step::Tap(tap) => {
                    let inner = next;
                    let handler: MessageHandler = Arc::new(move |message: Message| {
                        if let Err(e) = tap.observe(&message) {
                            tracing::warn!(
                                tap = tap.name(),
                                error = %e,
                                "tap failed; primary flow continues"
                            );
                        }
                        inner(message);
                    });
                    handler
                }
                Step::Aggregate(aggregator) => {
                    aggregators.push(aggregator.clone());
                    let inner = next;
                    let handler: MessageHandler =
                        Arc::new(move |message: Message| match aggregator.offer(message) {
                            Ok(Some(combined)) => inner(combined),
                            Ok(None) => {}
                            Err(e) => {
                                tracing::warn!(error = %e, "aggregation failed; message dropped");
                            }
                        });
                    handler
                }
                Step::Stage { stage, channel } => {
                    let inner = next;
                    let staged: MessageHandler =
                        Arc::new(move |message: Message| match stage.process(message) {
                            Ok(out) => inner(out),
                            Err(e) => {
                                tracing::warn!(
                                    stage = stage.name(),
                                    error = %e,
                                    "stage failed; message dropped"
                                );
                            }
                        });
                    match channel {
                        ChannelKind::Direct => staged,
                        ChannelKind::Dispatch(config) => {
                            let pool = Arc::new(WorkerPool::new(config)?);
                            pools.push(pool.clone());
                            let channel = Channel::dispatch(pool, staged);
                            let handler: MessageHandler = Arc::new(move |message: Message| {
                                if let Err(e) = channel.send(message) {
                                    tracing::warn!(error = %e, "dispatch failed; message dropped");
                                }
                            });
                            handler
                        }
                    }
                }
            };
        }

        Ok(Pipeline {
            source: self.source,
            config: self.config,
            entry: next,
            pools,
            aggregators,
        })
    }
}

/// A fully assembled pipeline, ready to run.
///
/// Either let the built-in scheduler drive it ([`start`](Pipeline::start))
/// or drive the source by hand ([`run_ticks`](Pipeline::run_ticks)) for
/// deterministic tests.
pub struct Pipeline {
    source: Box<dyn Source>,
    config: SchedulerConfig,
    entry: MessageHandler,
    pools: Vec<Arc<WorkerPool>>,
    aggregators: Vec<Arc<Aggregator>>,
}

impl Pipeline {
    /// Start building a pipeline from its source.
    pub fn builder(source: impl Source + 'static) -> PipelineBuilder {
        PipelineBuilder::new(source)
    }

    /// Poll the source `ticks` times back to back, without pacing.
    ///
    /// Returns the number of messages produced (less than `ticks` if the
    /// source was exhausted). Messages entering a dispatching channel may
    /// still be in flight when this returns; [`shutdown`](Pipeline::shutdown)
    /// drains them.
    pub fn run_ticks(&mut self, ticks: usize) -> Result<usize> {
        let mut produced = 0;
        for _ in 0..ticks {
            match self.source.produce()? {
                Some(message) => {
                    produced += 1;
                    (self.entry)(message);
                }
                None => break,
            }
        }
        Ok(produced)
    }

    /// Spawn the fixed-rate scheduler thread and hand back control.
    ///
    /// The pipeline runs until the source is exhausted or the handle stops
    /// it.
    pub fn start(self) -> Result<PipelineHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(AtomicSchedulerStats::new());

        let scheduler = {
            let stop = stop.clone();
            let stats = stats.clone();
            let entry = self.entry;
            let period = self.config.period;
            let source = self.source;
            std::thread::Builder::new()
                .name("conflux-scheduler".to_string())
                .spawn(move || scheduler::run_schedule(source, entry, period, stop, stats))?
        };

        Ok(PipelineHandle {
            stop,
            scheduler: Some(scheduler),
            pools: self.pools,
            aggregators: self.aggregators,
            stats,
        })
    }

    /// Shut down a hand-driven pipeline: drain the worker pools and discard
    /// any groups still open.
    pub fn shutdown(self) {
        for pool in &self.pools {
            pool.shutdown();
        }
        for aggregator in &self.aggregators {
            aggregator.discard_open();
        }
    }
}

/// Handle to a running pipeline.
///
/// Dropping the handle raises the stop flag but does not wait; call
/// [`join`](PipelineHandle::join) for an orderly shutdown (scheduler
/// stopped, pools drained, open groups discarded).
pub struct PipelineHandle {
    stop: Arc<AtomicBool>,
    scheduler: Option<JoinHandle<()>>,
    pools: Vec<Arc<WorkerPool>>,
    aggregators: Vec<Arc<Aggregator>>,
    stats: Arc<AtomicSchedulerStats>,
}

impl PipelineHandle {
    /// Ask the scheduler to stop after the current tick.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Check whether the scheduler thread is still alive.
    pub fn is_running(&self) -> bool {
        self.scheduler.as_ref().is_some_and(|s| !s.is_finished())
    }

    /// Get current scheduler statistics.
    pub fn stats(&self) -> SchedulerStats {
        self.stats.snapshot()
    }

    /// Stop the pipeline and wait for an orderly shutdown.
    ///
    /// Joins the scheduler, drains already-dispatched work out of the
    /// pools, and discards any aggregation groups still open.
    pub fn join(mut self) -> Result<()> {
        self.stop();
        if let Some(scheduler) = self.scheduler.take() {
            scheduler
                .join()
                .map_err(|_| Error::Scheduler("scheduler thread panicked".into()))?;
        }
        for pool in &self.pools {
            pool.shutdown();
        }
        for aggregator in &self.aggregators {
            aggregator.discard_open();
        }
        Ok(())
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
