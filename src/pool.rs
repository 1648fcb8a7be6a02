//! Bounded worker pool backing dispatching channels.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// What to do when a job is submitted and the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Block the submitter until queue space frees up. Never loses work.
    #[default]
    Block,
    /// Fail the submission with [`Error::QueueFull`].
    Reject,
    /// Silently drop the newly submitted job (counted in stats).
    DropNewest,
}

/// Configuration for a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Capacity of the job queue.
    pub queue_capacity: usize,
    /// Behavior when the queue is full.
    pub overflow: OverflowPolicy,
    /// Base name for worker threads (workers are named `<name>-<index>`).
    pub name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            queue_capacity: 64,
            overflow: OverflowPolicy::default(),
            name: "worker".to_string(),
        }
    }
}

impl PoolConfig {
    /// Set the number of worker threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the job queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the overflow policy.
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Set the worker thread base name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of worker threads fed by a bounded job queue.
///
/// The queue bound plus the [`OverflowPolicy`] give the dispatching channel
/// explicit backpressure instead of unbounded growth. Shutdown closes the
/// intake, drains jobs already queued, then joins the workers.
///
/// # Example
///
/// ```rust
/// use conflux::pool::{PoolConfig, WorkerPool};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// let pool = WorkerPool::new(PoolConfig::default().with_workers(2)).unwrap();
/// let done = Arc::new(AtomicU64::new(0));
///
/// for _ in 0..10 {
///     let done = done.clone();
///     pool.execute(move || {
///         done.fetch_add(1, Ordering::Relaxed);
///     })
///     .unwrap();
/// }
///
/// pool.shutdown();
/// assert_eq!(done.load(Ordering::Relaxed), 10);
/// ```
pub struct WorkerPool {
    name: String,
    overflow: OverflowPolicy,
    sender: Mutex<Option<kanal::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    executed: Arc<AtomicU64>,
    dropped: AtomicU64,
}

impl WorkerPool {
    /// Create a pool and spawn its worker threads.
    pub fn new(config: PoolConfig) -> Result<Self> {
        if config.workers == 0 {
            return Err(Error::InvalidPipeline(format!(
                "pool '{}': worker count must be non-zero",
                config.name
            )));
        }
        if config.queue_capacity == 0 {
            return Err(Error::InvalidPipeline(format!(
                "pool '{}': queue capacity must be non-zero",
                config.name
            )));
        }

        let (tx, rx) = kanal::bounded::<Job>(config.queue_capacity);
        let executed = Arc::new(AtomicU64::new(0));

        let mut workers = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let rx = rx.clone();
            let executed = executed.clone();
            let handle = std::thread::Builder::new()
                .name(format!("{}-{}", config.name, index))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        job();
                        executed.fetch_add(1, Ordering::Relaxed);
                    }
                })?;
            workers.push(handle);
        }

        Ok(Self {
            name: config.name,
            overflow: config.overflow,
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            executed,
            dropped: AtomicU64::new(0),
        })
    }

    /// The pool's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Submit a job, honoring the overflow policy.
    ///
    /// Returns [`Error::PoolClosed`] after shutdown and, under
    /// [`OverflowPolicy::Reject`], [`Error::QueueFull`] when the queue is
    /// full.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) -> Result<()> {
        // Clone the sender out so a blocking send does not hold the lock.
        let tx = self
            .sender
            .lock()
            .as_ref()
            .cloned()
            .ok_or_else(|| Error::PoolClosed(self.name.clone()))?;

        let job: Job = Box::new(job);
        match self.overflow {
            OverflowPolicy::Block => tx
                .send(job)
                .map_err(|_| Error::PoolClosed(self.name.clone())),
            OverflowPolicy::Reject => match tx.try_send(job) {
                Ok(true) => Ok(()),
                Ok(false) => Err(Error::QueueFull(self.name.clone())),
                Err(_) => Err(Error::PoolClosed(self.name.clone())),
            },
            OverflowPolicy::DropNewest => match tx.try_send(job) {
                Ok(true) => Ok(()),
                Ok(false) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(pool = %self.name, "queue full; job dropped");
                    Ok(())
                }
                Err(_) => Err(Error::PoolClosed(self.name.clone())),
            },
        }
    }

    /// Number of jobs currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.sender
            .lock()
            .as_ref()
            .map(|tx| tx.len())
            .unwrap_or(0)
    }

    /// Total number of jobs executed by the workers.
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    /// Number of jobs dropped under [`OverflowPolicy::DropNewest`].
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Check whether the pool has been shut down.
    pub fn is_shut_down(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Shut the pool down: close the intake, drain already-queued jobs,
    /// and join the worker threads. Idempotent.
    pub fn shutdown(&self) {
        let tx = self.sender.lock().take();
        drop(tx);

        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!(pool = %self.name, "worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
