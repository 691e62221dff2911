//! Worker pool contract
//!
//! The executor only needs three things from a pool: accept a job or hand it
//! back with a reason, report its worker count, and shut down. Any scheduling
//! primitive with those properties can implement [`WorkerPool`];
//! [`FixedThreadPool`] is the implementation shipped with the crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod fixed;

pub use fixed::FixedThreadPool;

/// A unit of work handed to a pool
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Why a pool refused a job
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Pending queue is at capacity
    #[error("worker queue is full (capacity {capacity})")]
    QueueFull {
        /// Configured queue capacity
        capacity: usize,
    },

    /// Pool no longer accepts work
    #[error("worker pool is shut down")]
    ShutDown,

    /// Pool-specific refusal
    #[error("{0}")]
    Custom(String),
}

/// A refused submission. The job is handed back unrun.
pub struct Rejected {
    /// The job that was not accepted
    pub job: Job,
    /// Why it was not accepted
    pub reason: RejectReason,
}

impl Rejected {
    /// Pair a job with its rejection reason
    pub fn new(job: Job, reason: RejectReason) -> Self {
        Self { job, reason }
    }
}

impl std::fmt::Debug for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rejected")
            .field("job", &"Job")
            .field("reason", &self.reason)
            .finish()
    }
}

/// Pool construction failures
#[derive(Error, Debug)]
pub enum PoolError {
    /// A pool needs at least one worker
    #[error("invalid worker count {0}: must be at least 1")]
    InvalidWorkerCount(usize),

    /// The OS refused to start a worker thread
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Fixed-size scheduling primitive the executor submits jobs to
pub trait WorkerPool: Send + Sync {
    /// Schedule `job` onto one of the pool's workers.
    ///
    /// A refusal must hand the job back inside [`Rejected`] rather than
    /// dropping or running it.
    fn submit(&self, job: Job) -> std::result::Result<(), Rejected>;

    /// Stop accepting work and release worker resources. Safe to call more
    /// than once.
    fn shutdown(&self);

    /// Number of workers the pool was created with
    fn worker_count(&self) -> usize;
}
