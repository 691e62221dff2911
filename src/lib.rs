//! # latchpool
//!
//! A bounded-parallelism batch executor. A batch of independent tasks runs on
//! a fixed-size worker pool while the calling thread blocks on a countdown
//! barrier; once every task has finished (or been refused by the pool) the
//! caller reads three aggregated outcomes.
//!
//! ## Quick Start
//!
//! ```rust
//! use latchpool::{task_fn, BatchExecutor, ResultRecord};
//! use serde_json::json;
//!
//! # fn example() -> latchpool::Result<()> {
//! let mut executor: BatchExecutor = BatchExecutor::new(4)?;
//!
//! let report = executor.execute(vec![
//!     task_fn("fetch", || ResultRecord::success(json!("ok"))),
//!     task_fn("parse", || ResultRecord::failure(json!("bad input"))),
//! ])?;
//!
//! assert_eq!(report.total_tasks, 2);
//! assert_eq!(executor.success_results(), vec![json!("ok")]);
//! assert_eq!(executor.reported_errors(), vec![json!("bad input")]);
//! assert!(executor.submission_errors().is_empty());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Outcomes
//!
//! - **Success results**: success payloads of every task that reported one
//! - **Task errors**: error payloads reported by tasks, plus caught panics
//! - **Submission errors**: tasks the worker pool refused, with the reason
//!
//! A task that reports an error, panics, or is refused never stops the rest of
//! the batch, and never leaves the caller blocked.
//!
//! ## Modules
//!
//! - [`barrier`]: countdown completion barrier and interrupt handle
//! - [`task`]: the task trait, result records and the task run cycle
//! - [`pool`]: worker pool contract and the fixed thread pool
//! - [`executor`]: batch lifecycle and result containers
//! - [`config`]: executor configuration
//! - [`metrics`]: Prometheus collectors

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use std::time::Duration;

use thiserror::Error;

/// Result type for latchpool operations
pub type Result<T> = std::result::Result<T, LatchPoolError>;

/// Main error type for latchpool operations
#[derive(Error, Debug)]
pub enum LatchPoolError {
    /// Invalid input or configuration, raised before any work starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Worker pool could not be created
    #[error("Pool error: {0}")]
    Pool(#[from] pool::PoolError),

    /// The barrier wait was interrupted; the batch is incomplete
    #[error("Batch wait interrupted: {0}")]
    Interrupted(String),

    /// The configured wait bound elapsed; the batch is incomplete
    #[error("Batch wait timed out after {waited:?} with {outstanding} task(s) outstanding")]
    TimedOut {
        /// How long the caller waited
        waited: Duration,
        /// Barrier count when the wait gave up
        outstanding: usize,
    },

    /// The executor has already run its batch
    #[error("Executor already ran a batch; create a new executor")]
    Exhausted,

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Metrics encoding error
    #[error("Metrics error: {0}")]
    Metrics(String),
}

/// Countdown completion barrier
pub mod barrier;

/// Executor configuration
pub mod config;

/// Batch execution
pub mod executor;

/// Metrics collection
pub mod metrics;

/// Worker pools
pub mod pool;

/// Units of work
pub mod task;

pub use barrier::{BarrierSlot, CompletionBarrier, InterruptHandle};
pub use config::ExecutorConfig;
pub use executor::{BatchExecutor, BatchOutcome, BatchReport, BatchResults, ExecutorState};
pub use pool::{FixedThreadPool, Job, PoolError, RejectReason, Rejected, WorkerPool};
pub use task::{task_fn, FnTask, ResultRecord, Task, TaskError, TaskId};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LatchPoolError::Configuration("task list must not be empty".to_string());
        assert_eq!(err.to_string(), "Configuration error: task list must not be empty");

        let err = LatchPoolError::TimedOut {
            waited: Duration::from_millis(5),
            outstanding: 2,
        };
        assert!(err.to_string().contains("2 task(s) outstanding"));
    }

    #[test]
    fn test_pool_error_converts() {
        let err: LatchPoolError = PoolError::InvalidWorkerCount(0).into();
        assert!(matches!(err, LatchPoolError::Pool(_)));
    }
}
