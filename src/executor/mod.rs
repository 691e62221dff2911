//! Batch executor
//!
//! Runs a batch of independent tasks on a fixed worker pool and blocks the
//! caller until every task has either finished or been refused by the pool:
//!
//! - Every task owns one slot of a countdown barrier sized to the batch
//! - A task that runs releases its slot after its record is collected
//! - A task the pool refuses is dropped, which releases its slot at once
//! - The caller waits on the barrier, then shuts the pool down
//!
//! Results land in three containers: success payloads, task errors (reported
//! or panicked), and the submission-error map.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::barrier::{BarrierSlot, CompletionBarrier, InterruptHandle};
use crate::config::ExecutorConfig;
use crate::metrics;
use crate::pool::{FixedThreadPool, RejectReason, WorkerPool};
use crate::task::{Task, TaskError, TaskId, WiredTask};
use crate::{LatchPoolError, Result};

pub mod results;

pub use results::{BatchOutcome, BatchReport, BatchResults};

/// Lifecycle of an executor across its batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutorState {
    /// No batch started yet
    Idle,
    /// Barrier sized and containers allocated
    Initialized,
    /// Handing tasks to the pool
    Submitting,
    /// Caller blocked on the barrier
    AwaitingCompletion,
    /// Barrier released and pool shut down
    Completed,
    /// Barrier wait ended by interruption or timeout
    Interrupted,
}

/// Fixed-parallelism batch executor.
///
/// An executor runs one batch. Its pool is shut down once that batch
/// completes, so a later [`execute`](Self::execute) fails with
/// [`LatchPoolError::Exhausted`]; construct a new executor per batch.
pub struct BatchExecutor<S = serde_json::Value, E = serde_json::Value> {
    pool: Box<dyn WorkerPool>,
    config: ExecutorConfig,
    state: ExecutorState,
    barrier: Option<Arc<CompletionBarrier>>,
    results: Option<Arc<BatchResults<S, E>>>,
    interrupt: InterruptHandle,
}

impl<S, E> BatchExecutor<S, E>
where
    S: Send + 'static,
    E: Send + 'static,
{
    /// Create an executor backed by a [`FixedThreadPool`] of `worker_count`
    /// threads
    pub fn new(worker_count: usize) -> Result<Self> {
        Self::from_config(ExecutorConfig::new(worker_count))
    }

    /// Create an executor and its [`FixedThreadPool`] from `config`
    pub fn from_config(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;
        let pool = FixedThreadPool::from_config(&config)?;
        Ok(Self::with_pool(pool, config))
    }

    /// Create an executor around an existing pool.
    ///
    /// `config.worker_count` is informational here; the pool decides its own
    /// size.
    pub fn with_pool(pool: impl WorkerPool + 'static, config: ExecutorConfig) -> Self {
        Self {
            pool: Box::new(pool),
            config,
            state: ExecutorState::Idle,
            barrier: None,
            results: None,
            interrupt: InterruptHandle::default(),
        }
    }

    /// Run `tasks` to completion.
    ///
    /// Returns once every task has finished or been refused by the pool.
    /// Task errors and refusals do not make this fail; they are collected
    /// in the result containers. Fails with:
    ///
    /// - [`LatchPoolError::Configuration`] for an empty batch (no submissions)
    /// - [`LatchPoolError::Exhausted`] if this executor already ran a batch
    /// - [`LatchPoolError::Interrupted`] / [`LatchPoolError::TimedOut`] if the
    ///   wait ends early; results collected so far stay readable
    #[instrument(skip(self, tasks), fields(batch_id))]
    pub fn execute<I>(&mut self, tasks: I) -> Result<BatchReport>
    where
        I: IntoIterator<Item = Box<dyn Task<S, E>>>,
    {
        if self.state != ExecutorState::Idle {
            warn!(state = ?self.state, "Executor already ran a batch");
            return Err(LatchPoolError::Exhausted);
        }

        let tasks: Vec<Box<dyn Task<S, E>>> = tasks.into_iter().collect();
        let batch_id = Uuid::new_v4();
        tracing::Span::current().record("batch_id", tracing::field::display(batch_id));

        let started = Instant::now();
        let started_at = Utc::now();
        let (barrier, results) = self.initialize(&tasks)?;
        let total_tasks = tasks.len();
        info!(
            total_tasks,
            worker_count = self.pool.worker_count(),
            "Starting batch execution"
        );
        metrics::record_batch_start();

        self.submit_all(tasks, &barrier, &results);

        self.state = ExecutorState::AwaitingCompletion;
        self.interrupt.attach(barrier.clone());
        let waited = match self.config.wait_timeout() {
            Some(timeout) => barrier.wait_timeout(timeout),
            None => barrier.wait(),
        };
        self.interrupt.detach();

        if let Err(e) = waited {
            self.state = ExecutorState::Interrupted;
            error!(
                error = %e,
                remaining = barrier.count(),
                collected_successes = results.success_count(),
                collected_errors = results.error_count(),
                "Batch wait ended before all tasks completed"
            );
            metrics::record_batch_end("interrupted", started.elapsed().as_secs_f64());
            return Err(e);
        }

        self.pool.shutdown();
        self.state = ExecutorState::Completed;

        let duration = started.elapsed();
        let report = BatchReport {
            batch_id,
            total_tasks,
            successes: results.success_count(),
            reported_errors: results.error_count() - results.panic_count(),
            panics: results.panic_count(),
            rejected: results.rejection_count(),
            started_at,
            finished_at: Utc::now(),
            duration,
        };
        metrics::record_batch_end("completed", duration.as_secs_f64());

        info!(
            total_tasks,
            successes = report.successes,
            reported_errors = report.reported_errors,
            panics = report.panics,
            rejected = report.rejected,
            duration_ms = duration.as_millis(),
            "Batch execution completed"
        );
        if report.rejected > 0 {
            warn!(
                rejected = report.rejected,
                "Some tasks were refused by the worker pool"
            );
        }

        Ok(report)
    }

    /// Size a fresh barrier to the batch and allocate fresh containers
    fn initialize(
        &mut self,
        tasks: &[Box<dyn Task<S, E>>],
    ) -> Result<(Arc<CompletionBarrier>, Arc<BatchResults<S, E>>)> {
        if tasks.is_empty() {
            return Err(LatchPoolError::Configuration(
                "task list must not be empty".to_string(),
            ));
        }

        let barrier = Arc::new(CompletionBarrier::new(tasks.len()));
        let results = Arc::new(BatchResults::new());
        self.barrier = Some(barrier.clone());
        self.results = Some(results.clone());
        self.state = ExecutorState::Initialized;
        debug!(barrier_count = tasks.len(), "Batch initialized");

        Ok((barrier, results))
    }

    /// Wire every task, then hand each one to the pool.
    ///
    /// Wiring finishes before the first submission so no task runs while
    /// another is still being attached. A refused job comes back from the
    /// pool and is dropped here, which releases its barrier slot.
    fn submit_all(
        &mut self,
        tasks: Vec<Box<dyn Task<S, E>>>,
        barrier: &Arc<CompletionBarrier>,
        results: &Arc<BatchResults<S, E>>,
    ) {
        let wired: Vec<WiredTask<S, E>> = tasks
            .into_iter()
            .enumerate()
            .map(|(index, task)| {
                let id = TaskId::new(index, task.name().into_owned());
                WiredTask::new(id, task, results.clone(), BarrierSlot::new(barrier.clone()))
            })
            .collect();

        self.state = ExecutorState::Submitting;
        for task in wired {
            let id = task.id().clone();
            match self.pool.submit(Box::new(move || task.run())) {
                Ok(()) => debug!(task = %id, "Task submitted"),
                Err(rejected) => {
                    warn!(task = %id, reason = %rejected.reason, "Task submission rejected");
                    metrics::record_task("rejected");
                    results.record_rejection(id, rejected.reason);
                    drop(rejected.job);
                }
            }
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// The configuration this executor was built with
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Worker count reported by the pool
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Handle that interrupts the barrier wait from another thread
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// The current batch's barrier, once initialized
    pub fn barrier(&self) -> Option<&Arc<CompletionBarrier>> {
        self.barrier.as_ref()
    }

    /// The current batch's shared containers, once initialized
    pub fn results(&self) -> Option<&Arc<BatchResults<S, E>>> {
        self.results.as_ref()
    }

    /// Success payloads of the batch
    pub fn success_results(&self) -> Vec<S>
    where
        S: Clone,
    {
        self.results
            .as_ref()
            .map(|results| results.successes())
            .unwrap_or_default()
    }

    /// Reported errors and panics of the batch
    pub fn task_errors(&self) -> Vec<TaskError<E>>
    where
        E: Clone,
    {
        self.results
            .as_ref()
            .map(|results| results.errors())
            .unwrap_or_default()
    }

    /// Only the error payloads reported by tasks, without panics
    pub fn reported_errors(&self) -> Vec<E>
    where
        E: Clone,
    {
        self.task_errors()
            .into_iter()
            .filter_map(|error| match error {
                TaskError::Reported(payload) => Some(payload),
                TaskError::Panicked { .. } => None,
            })
            .collect()
    }

    /// Tasks the pool refused, keyed by task
    pub fn submission_errors(&self) -> HashMap<TaskId, RejectReason> {
        self.results
            .as_ref()
            .map(|results| results.rejections())
            .unwrap_or_default()
    }

    /// Move the collected results out without cloning payloads
    pub fn take_results(&mut self) -> Option<BatchOutcome<S, E>> {
        self.results.as_ref().map(|results| results.drain())
    }
}

impl<S, E> std::fmt::Debug for BatchExecutor<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("worker_count", &self.pool.worker_count())
            .field("config", &self.config)
            .field("state", &self.state)
            .field("barrier", &self.barrier)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{task_fn, ResultRecord};
    use serde_json::json;

    #[test]
    fn test_executor_creation() {
        let executor: BatchExecutor = BatchExecutor::new(2).unwrap();
        assert_eq!(executor.worker_count(), 2);
        assert_eq!(executor.state(), ExecutorState::Idle);
        assert!(executor.barrier().is_none());
        assert!(executor.success_results().is_empty());
    }

    #[test]
    fn test_invalid_worker_count() {
        let result: Result<BatchExecutor> = BatchExecutor::new(0);
        assert!(matches!(result, Err(LatchPoolError::Configuration(_))));
    }

    #[test]
    fn test_empty_batch_does_not_consume_executor() {
        let mut executor: BatchExecutor = BatchExecutor::new(1).unwrap();
        let err = executor.execute(Vec::new()).unwrap_err();
        assert!(matches!(err, LatchPoolError::Configuration(msg) if msg == "task list must not be empty"));
        assert_eq!(executor.state(), ExecutorState::Idle);

        let report = executor
            .execute(vec![task_fn("one", || ResultRecord::success(json!(1)))])
            .unwrap();
        assert_eq!(report.successes, 1);
        assert_eq!(executor.state(), ExecutorState::Completed);
    }

    #[test]
    fn test_second_batch_is_refused() {
        let mut executor: BatchExecutor = BatchExecutor::new(1).unwrap();
        executor
            .execute(vec![task_fn("first", || ResultRecord::success(json!("a")))])
            .unwrap();

        let err = executor
            .execute(vec![task_fn("second", || ResultRecord::success(json!("b")))])
            .unwrap_err();
        assert!(matches!(err, LatchPoolError::Exhausted));
        assert_eq!(executor.success_results(), vec![json!("a")]);
    }

    #[test]
    fn test_take_results_moves_payloads() {
        let mut executor: BatchExecutor<String, String> = BatchExecutor::new(2).unwrap();
        executor
            .execute(vec![
                task_fn("a", || ResultRecord::success("a".to_string())),
                task_fn("b", || ResultRecord::failure("b".to_string())),
            ])
            .unwrap();

        let outcome = executor.take_results().unwrap();
        assert_eq!(outcome.successes, vec!["a".to_string()]);
        assert_eq!(outcome.errors, vec![TaskError::Reported("b".to_string())]);
        assert!(executor.success_results().is_empty());
    }
}
