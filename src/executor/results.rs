//! Per-batch result containers and the batch summary

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pool::RejectReason;
use crate::task::{ResultRecord, TaskError, TaskId};

/// The three containers shared by the executor and every task of one batch.
///
/// All writers append or insert under their own lock, so concurrent workers
/// never lose an update. Entry order is not meaningful.
#[derive(Debug)]
pub struct BatchResults<S, E> {
    successes: Mutex<Vec<S>>,
    errors: Mutex<Vec<TaskError<E>>>,
    rejections: DashMap<TaskId, RejectReason>,
}

impl<S, E> Default for BatchResults<S, E> {
    fn default() -> Self {
        Self {
            successes: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            rejections: DashMap::new(),
        }
    }
}

impl<S, E> BatchResults<S, E> {
    /// Fresh, empty containers
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the present payloads of `record`
    pub fn record(&self, record: ResultRecord<S, E>) {
        if let Some(value) = record.success {
            self.successes.lock().push(value);
        }
        if let Some(error) = record.error {
            self.errors.lock().push(TaskError::Reported(error));
        }
    }

    /// Append a panic entry for `task`
    pub fn record_panic(&self, task: TaskId, message: String) {
        self.errors.lock().push(TaskError::Panicked { task, message });
    }

    /// Record that `task` was refused by the pool
    pub fn record_rejection(&self, task: TaskId, reason: RejectReason) {
        self.rejections.insert(task, reason);
    }

    /// Number of success payloads collected so far
    pub fn success_count(&self) -> usize {
        self.successes.lock().len()
    }

    /// Number of error entries collected so far
    pub fn error_count(&self) -> usize {
        self.errors.lock().len()
    }

    /// Number of panic entries collected so far
    pub fn panic_count(&self) -> usize {
        self.errors.lock().iter().filter(|e| e.is_panic()).count()
    }

    /// Number of rejected submissions
    pub fn rejection_count(&self) -> usize {
        self.rejections.len()
    }

    /// Copy of the success list
    pub fn successes(&self) -> Vec<S>
    where
        S: Clone,
    {
        self.successes.lock().clone()
    }

    /// Copy of the error list
    pub fn errors(&self) -> Vec<TaskError<E>>
    where
        E: Clone,
    {
        self.errors.lock().clone()
    }

    /// Copy of the submission-error map
    pub fn rejections(&self) -> HashMap<TaskId, RejectReason> {
        self.rejections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Move everything collected so far out, leaving the containers empty
    pub fn drain(&self) -> BatchOutcome<S, E> {
        let successes = std::mem::take(&mut *self.successes.lock());
        let errors = std::mem::take(&mut *self.errors.lock());
        let keys: Vec<TaskId> = self.rejections.iter().map(|entry| entry.key().clone()).collect();
        let rejections = keys
            .into_iter()
            .filter_map(|key| self.rejections.remove(&key))
            .collect();
        BatchOutcome {
            successes,
            errors,
            rejections,
        }
    }
}

/// Owned copy of a batch's aggregated results
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome<S = serde_json::Value, E = serde_json::Value> {
    /// Success payloads
    pub successes: Vec<S>,
    /// Reported errors and panics
    pub errors: Vec<TaskError<E>>,
    /// Tasks the pool refused, with the reason
    pub rejections: HashMap<TaskId, RejectReason>,
}

/// Summary of one completed batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Identifier used in this batch's log span
    pub batch_id: Uuid,
    /// Tasks in the batch
    pub total_tasks: usize,
    /// Success payloads collected
    pub successes: usize,
    /// Error payloads reported by tasks
    pub reported_errors: usize,
    /// Tasks that panicked
    pub panics: usize,
    /// Tasks the pool refused
    pub rejected: usize,
    /// When submission started
    pub started_at: DateTime<Utc>,
    /// When the barrier released
    pub finished_at: DateTime<Utc>,
    /// Wall time from initialization to release
    pub duration: Duration,
}

impl BatchReport {
    /// Whether every task ran and none reported an error or panicked
    pub fn is_clean(&self) -> bool {
        self.reported_errors == 0 && self.panics == 0 && self.rejected == 0
    }
}
