//! Units of work
//!
//! A [`Task`] is opaque to the executor: it runs, and it reports a
//! [`ResultRecord`] whose success and error payloads are collected without
//! being inspected.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod runner;

pub use runner::WiredTask;

/// Outcome of one task execution.
///
/// The two payloads are independent: a task may report a partial success
/// alongside a warning-style error, either one alone, or nothing at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord<S = serde_json::Value, E = serde_json::Value> {
    /// Appended to the batch's success list when present
    pub success: Option<S>,
    /// Appended to the batch's error list when present
    pub error: Option<E>,
}

impl<S, E> ResultRecord<S, E> {
    /// Record carrying only a success payload
    pub fn success(value: S) -> Self {
        Self {
            success: Some(value),
            error: None,
        }
    }

    /// Record carrying only an error payload
    pub fn failure(error: E) -> Self {
        Self {
            success: None,
            error: Some(error),
        }
    }

    /// Record carrying both payloads
    pub fn partial(value: S, error: E) -> Self {
        Self {
            success: Some(value),
            error: Some(error),
        }
    }

    /// Record carrying nothing
    pub fn empty() -> Self {
        Self {
            success: None,
            error: None,
        }
    }

    /// Whether neither payload is present
    pub fn is_empty(&self) -> bool {
        self.success.is_none() && self.error.is_none()
    }
}

impl<S, E> Default for ResultRecord<S, E> {
    fn default() -> Self {
        Self::empty()
    }
}

/// A caller-defined unit of work
pub trait Task<S = serde_json::Value, E = serde_json::Value>: Send + 'static {
    /// Do the work and report its outcome
    fn execute(&mut self) -> ResultRecord<S, E>;

    /// Name used in logs and in [`TaskId`]
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }
}

/// [`Task`] backed by a closure
pub struct FnTask<F> {
    name: String,
    work: F,
}

impl<F> FnTask<F> {
    /// Wrap `work` under `name`
    pub fn new(name: impl Into<String>, work: F) -> Self {
        Self {
            name: name.into(),
            work,
        }
    }
}

impl<S, E, F> Task<S, E> for FnTask<F>
where
    F: FnMut() -> ResultRecord<S, E> + Send + 'static,
{
    fn execute(&mut self) -> ResultRecord<S, E> {
        (self.work)()
    }

    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }
}

/// Box a closure as a task, ready to go into a batch
pub fn task_fn<S, E, F>(name: impl Into<String>, work: F) -> Box<dyn Task<S, E>>
where
    S: 'static,
    E: 'static,
    F: FnMut() -> ResultRecord<S, E> + Send + 'static,
{
    Box::new(FnTask::new(name, work))
}

/// Identity of a task within its batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId {
    /// Position in the submitted batch
    pub index: usize,
    /// The task's [`Task::name`]
    pub name: String,
}

impl TaskId {
    /// Build an id
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.index)
    }
}

/// Entry of a batch's error list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskError<E = serde_json::Value> {
    /// Error payload reported by the task
    Reported(E),
    /// The task panicked before producing a record
    Panicked {
        /// Which task
        task: TaskId,
        /// Panic message, if it was a string
        message: String,
    },
}

impl<E> TaskError<E> {
    /// The reported payload, if this is not a panic
    pub fn reported(&self) -> Option<&E> {
        match self {
            TaskError::Reported(error) => Some(error),
            TaskError::Panicked { .. } => None,
        }
    }

    /// Whether this entry came from a panic
    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panicked { .. })
    }
}
