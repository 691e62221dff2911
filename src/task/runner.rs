//! Run cycle of a wired task

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::barrier::BarrierSlot;
use crate::executor::results::BatchResults;
use crate::metrics;
use crate::task::{Task, TaskId};

/// A task attached to its batch's barrier and result containers.
///
/// Owns exactly one barrier slot. Running the task releases it after the
/// record has been collected; dropping it unrun releases it too.
pub struct WiredTask<S, E> {
    id: TaskId,
    task: Box<dyn Task<S, E>>,
    results: Arc<BatchResults<S, E>>,
    slot: BarrierSlot,
}

impl<S, E> WiredTask<S, E>
where
    S: Send + 'static,
    E: Send + 'static,
{
    /// Attach `task` to a batch
    pub fn new(
        id: TaskId,
        task: Box<dyn Task<S, E>>,
        results: Arc<BatchResults<S, E>>,
        slot: BarrierSlot,
    ) -> Self {
        Self {
            id,
            task,
            results,
            slot,
        }
    }

    /// This task's identity
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Execute the task, collect its record, release the barrier slot.
    ///
    /// A panic inside [`Task::execute`] is caught and collected as
    /// [`TaskError::Panicked`](crate::task::TaskError::Panicked).
    pub fn run(self) {
        let WiredTask {
            id,
            mut task,
            results,
            slot,
        } = self;

        debug!(task = %id, "Task starting");
        match panic::catch_unwind(AssertUnwindSafe(|| task.execute())) {
            Ok(record) => {
                let outcome = match (&record.success, &record.error) {
                    (_, Some(_)) => "error",
                    (Some(_), None) => "success",
                    (None, None) => "empty",
                };
                metrics::record_task(outcome);
                debug!(task = %id, outcome, "Task finished");
                results.record(record);
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                metrics::record_task("panic");
                warn!(task = %id, panic = %message, "Task panicked");
                results.record_panic(id, message);
            }
        }

        slot.release();
    }
}

impl<S, E> std::fmt::Debug for WiredTask<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WiredTask")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
