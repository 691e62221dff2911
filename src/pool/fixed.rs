//! Fixed-size thread pool
//!
//! N named worker threads drain a shared FIFO queue. The queue can be bounded,
//! in which case submissions beyond the capacity are handed back with
//! [`RejectReason::QueueFull`] instead of blocking the submitter.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

use super::{Job, PoolError, RejectReason, Rejected, WorkerPool};
use crate::config::ExecutorConfig;

struct QueueState {
    jobs: VecDeque<Job>,
    closed: bool,
}

struct Shared {
    queue: Mutex<QueueState>,
    available: Condvar,
    capacity: Option<usize>,
}

impl Shared {
    fn close(&self) -> bool {
        let mut queue = self.queue.lock();
        let was_open = !queue.closed;
        queue.closed = true;
        self.available.notify_all();
        was_open
    }
}

/// Thread pool with a fixed number of workers and an optionally bounded queue
pub struct FixedThreadPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

/// Builder for [`FixedThreadPool`]
#[derive(Debug, Clone)]
pub struct FixedThreadPoolBuilder {
    worker_count: usize,
    queue_capacity: Option<usize>,
    thread_name_prefix: String,
}

impl FixedThreadPoolBuilder {
    /// Number of worker threads
    pub fn worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Maximum number of queued (not yet running) jobs
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Worker threads are named `{prefix}-{index}`
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Spawn the workers
    pub fn build(self) -> Result<FixedThreadPool, PoolError> {
        if self.worker_count == 0 {
            return Err(PoolError::InvalidWorkerCount(0));
        }

        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
            capacity: self.queue_capacity,
        });

        let mut workers = Vec::with_capacity(self.worker_count);
        for index in 0..self.worker_count {
            let shared_for_worker = shared.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", self.thread_name_prefix, index))
                .spawn(move || worker_loop(shared_for_worker));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    error!(index, error = %e, "Failed to spawn worker thread");
                    shared.close();
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        info!(
            worker_count = self.worker_count,
            queue_capacity = ?self.queue_capacity,
            "Worker pool started"
        );

        Ok(FixedThreadPool {
            shared,
            workers: Mutex::new(workers),
            worker_count: self.worker_count,
        })
    }
}

impl FixedThreadPool {
    /// Create a pool with `worker_count` workers and an unbounded queue
    pub fn new(worker_count: usize) -> Result<Self, PoolError> {
        Self::builder().worker_count(worker_count).build()
    }

    /// Create a pool sized and named from an executor config
    pub fn from_config(config: &ExecutorConfig) -> Result<Self, PoolError> {
        let mut builder = Self::builder()
            .worker_count(config.worker_count)
            .thread_name_prefix(config.thread_name_prefix.clone());
        if let Some(capacity) = config.queue_capacity {
            builder = builder.queue_capacity(capacity);
        }
        builder.build()
    }

    /// Start configuring a pool
    pub fn builder() -> FixedThreadPoolBuilder {
        FixedThreadPoolBuilder {
            worker_count: num_cpus::get(),
            queue_capacity: None,
            thread_name_prefix: "latchpool-worker".to_string(),
        }
    }

    /// Jobs waiting for a free worker
    pub fn queued(&self) -> usize {
        self.shared.queue.lock().jobs.len()
    }

    /// Whether shutdown has begun
    pub fn is_shut_down(&self) -> bool {
        self.shared.queue.lock().closed
    }
}

impl WorkerPool for FixedThreadPool {
    fn submit(&self, job: Job) -> Result<(), Rejected> {
        let mut queue = self.shared.queue.lock();
        if queue.closed {
            return Err(Rejected::new(job, RejectReason::ShutDown));
        }
        if let Some(capacity) = self.shared.capacity {
            if queue.jobs.len() >= capacity {
                return Err(Rejected::new(job, RejectReason::QueueFull { capacity }));
            }
        }
        queue.jobs.push_back(job);
        self.shared.available.notify_one();
        Ok(())
    }

    /// Close the queue, let already queued jobs finish, and join the workers.
    ///
    /// Called from one of the pool's own workers, that worker is left to exit
    /// on its own instead of joining itself.
    fn shutdown(&self) {
        if self.shared.close() {
            debug!(worker_count = self.worker_count, "Worker pool shutting down");
        }

        let current = thread::current().id();
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("Worker thread terminated abnormally");
            }
        }
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }
}

impl Drop for FixedThreadPool {
    fn drop(&mut self) {
        // Workers drain the queue and exit; dropping never blocks on them.
        self.shared.close();
    }
}

impl std::fmt::Debug for FixedThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedThreadPool")
            .field("worker_count", &self.worker_count)
            .field("capacity", &self.shared.capacity)
            .field("queued", &self.queued())
            .finish()
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let job = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(job) = queue.jobs.pop_front() {
                    break job;
                }
                if queue.closed {
                    return;
                }
                shared.available.wait(&mut queue);
            }
        };

        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!(
                worker = thread::current().name().unwrap_or("unnamed"),
                "Job panicked on worker thread"
            );
        }
    }
}
