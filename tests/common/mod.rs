//! Shared helpers for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use latchpool::{FixedThreadPool, Job, RejectReason, Rejected, WorkerPool};
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Pool that refuses chosen submissions and forwards the rest to a real pool
pub struct ScriptedPool {
    inner: FixedThreadPool,
    refusals: HashMap<usize, String>,
    submissions: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

impl ScriptedPool {
    /// `refusals` maps submission order (0-based) to the refusal reason
    pub fn new(workers: usize, refusals: HashMap<usize, String>) -> Self {
        Self {
            inner: FixedThreadPool::new(workers).expect("pool"),
            refusals,
            submissions: Arc::new(AtomicUsize::new(0)),
            shutdowns: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter of submit calls, readable after the pool moves into an executor
    pub fn submissions(&self) -> Arc<AtomicUsize> {
        self.submissions.clone()
    }

    /// Counter of shutdown calls
    pub fn shutdowns(&self) -> Arc<AtomicUsize> {
        self.shutdowns.clone()
    }
}

impl WorkerPool for ScriptedPool {
    fn submit(&self, job: Job) -> Result<(), Rejected> {
        let index = self.submissions.fetch_add(1, Ordering::SeqCst);
        match self.refusals.get(&index) {
            Some(reason) => Err(Rejected::new(job, RejectReason::Custom(reason.clone()))),
            None => self.inner.submit(job),
        }
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.inner.shutdown();
    }

    fn worker_count(&self) -> usize {
        self.inner.worker_count()
    }
}
