//! Metrics collection for batch execution
//!
//! Provides Prometheus-compatible metrics for batch throughput, task outcomes
//! and pool rejections. Collectors live in the default registry.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Encoder, Histogram,
    IntCounterVec, IntGauge, TextEncoder,
};

use crate::{LatchPoolError, Result};

lazy_static! {
    /// Counter for finished batches
    static ref BATCHES: IntCounterVec = register_int_counter_vec!(
        "latchpool_batches_total",
        "Total number of executed batches",
        &["status"]
    ).unwrap();

    /// Counter for task outcomes
    static ref TASKS: IntCounterVec = register_int_counter_vec!(
        "latchpool_tasks_total",
        "Total number of tasks by outcome",
        &["outcome"]
    ).unwrap();

    /// Histogram for batch wall time
    static ref BATCH_DURATION: Histogram = register_histogram!(
        "latchpool_batch_duration_seconds",
        "Batch duration from initialization to barrier release",
        vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]
    ).unwrap();

    /// Gauge for batches currently waiting on their barrier
    static ref ACTIVE_BATCHES: IntGauge = register_int_gauge!(
        "latchpool_active_batches",
        "Number of batches currently executing"
    ).unwrap();
}

/// Record one task outcome (`success`, `error`, `empty`, `panic`, `rejected`)
pub fn record_task(outcome: &str) {
    TASKS.with_label_values(&[outcome]).inc();
}

/// Mark a batch as started
pub fn record_batch_start() {
    ACTIVE_BATCHES.inc();
}

/// Mark a batch as finished with `status` after `duration_secs`
pub fn record_batch_end(status: &str, duration_secs: f64) {
    ACTIVE_BATCHES.dec();
    BATCHES.with_label_values(&[status]).inc();
    BATCH_DURATION.observe(duration_secs);
}

/// Total tasks recorded under `outcome` since process start
pub fn task_count(outcome: &str) -> u64 {
    TASKS.with_label_values(&[outcome]).get()
}

/// Encode every registered metric in the Prometheus text format
pub fn gather() -> Result<String> {
    // Touch the collectors so they are registered before the first batch.
    lazy_static::initialize(&BATCHES);
    lazy_static::initialize(&TASKS);
    lazy_static::initialize(&BATCH_DURATION);
    lazy_static::initialize(&ACTIVE_BATCHES);

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| LatchPoolError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| LatchPoolError::Metrics(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_counter_increments() {
        let before = task_count("success");
        record_task("success");
        assert!(task_count("success") > before);
    }

    #[test]
    fn test_gather_contains_collectors() {
        record_task("rejected");
        let text = gather().unwrap();
        assert!(text.contains("latchpool_tasks_total"));
        assert!(text.contains("latchpool_active_batches"));
    }
}
