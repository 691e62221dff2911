//! Executor configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{LatchPoolError, Result};

/// Configuration for a [`BatchExecutor`](crate::BatchExecutor) and the pool it
/// creates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Number of worker threads
    pub worker_count: usize,

    /// Maximum number of queued jobs; `None` means unbounded
    pub queue_capacity: Option<usize>,

    /// Prefix for worker thread names
    pub thread_name_prefix: String,

    /// Upper bound on the barrier wait in milliseconds; `None` waits forever
    pub wait_timeout_ms: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            queue_capacity: None,
            thread_name_prefix: "latchpool-worker".to_string(),
            wait_timeout_ms: None,
        }
    }
}

impl ExecutorConfig {
    /// Default configuration with `worker_count` workers
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Default::default()
        }
    }

    /// Set the worker count
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Bound the pool's pending queue
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Set the worker thread name prefix
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Bound the barrier wait
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Barrier wait bound as a [`Duration`]
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(LatchPoolError::Configuration(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err(LatchPoolError::Configuration(
                "queue_capacity must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExecutorConfig::default();
        assert!(config.worker_count > 0);
        assert!(config.queue_capacity.is_none());
        assert!(config.wait_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = ExecutorConfig::new(4)
            .with_queue_capacity(16)
            .with_thread_name_prefix("ingest")
            .with_wait_timeout(Duration::from_secs(2));

        assert_eq!(config.worker_count, 4);
        assert_eq!(config.queue_capacity, Some(16));
        assert_eq!(config.thread_name_prefix, "ingest");
        assert_eq!(config.wait_timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = ExecutorConfig::from_json(r#"{"worker_count": 3}"#).unwrap();
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.thread_name_prefix, "latchpool-worker");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ExecutorConfig::from_json(r#"{"worker_count": 0}"#),
            Err(LatchPoolError::Configuration(_))
        ));
        assert!(ExecutorConfig::new(2).with_queue_capacity(0).validate().is_err());
        assert!(matches!(
            ExecutorConfig::from_json("not json"),
            Err(LatchPoolError::Serialization(_))
        ));
    }
}
