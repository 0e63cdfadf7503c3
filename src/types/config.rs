use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single queue, supplied once at creation time.
///
/// Runtime reconfiguration is out of scope; a collaborator that needs new
/// settings removes the queue and creates it again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue name, unique within a manager
    pub name: String,

    /// Maximum number of messages in active storage; enqueue declines beyond this
    pub max_size: usize,

    /// Upper bound on messages handed to a batch-capable processor at once
    pub batch_size: usize,

    /// Idle interval a worker waits before polling an empty queue again
    pub batch_timeout: Duration,

    /// Default retry budget for messages that do not fix their own
    pub max_retries: u32,

    /// Delay applied to a requeued message before it becomes eligible again
    pub retry_interval: Duration,

    /// Serve higher-priority messages first instead of strict FIFO
    pub enable_priority: bool,

    /// Number of concurrent worker loops the manager runs for this queue
    pub worker_count: usize,
}

impl QueueConfig {
    /// Create a configuration with defaults for the given queue name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_size: 10_000,
            batch_size: 10,
            batch_timeout: Duration::from_millis(100),
            max_retries: 3,
            retry_interval: Duration::from_secs(5),
            enable_priority: false,
            worker_count: 1,
        }
    }

    /// Set the active-storage capacity
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the idle poll interval for worker loops
    pub fn with_batch_timeout(mut self, batch_timeout: Duration) -> Self {
        self.batch_timeout = batch_timeout;
        self
    }

    /// Set the default retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the retry delay
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Enable priority-then-FIFO ordering
    pub fn with_priority(mut self, enable_priority: bool) -> Self {
        self.enable_priority = enable_priority;
        self
    }

    /// Set the number of worker loops
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new("default")
    }
}
