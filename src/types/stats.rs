use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of a queue's counters.
///
/// Snapshots are internally consistent: every field reflects the same
/// lock-scoped observation, never a torn intermediate state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Messages currently in active storage
    pub queued: usize,

    /// Messages currently handed to workers (processing index size)
    pub processing: usize,

    /// Cumulative count of successful completions
    pub completed: u64,

    /// Cumulative count of dead-lettered messages
    pub dead_lettered: u64,

    /// Rolling mean of completed processing durations, in milliseconds
    pub avg_processing_ms: f64,
}

impl QueueStats {
    /// Total messages still resident in the queue (active plus in-flight)
    pub fn resident(&self) -> usize {
        self.queued + self.processing
    }
}
