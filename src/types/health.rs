use serde::{Deserialize, Serialize};

use super::QueueStats;

/// Derived indicator summarizing a queue's occupancy and failure trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Normal occupancy and dead-letter growth
    Healthy,

    /// Occupancy approaching capacity, or dead-letter growth accelerating
    Degraded,

    /// The queue does not exist
    Unhealthy,
}

impl HealthStatus {
    /// Get the status name as a string
    pub fn name(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Configurable thresholds behind [`HealthStatus`] derivation.
///
/// The exact cutoffs are deployment policy, so they live here instead of
/// being fixed ratios inside the manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthPolicy {
    /// Occupancy fraction of `max_size` at which a queue reports Degraded
    pub degraded_occupancy_ratio: f64,

    /// Dead-letter growth between two health polls that reports Degraded
    pub dead_letter_growth_threshold: u64,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            degraded_occupancy_ratio: 0.8,
            dead_letter_growth_threshold: 10,
        }
    }
}

impl HealthPolicy {
    /// Evaluate a queue snapshot against the policy.
    ///
    /// `dead_letter_delta` is the dead-letter count growth observed since the
    /// previous health poll for the same queue.
    pub fn evaluate(
        &self,
        stats: &QueueStats,
        max_size: usize,
        dead_letter_delta: u64,
    ) -> HealthStatus {
        let occupancy = if max_size == 0 {
            1.0
        } else {
            stats.queued as f64 / max_size as f64
        };

        if occupancy >= self.degraded_occupancy_ratio
            || dead_letter_delta >= self.dead_letter_growth_threshold
        {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupancy_threshold_degrades() {
        let policy = HealthPolicy::default();
        let stats = QueueStats {
            queued: 80,
            ..Default::default()
        };
        assert_eq!(policy.evaluate(&stats, 100, 0), HealthStatus::Degraded);

        let stats = QueueStats {
            queued: 79,
            ..Default::default()
        };
        assert_eq!(policy.evaluate(&stats, 100, 0), HealthStatus::Healthy);
    }

    #[test]
    fn dead_letter_growth_degrades() {
        let policy = HealthPolicy::default();
        let stats = QueueStats::default();
        assert_eq!(policy.evaluate(&stats, 100, 10), HealthStatus::Degraded);
        assert_eq!(policy.evaluate(&stats, 100, 9), HealthStatus::Healthy);
    }
}
