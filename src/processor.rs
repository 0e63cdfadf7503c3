use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProcessError;
use crate::types::{MessageId, QueueMessage};

/// Result of processing a single message
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// The message this outcome belongs to
    pub message_id: MessageId,

    /// Success, or the failure classification that drives retry vs quarantine
    pub result: Result<(), ProcessError>,

    /// How long processing took
    pub duration: Duration,
}

impl ProcessOutcome {
    /// Record a successful processing attempt
    pub fn success(message_id: MessageId, duration: Duration) -> Self {
        Self {
            message_id,
            result: Ok(()),
            duration,
        }
    }

    /// Record a failed processing attempt
    pub fn failure(message_id: MessageId, error: ProcessError, duration: Duration) -> Self {
        Self {
            message_id,
            result: Err(error),
            duration,
        }
    }

    /// Whether the attempt succeeded
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of processing a batch, with per-message outcomes
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Individual outcome for every message in the batch
    pub outcomes: Vec<ProcessOutcome>,

    /// Number of successful messages
    pub succeeded: usize,

    /// Number of failed messages
    pub failed: usize,

    /// Wall time for the whole batch
    pub total_duration: Duration,
}

impl BatchOutcome {
    /// Build a batch result from individual outcomes
    pub fn from_outcomes(outcomes: Vec<ProcessOutcome>) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let failed = outcomes.len() - succeeded;
        let total_duration = outcomes.iter().map(|o| o.duration).sum();
        Self {
            outcomes,
            succeeded,
            failed,
            total_duration,
        }
    }
}

/// Externally supplied capability that consumes messages.
///
/// The manager is the sole caller of `process`/`process_batch` and respects
/// the declared capabilities exactly: it never requests a batch larger than
/// [`max_batch_size`](Self::max_batch_size) and never takes the batch path
/// unless [`supports_batching`](Self::supports_batching) says so.
#[async_trait]
pub trait MessageProcessor<T: Send + Sync>: Send + Sync {
    /// Process a single message
    async fn process(&self, message: &QueueMessage<T>) -> ProcessOutcome;

    /// Process a batch of messages. The default runs `process` sequentially;
    /// batch-capable implementations override this to amortize per-message
    /// overhead.
    async fn process_batch(&self, messages: &[QueueMessage<T>]) -> BatchOutcome {
        let mut outcomes = Vec::with_capacity(messages.len());
        for message in messages {
            outcomes.push(self.process(message).await);
        }
        BatchOutcome::from_outcomes(outcomes)
    }

    /// Whether this processor can handle the given message, used for
    /// selection among candidate processors
    fn can_process(&self, _message: &QueueMessage<T>) -> bool {
        true
    }

    /// Largest batch this processor accepts
    fn max_batch_size(&self) -> usize {
        1
    }

    /// Whether the batch path may be used at all
    fn supports_batching(&self) -> bool {
        false
    }
}

/// Ordered selection list over candidate processors.
///
/// `select` walks the list in registration order and returns the first
/// processor whose `can_process` accepts the message.
pub struct ProcessorChain<T: Send + Sync> {
    processors: Vec<Arc<dyn MessageProcessor<T>>>,
}

impl<T: Send + Sync> ProcessorChain<T> {
    /// Create an empty chain
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    /// Append a processor (builder style)
    pub fn with(mut self, processor: Arc<dyn MessageProcessor<T>>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Append a processor
    pub fn push(&mut self, processor: Arc<dyn MessageProcessor<T>>) {
        self.processors.push(processor);
    }

    /// First registered processor that accepts the message
    pub fn select(&self, message: &QueueMessage<T>) -> Option<Arc<dyn MessageProcessor<T>>> {
        self.processors
            .iter()
            .find(|p| p.can_process(message))
            .cloned()
    }

    /// Number of registered processors
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl<T: Send + Sync> Default for ProcessorChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EvenOnly;

    #[async_trait]
    impl MessageProcessor<u32> for EvenOnly {
        async fn process(&self, message: &QueueMessage<u32>) -> ProcessOutcome {
            ProcessOutcome::success(message.id.clone(), Duration::from_millis(1))
        }

        fn can_process(&self, message: &QueueMessage<u32>) -> bool {
            message.payload % 2 == 0
        }
    }

    struct Fallback;

    #[async_trait]
    impl MessageProcessor<u32> for Fallback {
        async fn process(&self, message: &QueueMessage<u32>) -> ProcessOutcome {
            ProcessOutcome::failure(
                message.id.clone(),
                ProcessError::permanent("fallback refuses everything"),
                Duration::from_millis(1),
            )
        }
    }

    #[tokio::test]
    async fn chain_selects_in_registration_order() {
        let chain = ProcessorChain::new()
            .with(Arc::new(EvenOnly) as Arc<dyn MessageProcessor<u32>>)
            .with(Arc::new(Fallback) as Arc<dyn MessageProcessor<u32>>);

        let even = QueueMessage::new(4u32);
        let odd = QueueMessage::new(3u32);

        let for_even = chain.select(&even).expect("even handler");
        assert!(for_even.process(&even).await.is_success());

        let for_odd = chain.select(&odd).expect("fallback handler");
        assert!(!for_odd.process(&odd).await.is_success());
    }

    #[tokio::test]
    async fn default_batch_path_reports_per_message_results() {
        struct FailOdd;

        #[async_trait]
        impl MessageProcessor<u32> for FailOdd {
            async fn process(&self, message: &QueueMessage<u32>) -> ProcessOutcome {
                if message.payload % 2 == 0 {
                    ProcessOutcome::success(message.id.clone(), Duration::from_millis(2))
                } else {
                    ProcessOutcome::failure(
                        message.id.clone(),
                        ProcessError::retryable("odd payload"),
                        Duration::from_millis(2),
                    )
                }
            }
        }

        let messages: Vec<QueueMessage<u32>> = (0..4).map(QueueMessage::new).collect();
        let batch = FailOdd.process_batch(&messages).await;

        assert_eq!(batch.outcomes.len(), 4);
        assert_eq!(batch.succeeded, 2);
        assert_eq!(batch.failed, 2);
        assert_eq!(batch.total_duration, Duration::from_millis(8));
    }
}
