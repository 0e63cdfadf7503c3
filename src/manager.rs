use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{ManagerError, ManagerResult};
use crate::processor::{MessageProcessor, ProcessOutcome};
use crate::queue::MessageQueue;
use crate::types::{
    HealthPolicy, HealthStatus, ManagerEvent, MessageId, QueueConfig, QueueMessage, QueueStats,
};

/// Type-erased view over a queue, enough for stats and health reporting
trait ManagedQueue: Send + Sync {
    fn stats(&self) -> QueueStats;
    fn max_size(&self) -> usize;
}

impl<T: Send + 'static> ManagedQueue for MessageQueue<T> {
    fn stats(&self) -> QueueStats {
        MessageQueue::stats(self)
    }

    fn max_size(&self) -> usize {
        self.config().max_size
    }
}

/// Worker loops attached to one queue
struct WorkerSet {
    stop_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

/// Registry entry for one named queue
struct QueueSlot {
    /// `Arc<MessageQueue<T>>` behind `Any` for type-checked lookup
    queue: Arc<dyn Any + Send + Sync>,

    /// Type-erased view for stats and health
    managed: Arc<dyn ManagedQueue>,

    /// Active worker loops, if processing was started
    workers: Option<WorkerSet>,

    /// Dead-letter count at the previous health poll
    last_dead_lettered: u64,
}

/// Registry of named queues plus ownership of their worker loops.
///
/// The registry is instance-owned state: construct a manager and pass it to
/// whatever needs it. Its lock is independent of every queue's internal lock,
/// so creating or removing one queue never blocks in-flight processing on
/// unrelated queues.
pub struct QueueManager {
    queues: RwLock<HashMap<String, QueueSlot>>,
    events: broadcast::Sender<ManagerEvent>,
    pause_tx: watch::Sender<bool>,
    health_policy: HealthPolicy,
}

impl QueueManager {
    /// Create a manager with the default health policy
    pub fn new() -> Self {
        Self::with_health_policy(HealthPolicy::default())
    }

    /// Create a manager with explicit health thresholds
    pub fn with_health_policy(health_policy: HealthPolicy) -> Self {
        let (events, _) = broadcast::channel(256);
        let (pause_tx, _) = watch::channel(false);
        Self {
            queues: RwLock::new(HashMap::new()),
            events,
            pause_tx,
            health_policy,
        }
    }

    /// Construct and register a queue for the payload type `T`.
    ///
    /// A duplicate name is a configuration bug, not an expected runtime
    /// condition, so it fails hard with [`ManagerError::DuplicateQueue`].
    #[instrument(skip(self, config), fields(queue = %config.name))]
    pub fn create_queue<T: Send + Sync + 'static>(
        &self,
        config: QueueConfig,
    ) -> ManagerResult<Arc<MessageQueue<T>>> {
        let name = config.name.clone();
        let queue = Arc::new(MessageQueue::new(config));

        let mut queues = self.queues.write();
        if queues.contains_key(&name) {
            return Err(ManagerError::DuplicateQueue(name));
        }
        queues.insert(
            name.clone(),
            QueueSlot {
                queue: queue.clone() as Arc<dyn Any + Send + Sync>,
                managed: queue.clone() as Arc<dyn ManagedQueue>,
                workers: None,
                last_dead_lettered: 0,
            },
        );
        drop(queues);

        info!("queue created");
        let _ = self.events.send(ManagerEvent::QueueCreated {
            name,
            at: Utc::now(),
        });
        Ok(queue)
    }

    /// Type-checked lookup. Returns `None` when the name is absent or the
    /// registered queue carries a different payload type.
    pub fn get_queue<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<MessageQueue<T>>> {
        let queues = self.queues.read();
        let slot = queues.get(name)?;
        slot.queue.clone().downcast::<MessageQueue<T>>().ok()
    }

    /// Stop any worker loops for the queue, then deregister it.
    /// Returns `false` when the name is not registered.
    #[instrument(skip(self))]
    pub async fn remove_queue(&self, name: &str) -> bool {
        let workers = {
            let mut queues = self.queues.write();
            match queues.remove(name) {
                Some(mut slot) => slot.workers.take(),
                None => return false,
            }
        };

        if let Some(workers) = workers {
            Self::shutdown_workers(workers).await;
        }

        info!("queue removed");
        let _ = self.events.send(ManagerEvent::QueueRemoved {
            name: name.to_string(),
            at: Utc::now(),
        });
        true
    }

    /// Launch `worker_count` concurrent worker loops for the named queue.
    ///
    /// Returns `false` when the queue does not exist, carries a different
    /// payload type, or is already being processed.
    #[instrument(skip(self, processor))]
    pub fn start_processing<T: Send + Sync + 'static>(
        &self,
        name: &str,
        processor: Arc<dyn MessageProcessor<T>>,
    ) -> bool {
        let mut queues = self.queues.write();
        let Some(slot) = queues.get_mut(name) else {
            return false;
        };
        if slot.workers.is_some() {
            return false;
        }
        let Ok(queue) = slot.queue.clone().downcast::<MessageQueue<T>>() else {
            return false;
        };

        let (stop_tx, _) = watch::channel(false);
        let worker_count = queue.config().worker_count.max(1);
        let mut handles = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let worker = Worker {
                queue: queue.clone(),
                processor: processor.clone(),
                stop_rx: stop_tx.subscribe(),
                pause_rx: self.pause_tx.subscribe(),
                index,
            };
            handles.push(tokio::spawn(worker.run()));
        }
        slot.workers = Some(WorkerSet { stop_tx, handles });
        drop(queues);

        info!(workers = worker_count, "processing started");
        true
    }

    /// Signal the queue's worker loops to stop and wait until each reaches a
    /// safe stopping point. Returns `false` when no processing was active.
    #[instrument(skip(self))]
    pub async fn stop_processing(&self, name: &str) -> bool {
        let workers = {
            let mut queues = self.queues.write();
            let Some(slot) = queues.get_mut(name) else {
                return false;
            };
            match slot.workers.take() {
                Some(workers) => workers,
                None => return false,
            }
        };

        Self::shutdown_workers(workers).await;
        info!("processing stopped");
        true
    }

    /// Derive a health indicator for the named queue from its current
    /// occupancy and the dead-letter growth since the previous poll.
    pub fn queue_health(&self, name: &str) -> HealthStatus {
        let mut queues = self.queues.write();
        let Some(slot) = queues.get_mut(name) else {
            return HealthStatus::Unhealthy;
        };
        let stats = slot.managed.stats();
        let delta = stats.dead_lettered.saturating_sub(slot.last_dead_lettered);
        slot.last_dead_lettered = stats.dead_lettered;
        self.health_policy
            .evaluate(&stats, slot.managed.max_size(), delta)
    }

    /// Snapshot statistics for one queue
    pub fn queue_statistics(&self, name: &str) -> Option<QueueStats> {
        self.queues.read().get(name).map(|slot| slot.managed.stats())
    }

    /// Snapshot statistics for every registered queue
    pub fn all_queue_statistics(&self) -> HashMap<String, QueueStats> {
        self.queues
            .read()
            .iter()
            .map(|(name, slot)| (name.clone(), slot.managed.stats()))
            .collect()
    }

    /// Names of all registered queues
    pub fn queue_names(&self) -> Vec<String> {
        self.queues.read().keys().cloned().collect()
    }

    /// Suspend all worker loops across all queues without discarding queued
    /// content. Workers finish the batch they already dequeued first.
    pub fn pause_all(&self) {
        let _ = self.pause_tx.send(true);
        info!("all queue processing paused");
    }

    /// Resume worker loops after [`pause_all`](Self::pause_all)
    pub fn resume_all(&self) {
        let _ = self.pause_tx.send(false);
        info!("all queue processing resumed");
    }

    /// Whether processing is globally paused
    pub fn is_paused(&self) -> bool {
        *self.pause_tx.borrow()
    }

    /// Subscribe to registry notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.events.subscribe()
    }

    async fn shutdown_workers(workers: WorkerSet) {
        let _ = workers.stop_tx.send(true);
        for handle in workers.handles {
            if let Err(e) = handle.await {
                error!("worker task join failed: {e}");
            }
        }
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new()
    }
}

/// One worker loop: dequeues from the shared queue, drives the processor,
/// and resolves every dequeued message before honoring stop or pause.
struct Worker<T: Send + Sync + 'static> {
    queue: Arc<MessageQueue<T>>,
    processor: Arc<dyn MessageProcessor<T>>,
    stop_rx: watch::Receiver<bool>,
    pause_rx: watch::Receiver<bool>,
    index: usize,
}

impl<T: Send + Sync + 'static> Worker<T> {
    async fn run(mut self) {
        let idle = self.queue.config().batch_timeout;
        debug!(queue = self.queue.name(), worker = self.index, "worker started");

        loop {
            if self.stop_requested() {
                break;
            }
            if *self.pause_rx.borrow() {
                self.wait_for_signal(idle).await;
                continue;
            }

            let batch = self.next_batch();
            if batch.is_empty() {
                self.wait_for_signal(idle).await;
                continue;
            }
            self.resolve(batch).await;
        }

        debug!(queue = self.queue.name(), worker = self.index, "worker stopped");
    }

    /// Stop on the cooperative signal, or when the manager side is gone
    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow() || self.stop_rx.has_changed().is_err()
    }

    fn next_batch(&self) -> Vec<QueueMessage<T>> {
        if self.processor.supports_batching() {
            let n = self
                .queue
                .config()
                .batch_size
                .min(self.processor.max_batch_size())
                .max(1);
            self.queue.dequeue_batch(n)
        } else {
            self.queue.dequeue().map(|m| vec![m]).unwrap_or_default()
        }
    }

    /// Every message in the batch ends up completed, requeued, or
    /// dead-lettered; nothing is silently dropped on stop.
    async fn resolve(&self, batch: Vec<QueueMessage<T>>) {
        let outcomes = match batch.as_slice() {
            [single] => vec![self.processor.process(single).await],
            many => self.processor.process_batch(many).await.outcomes,
        };

        let mut by_id: HashMap<MessageId, ProcessOutcome> = outcomes
            .into_iter()
            .map(|outcome| (outcome.message_id.clone(), outcome))
            .collect();

        for mut message in batch {
            match by_id.remove(&message.id) {
                Some(outcome) => match outcome.result {
                    Ok(()) => {
                        self.queue.mark_completed(&message.id, outcome.duration);
                    }
                    Err(err) if err.is_retryable() => {
                        warn!(
                            queue = self.queue.name(),
                            id = %message.id,
                            error = %err,
                            "retryable failure, requeueing"
                        );
                        message.last_error = Some(err.message().to_string());
                        self.queue.requeue(message);
                    }
                    Err(err) => {
                        error!(
                            queue = self.queue.name(),
                            id = %message.id,
                            error = %err,
                            "permanent failure, quarantining"
                        );
                        message.last_error = Some(err.message().to_string());
                        self.queue.move_to_dead_letter(message);
                    }
                },
                None => {
                    // Processor returned no outcome for this message; treat
                    // it as a retryable failure so the message is not lost.
                    warn!(
                        queue = self.queue.name(),
                        id = %message.id,
                        "missing batch outcome, requeueing"
                    );
                    self.queue.requeue(message);
                }
            }
        }
    }

    async fn wait_for_signal(&mut self, idle: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(idle) => {}
            _ = self.stop_rx.changed() => {}
            _ = self.pause_rx.changed() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use crate::processor::ProcessOutcome;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Recording {
        seen: Mutex<Vec<MessageId>>,
    }

    impl Recording {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MessageProcessor<String> for Recording {
        async fn process(&self, message: &QueueMessage<String>) -> ProcessOutcome {
            self.seen.lock().push(message.id.clone());
            ProcessOutcome::success(message.id.clone(), Duration::from_millis(1))
        }
    }

    struct AlwaysPermanentFailure;

    #[async_trait]
    impl MessageProcessor<String> for AlwaysPermanentFailure {
        async fn process(&self, message: &QueueMessage<String>) -> ProcessOutcome {
            ProcessOutcome::failure(
                message.id.clone(),
                ProcessError::permanent("unparseable frame"),
                Duration::from_millis(1),
            )
        }
    }

    fn fast_config(name: &str) -> QueueConfig {
        QueueConfig::new(name)
            .with_batch_timeout(Duration::from_millis(10))
            .with_retry_interval(Duration::ZERO)
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within timeout");
    }

    #[test]
    fn duplicate_queue_name_fails_hard() {
        let manager = QueueManager::new();
        manager
            .create_queue::<String>(QueueConfig::new("readings"))
            .expect("first registration");

        let err = manager
            .create_queue::<String>(QueueConfig::new("readings"))
            .expect_err("second registration must fail");
        assert_eq!(err, ManagerError::DuplicateQueue("readings".to_string()));
    }

    #[test]
    fn lookup_is_type_checked() {
        let manager = QueueManager::new();
        manager
            .create_queue::<String>(QueueConfig::new("readings"))
            .expect("create");

        assert!(manager.get_queue::<String>("readings").is_some());
        assert!(manager.get_queue::<u64>("readings").is_none());
        assert!(manager.get_queue::<String>("missing").is_none());
    }

    #[tokio::test]
    async fn remove_unknown_queue_returns_false() {
        let manager = QueueManager::new();
        assert!(!manager.remove_queue("missing").await);
    }

    #[tokio::test]
    async fn remove_emits_event_and_deregisters() {
        let manager = QueueManager::new();
        let mut events = manager.subscribe();
        manager
            .create_queue::<String>(QueueConfig::new("transient"))
            .expect("create");

        assert!(manager.remove_queue("transient").await);
        assert!(manager.get_queue::<String>("transient").is_none());

        let created = events.recv().await.expect("created event");
        assert!(matches!(created, ManagerEvent::QueueCreated { .. }));
        let removed = events.recv().await.expect("removed event");
        assert!(matches!(removed, ManagerEvent::QueueRemoved { .. }));
    }

    #[tokio::test]
    async fn workers_drain_the_queue() {
        let manager = QueueManager::new();
        let queue = manager
            .create_queue::<String>(fast_config("readings").with_worker_count(2))
            .expect("create");

        for i in 0..5 {
            assert!(queue.enqueue(QueueMessage::new(format!("frame-{i}"))));
        }

        let processor = Recording::new();
        assert!(manager.start_processing("readings", processor.clone() as Arc<dyn MessageProcessor<String>>));
        // Second start on the same queue is rejected.
        assert!(!manager.start_processing("readings", processor.clone() as Arc<dyn MessageProcessor<String>>));

        let stats_queue = queue.clone();
        wait_for(|| stats_queue.stats().completed == 5).await;

        assert!(manager.stop_processing("readings").await);
        assert!(!manager.stop_processing("readings").await);

        assert_eq!(processor.seen.lock().len(), 5);
        let stats = queue.stats();
        assert_eq!(stats.queued, 0);
        assert_eq!(stats.processing, 0);
    }

    #[tokio::test]
    async fn start_processing_requires_registered_queue() {
        let manager = QueueManager::new();
        let processor = Recording::new();
        assert!(!manager.start_processing("missing", processor as Arc<dyn MessageProcessor<String>>));
    }

    #[tokio::test]
    async fn permanent_failures_are_quarantined() {
        let manager = QueueManager::new();
        let queue = manager
            .create_queue::<String>(fast_config("poison"))
            .expect("create");

        for i in 0..3 {
            assert!(queue.enqueue(QueueMessage::new(format!("bad-{i}"))));
        }

        assert!(manager.start_processing(
            "poison",
            Arc::new(AlwaysPermanentFailure) as Arc<dyn MessageProcessor<String>>
        ));

        let stats_queue = queue.clone();
        wait_for(|| stats_queue.stats().dead_lettered == 3).await;
        assert!(manager.stop_processing("poison").await);

        let stats = queue.stats();
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.dead_lettered, 3);
        assert_eq!(queue.dead_letter_messages(10).len(), 3);
    }

    #[tokio::test]
    async fn pause_suspends_and_resume_restores_processing() {
        let manager = QueueManager::new();
        manager.pause_all();
        assert!(manager.is_paused());

        let queue = manager
            .create_queue::<String>(fast_config("paused"))
            .expect("create");
        for i in 0..3 {
            assert!(queue.enqueue(QueueMessage::new(format!("held-{i}"))));
        }

        let processor = Recording::new();
        assert!(manager.start_processing("paused", processor as Arc<dyn MessageProcessor<String>>));

        tokio::time::sleep(Duration::from_millis(100)).await;
        let stats = queue.stats();
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.queued, 3);

        manager.resume_all();
        let stats_queue = queue.clone();
        wait_for(|| stats_queue.stats().completed == 3).await;
        assert!(manager.stop_processing("paused").await);
    }

    #[tokio::test]
    async fn health_reflects_occupancy_and_registry() {
        let manager = QueueManager::with_health_policy(HealthPolicy {
            degraded_occupancy_ratio: 0.5,
            dead_letter_growth_threshold: 100,
        });
        assert_eq!(manager.queue_health("missing"), HealthStatus::Unhealthy);

        let queue = manager
            .create_queue::<String>(QueueConfig::new("watched").with_max_size(4))
            .expect("create");
        assert_eq!(manager.queue_health("watched"), HealthStatus::Healthy);

        assert!(queue.enqueue(QueueMessage::new("one".to_string())));
        assert!(queue.enqueue(QueueMessage::new("two".to_string())));
        assert_eq!(manager.queue_health("watched"), HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn statistics_cover_all_queues() {
        let manager = QueueManager::new();
        let serial = manager
            .create_queue::<String>(QueueConfig::new("serial"))
            .expect("create");
        manager
            .create_queue::<u64>(QueueConfig::new("counters"))
            .expect("create");

        assert!(serial.enqueue(QueueMessage::new("frame".to_string())));

        let all = manager.all_queue_statistics();
        assert_eq!(all.len(), 2);
        assert_eq!(all["serial"].queued, 1);
        assert_eq!(all["counters"].queued, 0);

        assert_eq!(manager.queue_statistics("serial").map(|s| s.queued), Some(1));
        assert!(manager.queue_statistics("missing").is_none());
    }
}
