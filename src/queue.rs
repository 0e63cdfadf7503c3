use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_core::Stream;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::types::{MessageId, MessageStatus, QueueConfig, QueueEvent, QueueMessage, QueueStats};

/// Type alias for boxed event streams (stable Rust compatible)
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;

/// Mutable queue state, guarded as a unit so every operation is atomic
/// relative to every other and statistics reads are never torn.
struct QueueState<T> {
    /// Active storage, kept in dequeue order (priority-then-FIFO or pure FIFO)
    active: VecDeque<QueueMessage<T>>,

    /// In-flight messages: id -> processing start time
    processing: HashMap<MessageId, DateTime<Utc>>,

    /// Quarantined messages, oldest first
    dead_letter: VecDeque<QueueMessage<T>>,

    /// Cumulative successful completions
    completed: u64,

    /// Cumulative dead-lettered messages
    dead_lettered: u64,

    /// Sum of completed processing durations, for the rolling mean
    total_processing_ms: f64,
}

impl<T> QueueState<T> {
    fn new() -> Self {
        Self {
            active: VecDeque::new(),
            processing: HashMap::new(),
            dead_letter: VecDeque::new(),
            completed: 0,
            dead_lettered: 0,
            total_processing_ms: 0.0,
        }
    }
}

/// Bounded, thread-safe holding area for one payload type.
///
/// Producers call [`enqueue`](Self::enqueue) and treat a `false` return as
/// backpressure. Workers call [`dequeue`](Self::dequeue) /
/// [`dequeue_batch`](Self::dequeue_batch) and resolve each message with
/// [`mark_completed`](Self::mark_completed), [`requeue`](Self::requeue) or
/// [`move_to_dead_letter`](Self::move_to_dead_letter). No operation ever
/// suspends the caller; poll/backoff loops belong to the caller.
pub struct MessageQueue<T> {
    config: QueueConfig,
    state: Mutex<QueueState<T>>,
    events: broadcast::Sender<QueueEvent>,
}

impl<T> std::fmt::Debug for MessageQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageQueue")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T> MessageQueue<T> {
    /// Create a queue from its configuration
    pub fn new(config: QueueConfig) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            config,
            state: Mutex::new(QueueState::new()),
            events,
        }
    }

    /// Queue name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Queue configuration
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Add a message to active storage.
    ///
    /// Returns `false` without any state change when active storage is at
    /// capacity. This is the sole backpressure signal; callers must not
    /// assume eventual acceptance.
    pub fn enqueue(&self, mut message: QueueMessage<T>) -> bool {
        let now = Utc::now();
        let mut state = self.state.lock();
        if state.active.len() >= self.config.max_size {
            return false;
        }

        message.status = MessageStatus::Queued;
        let id = message.id.clone();
        self.insert_ordered(&mut state, message);
        let full = state.active.len() >= self.config.max_size;
        drop(state);

        let _ = self.events.send(QueueEvent::Enqueued {
            id,
            queue: self.config.name.clone(),
            at: now,
        });
        if full {
            let _ = self.events.send(QueueEvent::Full {
                queue: self.config.name.clone(),
                at: now,
            });
        }
        true
    }

    /// Remove and return the next eligible message, or `None` immediately if
    /// there is none. The message transitions to `Processing` and is recorded
    /// in the processing index until resolved.
    pub fn dequeue(&self) -> Option<QueueMessage<T>> {
        let now = Utc::now();
        let mut state = self.state.lock();
        let message = Self::take_next(&mut state, now)?;
        let drained = state.active.is_empty();
        drop(state);

        let _ = self.events.send(QueueEvent::Dequeued {
            id: message.id.clone(),
            at: now,
        });
        if drained {
            let _ = self.events.send(QueueEvent::Drained {
                queue: self.config.name.clone(),
                at: now,
            });
        }
        Some(message)
    }

    /// Remove up to `n` messages as one coordinated operation under a single
    /// lock acquisition. No message is ever handed to two callers.
    pub fn dequeue_batch(&self, n: usize) -> Vec<QueueMessage<T>> {
        let now = Utc::now();
        let mut batch = Vec::new();
        let mut state = self.state.lock();
        while batch.len() < n {
            match Self::take_next(&mut state, now) {
                Some(message) => batch.push(message),
                None => break,
            }
        }
        let drained = !batch.is_empty() && state.active.is_empty();
        drop(state);

        for message in &batch {
            let _ = self.events.send(QueueEvent::Dequeued {
                id: message.id.clone(),
                at: now,
            });
        }
        if drained {
            let _ = self.events.send(QueueEvent::Drained {
                queue: self.config.name.clone(),
                at: now,
            });
        }
        batch
    }

    /// Return a previously dequeued message after a retryable failure.
    ///
    /// Increments the retry count; once it exceeds the retry budget the
    /// message is quarantined instead of reinserted. Returns `true` in both
    /// branches (the resulting status tells the caller which one occurred)
    /// and `false` only when the message was not in the processing index.
    pub fn requeue(&self, mut message: QueueMessage<T>) -> bool {
        let now = Utc::now();
        let mut state = self.state.lock();
        if state.processing.remove(&message.id).is_none() {
            return false;
        }

        message.retry_count += 1;
        let id = message.id.clone();

        if message.retry_count > message.retry_limit(self.config.max_retries) {
            message.status = MessageStatus::DeadLetter;
            message.completed_at = Some(now);
            state.dead_letter.push_back(message);
            state.dead_lettered += 1;
            drop(state);
            let _ = self.events.send(QueueEvent::DeadLettered { id, at: now });
        } else {
            message.status = MessageStatus::Queued;
            message.processing_started_at = None;
            message.next_attempt_at = now
                + chrono::Duration::milliseconds(self.config.retry_interval.as_millis() as i64);
            let retry_count = message.retry_count;
            let next_attempt_at = message.next_attempt_at;
            self.insert_ordered(&mut state, message);
            drop(state);
            let _ = self.events.send(QueueEvent::Retrying {
                id,
                retry_count,
                next_attempt_at,
                at: now,
            });
        }
        true
    }

    /// Quarantine a previously dequeued message unconditionally, independent
    /// of its retry count, for callers that determine non-retryability
    /// themselves.
    pub fn move_to_dead_letter(&self, mut message: QueueMessage<T>) {
        let now = Utc::now();
        let mut state = self.state.lock();
        state.processing.remove(&message.id);
        message.status = MessageStatus::DeadLetter;
        message.completed_at = Some(now);
        let id = message.id.clone();
        state.dead_letter.push_back(message);
        state.dead_lettered += 1;
        drop(state);

        let _ = self.events.send(QueueEvent::DeadLettered { id, at: now });
    }

    /// Record a successful completion for an in-flight message.
    ///
    /// Removes the ID from the processing index, bumps the completion count,
    /// and folds `duration` into the rolling processing-time mean. A no-op
    /// returning `false` when the ID is not in the processing index, which
    /// guards against duplicate completions.
    pub fn mark_completed(&self, id: &MessageId, duration: Duration) -> bool {
        let now = Utc::now();
        let mut state = self.state.lock();
        if state.processing.remove(id).is_none() {
            return false;
        }
        state.completed += 1;
        state.total_processing_ms += duration.as_secs_f64() * 1000.0;
        drop(state);

        let _ = self.events.send(QueueEvent::Completed {
            id: id.clone(),
            at: now,
        });
        true
    }

    /// Empty active storage. In-flight processing entries and dead-letter
    /// storage are untouched.
    pub fn clear(&self) {
        self.state.lock().active.clear();
    }

    /// Number of messages in active storage
    pub fn len(&self) -> usize {
        self.state.lock().active.len()
    }

    /// Whether active storage is empty
    pub fn is_empty(&self) -> bool {
        self.state.lock().active.is_empty()
    }

    /// Whether active storage is at capacity
    pub fn is_full(&self) -> bool {
        self.state.lock().active.len() >= self.config.max_size
    }

    /// Consistent snapshot of the queue's counters
    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        QueueStats {
            queued: state.active.len(),
            processing: state.processing.len(),
            completed: state.completed,
            dead_lettered: state.dead_lettered,
            avg_processing_ms: if state.completed > 0 {
                state.total_processing_ms / state.completed as f64
            } else {
                0.0
            },
        }
    }

    /// Subscribe to queue notifications
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Queue notifications as a boxed stream
    pub fn event_stream(&self) -> BoxStream<QueueEvent> {
        use tokio_stream::{wrappers::BroadcastStream, StreamExt};
        let stream = BroadcastStream::new(self.events.subscribe()).filter_map(|result| result.ok());
        Box::pin(stream)
    }

    /// Insert respecting the ordering discipline: with priority mode on, the
    /// highest priority sits at the front with FIFO ties; otherwise strict
    /// FIFO by enqueue time.
    fn insert_ordered(&self, state: &mut QueueState<T>, message: QueueMessage<T>) {
        if self.config.enable_priority {
            let position = state
                .active
                .iter()
                .position(|existing| existing.priority < message.priority)
                .unwrap_or(state.active.len());
            state.active.insert(position, message);
        } else {
            state.active.push_back(message);
        }
    }

    /// Remove the first eligible message and move it into the processing index
    fn take_next(state: &mut QueueState<T>, now: DateTime<Utc>) -> Option<QueueMessage<T>> {
        let index = state.active.iter().position(|m| m.is_eligible(now))?;
        let mut message = state.active.remove(index)?;
        message.status = MessageStatus::Processing;
        message.processing_started_at = Some(now);
        state.processing.insert(message.id.clone(), now);
        Some(message)
    }
}

impl<T: Clone> MessageQueue<T> {
    /// Read-only view of the next eligible message
    pub fn peek(&self) -> Option<QueueMessage<T>> {
        let now = Utc::now();
        let state = self.state.lock();
        state.active.iter().find(|m| m.is_eligible(now)).cloned()
    }

    /// Up to `count` quarantined messages, oldest first
    pub fn dead_letter_messages(&self, count: usize) -> Vec<QueueMessage<T>> {
        let state = self.state.lock();
        state.dead_letter.iter().take(count).cloned().collect()
    }
}
