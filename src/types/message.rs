use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MessageId;

/// Message status lifecycle
///
/// Legal transitions: `Queued -> Processing -> Completed`,
/// `Processing -> Queued` (retry), `Processing -> DeadLetter`.
/// `Completed` and `DeadLetter` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageStatus {
    /// Message is in active storage waiting to be dequeued
    Queued,

    /// Message has been handed to a worker and sits in the processing index
    Processing,

    /// Message was processed successfully
    Completed,

    /// Message exhausted its retry budget or was explicitly quarantined
    DeadLetter,
}

impl MessageStatus {
    /// Check whether the status is terminal (completed or dead-lettered)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::DeadLetter)
    }

    /// Get the status name as a string
    pub fn name(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::DeadLetter => "dead_letter",
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The unit of work carried through a queue, generic over the payload type.
///
/// The envelope owns its payload exclusively while queued. The ID is assigned
/// at creation and never changes; a given ID is resident in exactly one of
/// active storage, the processing index, or the dead-letter store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage<T> {
    /// Unique message identifier
    pub id: MessageId,

    /// The payload being transported
    pub payload: T,

    /// Priority for ordering (higher values scheduled first when the queue
    /// has priority mode enabled; ties broken by earliest enqueue time)
    pub priority: i32,

    /// Current lifecycle status
    pub status: MessageStatus,

    /// Number of retry attempts so far (starts at 0)
    pub retry_count: u32,

    /// Per-message retry budget; `None` inherits the queue's configured limit
    pub max_retries: Option<u32>,

    /// When the message was created/enqueued
    pub enqueued_at: DateTime<Utc>,

    /// Earliest time the message is eligible for dequeue (retry delay gate)
    pub next_attempt_at: DateTime<Utc>,

    /// When a worker started processing the message (set on dequeue)
    pub processing_started_at: Option<DateTime<Utc>>,

    /// When the message reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,

    /// Last processing error, if any
    pub last_error: Option<String>,
}

impl<T> QueueMessage<T> {
    /// Create a new message around a payload
    pub fn new(payload: T) -> Self {
        let now = Utc::now();
        Self {
            id: MessageId::new(),
            payload,
            priority: 0,
            status: MessageStatus::Queued,
            retry_count: 0,
            max_retries: None,
            enqueued_at: now,
            next_attempt_at: now,
            processing_started_at: None,
            completed_at: None,
            last_error: None,
        }
    }

    /// Set the message priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Fix the retry budget at creation instead of inheriting the queue's
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Check whether the message is eligible for dequeue at `now`
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at <= now
    }

    /// Effective retry budget given a queue-level default
    pub fn retry_limit(&self, queue_default: u32) -> u32 {
        self.max_retries.unwrap_or(queue_default)
    }
}
