use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MessageId;

/// Per-queue notification protocol for observability and alerting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QueueEvent {
    /// A message entered active storage
    Enqueued {
        id: MessageId,
        queue: String,
        at: DateTime<Utc>,
    },

    /// A message was handed to a worker
    Dequeued { id: MessageId, at: DateTime<Utc> },

    /// A message failed and was returned to active storage
    Retrying {
        id: MessageId,
        retry_count: u32,
        next_attempt_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },

    /// A message completed successfully
    Completed { id: MessageId, at: DateTime<Utc> },

    /// A message was quarantined in dead-letter storage
    DeadLettered { id: MessageId, at: DateTime<Utc> },

    /// Active storage reached its configured capacity
    Full { queue: String, at: DateTime<Utc> },

    /// Active storage went empty
    Drained { queue: String, at: DateTime<Utc> },
}

impl QueueEvent {
    /// Get event type name as string
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Enqueued { .. } => "enqueued",
            Self::Dequeued { .. } => "dequeued",
            Self::Retrying { .. } => "retrying",
            Self::Completed { .. } => "completed",
            Self::DeadLettered { .. } => "dead_lettered",
            Self::Full { .. } => "full",
            Self::Drained { .. } => "drained",
        }
    }

    /// Get the message ID for per-message events
    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            Self::Enqueued { id, .. }
            | Self::Dequeued { id, .. }
            | Self::Retrying { id, .. }
            | Self::Completed { id, .. }
            | Self::DeadLettered { id, .. } => Some(id),
            Self::Full { .. } | Self::Drained { .. } => None,
        }
    }

    /// Get the timestamp from any event
    pub fn timestamp(&self) -> &DateTime<Utc> {
        match self {
            Self::Enqueued { at, .. }
            | Self::Dequeued { at, .. }
            | Self::Retrying { at, .. }
            | Self::Completed { at, .. }
            | Self::DeadLettered { at, .. }
            | Self::Full { at, .. }
            | Self::Drained { at, .. } => at,
        }
    }
}

/// Manager-level registry notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ManagerEvent {
    /// A queue was created and registered
    QueueCreated { name: String, at: DateTime<Utc> },

    /// A queue was stopped and deregistered
    QueueRemoved { name: String, at: DateTime<Utc> },
}

impl ManagerEvent {
    /// Get the queue name from any event
    pub fn queue_name(&self) -> &str {
        match self {
            Self::QueueCreated { name, .. } | Self::QueueRemoved { name, .. } => name,
        }
    }
}
