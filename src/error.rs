use thiserror::Error;

/// Result type for manager registration operations
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Hard failures from the queue manager.
///
/// Expected runtime conditions (capacity reached, queue not found, stale
/// completion) are signaled through `bool`/`Option` return values instead;
/// only genuine programming errors surface here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManagerError {
    #[error("queue already registered: {0}")]
    DuplicateQueue(String),
}

/// Processing outcome classification - determines retry behavior
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// Retryable failure - the message is requeued while attempts remain
    #[error("retryable failure: {0}")]
    Retryable(String),

    /// Permanent failure - the message is quarantined immediately, no retry
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl ProcessError {
    /// Create a retryable error
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(msg.into())
    }

    /// Create a permanent error
    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        match self {
            Self::Retryable(msg) | Self::Permanent(msg) => msg,
        }
    }
}
