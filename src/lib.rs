//! # bridge-queue: Concurrent Message Queueing for Device-to-API Bridges
//!
//! **Thread-safe bounded queues with retry bookkeeping and dead-letter quarantine**
//!
//! bridge-queue is the decoupling layer between data ingestion (for example a
//! hardware serial reader) and outbound transmission (for example an HTTP
//! client). Producers hand typed payloads to a named queue; worker loops owned
//! by a [`QueueManager`] drain the queue and drive an externally supplied
//! [`MessageProcessor`], retrying failures until the retry budget runs out and
//! quarantining what cannot be delivered.
//!
//! ## Guarantees
//!
//! - **Bounded capacity with explicit backpressure**: `enqueue` returns
//!   `false` at capacity instead of blocking or erroring
//! - **No duplicate hand-off**: two workers never receive the same message
//! - **At-least-once processing** with a bounded retry budget per message
//! - **Optional priority ordering**: highest priority first, FIFO ties
//! - **Non-suspending operations**: `dequeue` returns immediately on empty;
//!   poll/backoff policy belongs to the worker loop
//! - **Consistent statistics**: snapshot reads are never torn, safe at any
//!   frequency concurrent with active workers
//!
//! ## Quick start
//!
//! ```
//! use bridge_queue::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Uploader;
//!
//! #[async_trait]
//! impl MessageProcessor<Vec<u8>> for Uploader {
//!     async fn process(&self, message: &QueueMessage<Vec<u8>>) -> ProcessOutcome {
//!         // hand the payload to the HTTP client here
//!         ProcessOutcome::success(message.id.clone(), Duration::from_millis(3))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let manager = QueueManager::new();
//! let queue = manager
//!     .create_queue::<Vec<u8>>(QueueConfig::new("readings").with_max_size(512))
//!     .expect("fresh queue name");
//!
//! // Producer side: a false return is backpressure, not a transient failure.
//! assert!(queue.enqueue(QueueMessage::new(vec![0x02, 0x31, 0x03])));
//!
//! // Consumer side: the manager owns the worker loops.
//! manager.start_processing(
//!     "readings",
//!     Arc::new(Uploader) as Arc<dyn MessageProcessor<Vec<u8>>>,
//! );
//! # manager.stop_processing("readings").await;
//! # }
//! ```

pub mod error;
pub mod manager;
pub mod processor;
pub mod queue;
pub mod types;

// Core API exports
pub use error::{ManagerError, ManagerResult, ProcessError};
pub use manager::QueueManager;
pub use processor::{BatchOutcome, MessageProcessor, ProcessOutcome, ProcessorChain};
pub use queue::{BoxStream, MessageQueue};
pub use types::{
    HealthPolicy, HealthStatus, ManagerEvent, MessageId, MessageStatus, QueueConfig, QueueEvent,
    QueueMessage, QueueStats,
};

/// Convenience prelude for producers, processors, and monitoring consumers
pub mod prelude {
    pub use crate::{
        BatchOutcome, HealthPolicy, HealthStatus, ManagerError, ManagerEvent, MessageId,
        MessageProcessor, MessageQueue, MessageStatus, ProcessError, ProcessOutcome,
        ProcessorChain, QueueConfig, QueueEvent, QueueManager, QueueMessage, QueueStats,
    };

    // Essential traits
    pub use async_trait::async_trait;
}
