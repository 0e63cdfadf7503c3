pub mod ids;
pub mod message;
pub mod config;
pub mod stats;
pub mod events;
pub mod health;

pub use ids::MessageId;
pub use message::{MessageStatus, QueueMessage};
pub use config::QueueConfig;
pub use stats::QueueStats;
pub use events::{ManagerEvent, QueueEvent};
pub use health::{HealthPolicy, HealthStatus};
