mod publisher;
mod retry;

pub use publisher::{KafkaPublisher, Publisher};
pub use retry::RetryScheduler;
