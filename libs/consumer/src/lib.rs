//! Цикл чтения одного шарда: курсор, батчи, повторы, декодирование.

pub mod config;
pub mod counter;
pub mod error;
pub mod retry;
mod consumer;

pub use config::ConsumerConfig;
pub use consumer::{ConsumerState, ExitReason, PollOutcome, RunSummary, ShardConsumer};
pub use counter::RecordCounter;
pub use error::ConsumerError;
pub use retry::RetryConfig;
