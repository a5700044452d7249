mod redis_queue;
mod memory_queue;

pub use redis_queue::RedisQueue;
pub use memory_queue::MemoryQueue;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Contract name of the list producers push tasks onto
pub const TASK_QUEUE: &str = "task_queue";

/// Contract name of the list results are pushed onto
pub const RESULT_QUEUE: &str = "task_results";

#[derive(Error, Debug)]
pub enum QueueError {
    /// The queue store could not be reached; callers should back off and retry
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("Queue closed")]
    Closed,
}

impl QueueError {
    pub fn is_connection(&self) -> bool {
        matches!(self, QueueError::Connection(_))
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// A shared FIFO store with an input list of tasks and an output list of
/// results. Pops are atomic in the store, so several workers can consume the
/// same input list without further coordination.
#[async_trait]
pub trait TaskQueue: Send {
    /// Block for up to `timeout` waiting for the next task payload
    async fn pop(&mut self, timeout: Duration) -> Result<Option<String>>;

    /// Append a result payload to the output list
    async fn push_result(&mut self, payload: String) -> Result<()>;

    /// Append a task payload to the input list (producer side)
    async fn push_task(&mut self, payload: String) -> Result<()>;
}
