mod task;
mod severity;
mod result;
mod error;
pub mod codec;

pub use task::{Alert, Task, TaskId, TaskType, UNKNOWN_TASK_ID};
pub use severity::Severity;
pub use result::{ActionOutcome, ActionStatus, ResultStatus, TaskResult};
pub use error::{DispatchError, DecodeError, CodecError, Result};

/// Raw payloads echoed into logs are cut to this many bytes
pub const MAX_LOGGED_PAYLOAD: usize = 512;
