use std::time::Duration;
use thiserror::Error;

/// Failure modes recognized while dispatching a single task.
///
/// Everything except `Delivery` is recovered inside the dispatch loop and
/// turned into a result record.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Unknown task type: {0}")]
    UnknownType(String),

    #[error("Unknown {task_type} action: {action}")]
    UnknownSubAction { task_type: &'static str, action: String },

    #[error("No {0} specified")]
    MissingField(&'static str),

    #[error("{0}")]
    HandlerFailure(String),

    #[error("Task timed out after {}s", .0.as_secs())]
    HandlerTimeout(Duration),

    #[error("Result delivery failed: {0}")]
    Delivery(String),
}

/// Task payload could not be decoded.
///
/// Carries the task id when it could still be read out of the payload, so
/// the error result can be correlated by the producer.
#[derive(Error, Debug)]
#[error("Malformed task payload: {reason}")]
pub struct DecodeError {
    pub task_id: Option<String>,
    pub reason: String,
    pub raw: String,
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload is not valid UTF-8")]
    InvalidUtf8,
}

pub type Result<T> = std::result::Result<T, DispatchError>;
