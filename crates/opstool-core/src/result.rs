use crate::{DispatchError, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome category reported back to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// Handler ran and succeeded
    Completed,
    /// Handler ran and its work failed (non-zero exit)
    Failed,
    /// Execution budget exceeded
    Timeout,
    /// Task could not be dispatched or the handler errored
    Error,
    /// Alert seen, nothing to do
    Acknowledged,
    /// Escalation ran but at least one remedial action failed
    PartialFailure,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Completed => "completed",
            ResultStatus::Failed => "failed",
            ResultStatus::Timeout => "timeout",
            ResultStatus::Error => "error",
            ResultStatus::Acknowledged => "acknowledged",
            ResultStatus::PartialFailure => "partial_failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResultStatus::Completed | ResultStatus::Acknowledged)
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Sent,
    Succeeded,
    Failed,
}

/// One escalation step and how it went
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action: String,
    pub outcome: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ActionOutcome {
    pub fn new(action: impl Into<String>, outcome: ActionStatus, detail: Option<String>) -> Self {
        ActionOutcome {
            action: action.into(),
            outcome,
            detail,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == ActionStatus::Failed
    }
}

/// Result record pushed to the output queue, one per dequeued task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub status: ResultStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionOutcome>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskResult {
    pub fn new(task_id: impl Into<TaskId>, status: ResultStatus) -> Self {
        TaskResult {
            task_id: task_id.into(),
            status,
            message: None,
            stdout: None,
            stderr: None,
            return_code: None,
            data: None,
            actions: Vec::new(),
            worker_id: None,
            duration_ms: None,
            finished_at: None,
        }
    }

    pub fn completed(task_id: impl Into<TaskId>, message: impl Into<String>) -> Self {
        Self::new(task_id, ResultStatus::Completed).with_message(message)
    }

    pub fn acknowledged(task_id: impl Into<TaskId>, message: impl Into<String>) -> Self {
        Self::new(task_id, ResultStatus::Acknowledged).with_message(message)
    }

    pub fn error(task_id: impl Into<TaskId>, message: impl Into<String>) -> Self {
        Self::new(task_id, ResultStatus::Error).with_message(message)
    }

    /// Map a dispatch failure onto its result status
    pub fn from_error(task_id: impl Into<TaskId>, error: &DispatchError) -> Self {
        let status = match error {
            DispatchError::HandlerTimeout(_) => ResultStatus::Timeout,
            _ => ResultStatus::Error,
        };
        Self::new(task_id, status).with_message(error.to_string())
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Non-success statuses always carry a message
    pub fn ensure_message(&mut self) {
        if self.message.is_none() && !self.status.is_success() {
            self.message = Some(format!("Task {}", self.status));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_value(ResultStatus::PartialFailure).unwrap(), "partial_failure");
        assert_eq!(serde_json::to_value(ResultStatus::Acknowledged).unwrap(), "acknowledged");
        assert!(ResultStatus::Completed.is_success());
        assert!(ResultStatus::Acknowledged.is_success());
        assert!(!ResultStatus::PartialFailure.is_success());
        assert!(!ResultStatus::Timeout.is_success());
    }

    #[test]
    fn test_sparse_serialization() {
        let result = TaskResult::completed("t3", "Alert logged");
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json, serde_json::json!({
            "task_id": "t3",
            "status": "completed",
            "message": "Alert logged",
        }));
    }

    #[test]
    fn test_from_error() {
        let timeout = TaskResult::from_error("t", &DispatchError::HandlerTimeout(Duration::from_secs(1)));
        assert_eq!(timeout.status, ResultStatus::Timeout);

        let unknown = TaskResult::from_error("t2", &DispatchError::UnknownType("bogus".into()));
        assert_eq!(unknown.status, ResultStatus::Error);
        assert_eq!(unknown.message.as_deref(), Some("Unknown task type: bogus"));
    }

    #[test]
    fn test_ensure_message() {
        let mut failed = TaskResult::new("t", ResultStatus::Failed);
        failed.ensure_message();
        assert_eq!(failed.message.as_deref(), Some("Task failed"));

        let mut ok = TaskResult::new("t", ResultStatus::Completed);
        ok.ensure_message();
        assert!(ok.message.is_none());
    }
}
