use super::TaskHandler;
use async_trait::async_trait;
use opstool_core::{DispatchError, Result, Task, TaskResult};
use serde_json::{Map, Value};
use tracing::info;

/// Version-control operations.
///
/// The real work is done by the git automation tooling; the worker only
/// acknowledges the request.
pub struct VcsHandler;

/// Args echoed back so the orchestrator can tell requests apart
const ECHOED_ARGS: [&str; 3] = ["repo", "branch", "pr"];

#[async_trait]
impl TaskHandler for VcsHandler {
    async fn handle(&self, task: &Task) -> Result<TaskResult> {
        let message = match task.action() {
            "sync_repos" => "Repositories synced",
            "create_branch" => "Branch created",
            "merge_pr" => "Pull request merged",
            other => {
                return Err(DispatchError::UnknownSubAction {
                    task_type: "VCS",
                    action: other.to_string(),
                })
            }
        };

        info!(task_id = %task.id, action = task.action(), "{}", message);

        let echoed: Map<String, Value> = ECHOED_ARGS
            .iter()
            .filter_map(|key| task.arg(key).map(|v| (key.to_string(), Value::from(v))))
            .collect();

        let result = TaskResult::completed(&task.id, message);
        Ok(if echoed.is_empty() {
            result
        } else {
            result.with_data(Value::Object(echoed))
        })
    }
}
