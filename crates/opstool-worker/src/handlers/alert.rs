use super::TaskHandler;
use crate::escalation::EscalationPolicy;
use async_trait::async_trait;
use opstool_core::{Result, Severity, Task, TaskResult};
use tracing::info;

/// Severity-driven alert response
pub struct AlertHandler {
    policy: EscalationPolicy,
}

impl AlertHandler {
    pub fn new(policy: EscalationPolicy) -> Self {
        AlertHandler { policy }
    }
}

#[async_trait]
impl TaskHandler for AlertHandler {
    async fn handle(&self, task: &Task) -> Result<TaskResult> {
        let alert = task.alert.clone().unwrap_or_default();

        let result = match alert.level() {
            Some(Severity::Critical) => self.policy.escalate(&task.id, &alert).await,
            Some(Severity::Warning) => {
                let mut result = TaskResult::acknowledged(&task.id, "Warning acknowledged");
                if let Some(outcome) = self.policy.notify(&alert, Severity::Warning).await {
                    result.actions.push(outcome);
                }
                result
            }
            Some(Severity::Info) => {
                info!(task_id = %task.id, "Alert: {}", alert.message);
                TaskResult::completed(&task.id, "Alert logged")
            }
            None => {
                info!(task_id = %task.id, severity = %alert.severity, "Unrecognized alert severity");
                TaskResult::acknowledged(&task.id, "Alert processed")
            }
        };

        Ok(result)
    }
}
