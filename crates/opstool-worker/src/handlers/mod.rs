mod alert;
mod cicd;
mod monitor;
mod vcs;

pub use alert::AlertHandler;
pub use cicd::CicdHandler;
pub use monitor::{sample_health, HealthSnapshot, MonitorHandler};
pub use vcs::VcsHandler;

use crate::config::WorkerConfig;
use crate::escalation::{default_rules, EscalationPolicy};
use crate::notifier::{Notifier, WebhookNotifier};
use crate::orchestrator::CliOrchestrator;
use async_trait::async_trait;
use opstool_core::{Result, Task, TaskResult, TaskType};
use std::sync::Arc;
use std::time::Duration;

/// Handles every task of one type
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Execute the task and describe the outcome.
    ///
    /// `Err` is reserved for tasks that could not be carried out at all
    /// (missing fields, unknown sub-action, spawn failure). Work that ran and
    /// failed is an `Ok` result with a failure status.
    async fn handle(&self, task: &Task) -> Result<TaskResult>;

    /// Wall-clock budget for one task, `None` when unbounded
    fn budget(&self) -> Option<Duration> {
        None
    }
}

/// Fixed mapping from task type to handler.
///
/// The set is closed: adding a type means adding a [`TaskType`] variant and
/// an arm in [`HandlerRegistry::get`].
pub struct HandlerRegistry {
    cicd: CicdHandler,
    vcs: VcsHandler,
    monitor: MonitorHandler,
    alerts: AlertHandler,
}

impl HandlerRegistry {
    pub fn new(cicd: CicdHandler, vcs: VcsHandler, monitor: MonitorHandler, alerts: AlertHandler) -> Self {
        HandlerRegistry {
            cicd,
            vcs,
            monitor,
            alerts,
        }
    }

    /// Wire up the production handlers
    pub fn from_config(config: &WorkerConfig) -> anyhow::Result<Self> {
        let notifier: Option<Arc<dyn Notifier>> = match &config.alerts.webhook_url {
            Some(url) if !url.is_empty() => Some(Arc::new(WebhookNotifier::new(
                url.clone(),
                Duration::from_secs(config.alerts.webhook_timeout_secs),
            )?)),
            _ => None,
        };

        let policy = EscalationPolicy::new(
            default_rules(&config.alerts),
            notifier,
            Arc::new(CliOrchestrator::new(
                config.alerts.orchestrator_bin.clone(),
                Duration::from_secs(config.alerts.action_timeout_secs),
            )),
        );

        Ok(HandlerRegistry::new(
            CicdHandler::new(config.execution.interpreter.clone(), config.cicd_budget()),
            VcsHandler,
            MonitorHandler,
            AlertHandler::new(policy),
        ))
    }

    /// Get the handler for a task type
    pub fn get(&self, task_type: TaskType) -> &dyn TaskHandler {
        match task_type {
            TaskType::Cicd => &self.cicd,
            TaskType::Vcs => &self.vcs,
            TaskType::Monitor => &self.monitor,
            TaskType::AlertResponse => &self.alerts,
        }
    }

    /// Get all registered task types
    pub fn task_types(&self) -> Vec<&'static str> {
        TaskType::ALL.iter().map(TaskType::as_str).collect()
    }

    /// Resolve the task's type and run its handler without any budget
    pub async fn dispatch(&self, task: &Task) -> Result<TaskResult> {
        let kind = task.kind()?;
        self.get(kind).handle(task).await
    }
}
