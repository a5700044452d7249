//! Critical-alert escalation.
//!
//! The policy is an ordered list of `(predicate, action)` rules. For a
//! critical alert every matching rule's action is attempted, each on its own:
//! one failing action never stops the ones after it.

use crate::config::AlertConfig;
use crate::notifier::Notifier;
use crate::orchestrator::{Orchestrator, RemedialAction};
use opstool_core::{ActionOutcome, ActionStatus, Alert, ResultStatus, Severity, TaskResult};
use std::sync::Arc;
use tracing::{info, warn};

/// Condition on an alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertPredicate {
    /// Case-insensitive substring of the alert message
    MessageContains(String),
}

impl AlertPredicate {
    pub fn matches(&self, alert: &Alert) -> bool {
        match self {
            AlertPredicate::MessageContains(needle) => alert.mentions(needle),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EscalationRule {
    pub predicate: AlertPredicate,
    pub action: RemedialAction,
}

impl EscalationRule {
    pub fn new(predicate: AlertPredicate, action: RemedialAction) -> Self {
        EscalationRule { predicate, action }
    }
}

/// Standard rules: restart on deployment trouble, scale out on queue overload
pub fn default_rules(config: &AlertConfig) -> Vec<EscalationRule> {
    vec![
        EscalationRule::new(
            AlertPredicate::MessageContains("deployment".to_string()),
            RemedialAction::RestartDeployment {
                deployment: config.restart_deployment.clone(),
                namespace: config.namespace.clone(),
            },
        ),
        EscalationRule::new(
            AlertPredicate::MessageContains("queue".to_string()),
            RemedialAction::ScaleDeployment {
                deployment: config.scale_deployment.clone(),
                namespace: config.namespace.clone(),
                replicas: config.scale_replicas,
            },
        ),
    ]
}

pub struct EscalationPolicy {
    rules: Vec<EscalationRule>,
    notifier: Option<Arc<dyn Notifier>>,
    orchestrator: Arc<dyn Orchestrator>,
}

impl EscalationPolicy {
    pub fn new(
        rules: Vec<EscalationRule>,
        notifier: Option<Arc<dyn Notifier>>,
        orchestrator: Arc<dyn Orchestrator>,
    ) -> Self {
        EscalationPolicy {
            rules,
            notifier,
            orchestrator,
        }
    }

    pub fn rules(&self) -> &[EscalationRule] {
        &self.rules
    }

    /// Actions the rules select for this alert, in rule order
    pub fn matching_actions<'a>(&'a self, alert: &'a Alert) -> impl Iterator<Item = &'a RemedialAction> + 'a {
        self.rules
            .iter()
            .filter(move |rule| rule.predicate.matches(alert))
            .map(|rule| &rule.action)
    }

    /// Send a notification if a channel is configured. Failures are logged
    /// and reported in the outcome only.
    pub async fn notify(&self, alert: &Alert, severity: Severity) -> Option<ActionOutcome> {
        let notifier = self.notifier.as_ref()?;

        let outcome = match notifier.notify(alert, severity).await {
            Ok(()) => ActionOutcome::new("notification", ActionStatus::Sent, None),
            Err(e) => {
                warn!("Failed to send {} notification: {}", severity, e);
                ActionOutcome::new("notification", ActionStatus::Failed, Some(e.to_string()))
            }
        };
        Some(outcome)
    }

    /// Run the escalation procedure for a critical alert.
    ///
    /// Status is `completed` when every remedial action succeeded (or none
    /// matched) and `partial_failure` otherwise. The notification outcome is
    /// listed but never affects the status.
    pub async fn escalate(&self, task_id: &str, alert: &Alert) -> TaskResult {
        warn!(task_id, "Emergency response triggered for: {}", alert.message);

        let mut actions = Vec::new();
        if let Some(outcome) = self.notify(alert, Severity::Critical).await {
            actions.push(outcome);
        }

        let mut remedial_failures = 0;
        for action in self.matching_actions(alert) {
            let outcome = match self.orchestrator.apply(action).await {
                Ok(detail) => {
                    info!(task_id, action = action.name(), "Remedial action succeeded");
                    ActionOutcome::new(action.name(), ActionStatus::Succeeded, Some(detail))
                }
                Err(e) => {
                    warn!(task_id, action = action.name(), "Remedial action failed: {}", e);
                    remedial_failures += 1;
                    ActionOutcome::new(action.name(), ActionStatus::Failed, Some(e.to_string()))
                }
            };
            actions.push(outcome);
        }

        let (status, message) = if remedial_failures == 0 {
            (ResultStatus::Completed, "Emergency response executed".to_string())
        } else {
            (
                ResultStatus::PartialFailure,
                format!("Emergency response executed, {} remedial action(s) failed", remedial_failures),
            )
        };

        let mut result = TaskResult::new(task_id, status).with_message(message);
        result.actions = actions;
        result
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::notifier::NotifyError;
    use crate::orchestrator::OrchestratorError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Records notifications; optionally fails them
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, Severity)>>,
        pub fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, alert: &Alert, severity: Severity) -> Result<(), NotifyError> {
            self.sent.lock().push((alert.message.clone(), severity));
            if self.fail {
                return Err(NotifyError::Status(500));
            }
            Ok(())
        }
    }

    /// Records applied actions; fails the ones named in `failing`
    #[derive(Default)]
    pub struct RecordingOrchestrator {
        pub applied: Mutex<Vec<RemedialAction>>,
        pub failing: Vec<&'static str>,
    }

    #[async_trait]
    impl Orchestrator for RecordingOrchestrator {
        async fn apply(&self, action: &RemedialAction) -> Result<String, OrchestratorError> {
            self.applied.lock().push(action.clone());
            if self.failing.contains(&action.name()) {
                return Err(OrchestratorError::NonZeroExit {
                    code: Some(1),
                    stderr: "forbidden".to_string(),
                });
            }
            Ok("ok".to_string())
        }
    }
}
