//! Remedial actions carried out through the container orchestrator CLI.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

/// A remedial action against a named deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemedialAction {
    RestartDeployment { deployment: String, namespace: String },
    ScaleDeployment { deployment: String, namespace: String, replicas: u32 },
}

impl RemedialAction {
    /// Short name used in result records
    pub fn name(&self) -> &'static str {
        match self {
            RemedialAction::RestartDeployment { .. } => "restart_deployment",
            RemedialAction::ScaleDeployment { .. } => "scale_up",
        }
    }

    /// Orchestrator CLI arguments
    pub fn command_args(&self) -> Vec<String> {
        match self {
            RemedialAction::RestartDeployment { deployment, namespace } => vec![
                "rollout".to_string(),
                "restart".to_string(),
                format!("deployment/{}", deployment),
                "-n".to_string(),
                namespace.clone(),
            ],
            RemedialAction::ScaleDeployment { deployment, namespace, replicas } => vec![
                "scale".to_string(),
                format!("deployment/{}", deployment),
                format!("--replicas={}", replicas),
                "-n".to_string(),
                namespace.clone(),
            ],
        }
    }
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("exit code {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("{program} did not finish within {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
}

#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Apply the action; `Ok` carries a short description of what happened
    async fn apply(&self, action: &RemedialAction) -> Result<String, OrchestratorError>;
}

/// Shells out to `kubectl` (or a compatible binary).
///
/// Each call is bounded by `timeout`; the child is killed when it expires.
pub struct CliOrchestrator {
    program: String,
    timeout: Duration,
}

impl CliOrchestrator {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        CliOrchestrator {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Orchestrator for CliOrchestrator {
    async fn apply(&self, action: &RemedialAction) -> Result<String, OrchestratorError> {
        let args = action.command_args();
        info!("Running {} {}", self.program, args.join(" "));

        let running = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, running)
            .await
            .map_err(|_| {
                warn!("{} {} timed out after {:?}", self.program, action.name(), self.timeout);
                OrchestratorError::Timeout {
                    program: self.program.clone(),
                    timeout: self.timeout,
                }
            })?
            .map_err(|source| OrchestratorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            Ok(match action {
                RemedialAction::RestartDeployment { .. } if stdout.is_empty() => "Services restarted".to_string(),
                RemedialAction::ScaleDeployment { replicas, .. } if stdout.is_empty() => {
                    format!("Scaled to {} replicas", replicas)
                }
                _ => stdout,
            })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("{} {} failed: {}", self.program, action.name(), stderr);
            Err(OrchestratorError::NonZeroExit {
                code: output.status.code(),
                stderr,
            })
        }
    }
}
