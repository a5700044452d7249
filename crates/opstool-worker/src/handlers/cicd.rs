use super::TaskHandler;
use async_trait::async_trait;
use opstool_core::{DispatchError, Result, ResultStatus, Task, TaskResult};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Runs the task's script as a child process.
///
/// `args` are layered over the worker's own environment. The child is
/// spawned with kill-on-drop, so abandoning the handler future (budget
/// expiry) kills the process.
pub struct CicdHandler {
    interpreter: Option<String>,
    budget: Duration,
}

impl CicdHandler {
    pub fn new(interpreter: Option<String>, budget: Duration) -> Self {
        CicdHandler { interpreter, budget }
    }

    fn command(&self, script: &str) -> Command {
        match &self.interpreter {
            Some(interpreter) => {
                let mut command = Command::new(interpreter);
                command.arg(script);
                command
            }
            None => Command::new(script),
        }
    }
}

#[async_trait]
impl TaskHandler for CicdHandler {
    async fn handle(&self, task: &Task) -> Result<TaskResult> {
        let script = task.script().ok_or(DispatchError::MissingField("script"))?;

        info!(task_id = %task.id, "Running script {}", script);

        let output = self
            .command(script)
            .envs(&task.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DispatchError::HandlerFailure(format!("Failed to start {}: {}", script, e)))?;

        // Killed by a signal: no exit code
        let return_code = output.status.code().unwrap_or(-1);
        debug!(task_id = %task.id, return_code, "Script finished");

        let mut result = if return_code == 0 {
            TaskResult::new(&task.id, ResultStatus::Completed)
        } else {
            TaskResult::new(&task.id, ResultStatus::Failed)
                .with_message(format!("Script exited with code {}", return_code))
        };
        result.stdout = Some(String::from_utf8_lossy(&output.stdout).into_owned());
        result.stderr = Some(String::from_utf8_lossy(&output.stderr).into_owned());
        result.return_code = Some(return_code);

        Ok(result)
    }

    fn budget(&self) -> Option<Duration> {
        Some(self.budget)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Write;

    fn script(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".sh").tempfile().unwrap();
        write!(file, "{}", body).unwrap();
        file
    }

    fn handler() -> CicdHandler {
        CicdHandler::new(Some("sh".to_string()), Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_zero_exit_completes() {
        let file = script("echo \"deploying $APP_NAME\"\n");
        let task = Task::new("c1", "cicd")
            .with_script(file.path().to_str().unwrap())
            .with_arg("APP_NAME", "billing");

        let result = handler().handle(&task).await.unwrap();

        assert_eq!(result.status, ResultStatus::Completed);
        assert_eq!(result.return_code, Some(0));
        assert_eq!(result.stdout.as_deref(), Some("deploying billing\n"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails() {
        let file = script("echo boom >&2\nexit 3\n");
        let task = Task::new("c2", "cicd").with_script(file.path().to_str().unwrap());

        let result = handler().handle(&task).await.unwrap();

        assert_eq!(result.status, ResultStatus::Failed);
        assert_eq!(result.return_code, Some(3));
        assert_eq!(result.stderr.as_deref(), Some("boom\n"));
        assert_eq!(result.message.as_deref(), Some("Script exited with code 3"));
    }

    #[tokio::test]
    async fn test_missing_script() {
        let err = handler().handle(&Task::new("c3", "cicd")).await.unwrap_err();
        assert_eq!(err.to_string(), "No script specified");

        let blank = Task::new("c4", "cicd").with_script("  ");
        assert!(matches!(
            handler().handle(&blank).await,
            Err(DispatchError::MissingField("script"))
        ));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let direct = CicdHandler::new(None, Duration::from_secs(1));
        let task = Task::new("c5", "cicd").with_script("/nonexistent/deploy.sh");

        let err = direct.handle(&task).await.unwrap_err();
        assert!(matches!(err, DispatchError::HandlerFailure(_)));
        assert!(err.to_string().contains("/nonexistent/deploy.sh"));
    }
}
