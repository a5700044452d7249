use crate::handlers::HandlerRegistry;
use opstool_core::{DispatchError, Task, TaskResult};
use std::any::Any;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Runs one task through its handler under the handler's execution budget
pub struct TaskExecutor {
    registry: Arc<HandlerRegistry>,
}

impl TaskExecutor {
    pub fn new(registry: HandlerRegistry) -> Self {
        TaskExecutor {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Execute a task and always produce a result for it.
    ///
    /// The handler runs on its own tokio task so a panic is caught here
    /// instead of unwinding the dispatch loop. When the budget runs out the
    /// handler task is aborted and awaited; dropping it kills any child
    /// process it spawned.
    pub async fn execute(&self, task: &Task) -> TaskResult {
        let task_id = task.id.clone();

        let kind = match task.kind() {
            Ok(kind) => kind,
            Err(e) => {
                warn!(task_id = %task_id, "{}", e);
                return TaskResult::from_error(task_id, &e);
            }
        };

        let budget = self.registry.get(kind).budget();
        match budget {
            Some(budget) => info!(task_id = %task_id, task_type = %kind, "Executing task with timeout {:?}", budget),
            None => info!(task_id = %task_id, task_type = %kind, "Executing task"),
        }

        let registry = self.registry.clone();
        let owned = task.clone();
        let mut handle = tokio::spawn(async move { registry.get(kind).handle(&owned).await });
        debug!(task_id = %task_id, "HANDLER_RUNNING");

        let joined = match budget {
            Some(budget) => match timeout(budget, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    let _ = handle.await;
                    error!(task_id = %task_id, "Task timed out after {:?}", budget);
                    return TaskResult::from_error(task_id, &DispatchError::HandlerTimeout(budget));
                }
            },
            None => handle.await,
        };

        let mut result = match joined {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!(task_id = %task_id, "Task failed: {}", e);
                TaskResult::from_error(task_id.clone(), &e)
            }
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                error!(task_id = %task_id, "Task panicked: {}", message);
                TaskResult::error(task_id.clone(), format!("Handler panicked: {}", message))
            }
            Err(_) => TaskResult::error(task_id.clone(), "Handler was cancelled"),
        };

        result.task_id = task_id;
        result.ensure_message();
        result
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::registry;
    use opstool_core::ResultStatus;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_executor_success() {
        let (registry, _) = registry(Duration::from_secs(5));
        let executor = TaskExecutor::new(registry);

        let task = Task::new("m1", "monitor").with_arg("action", "log_analysis");
        let result = executor.execute(&task).await;

        assert_eq!(result.task_id, "m1");
        assert_eq!(result.status, ResultStatus::Completed);
    }

    #[tokio::test]
    async fn test_executor_errors_become_results() {
        let (registry, _) = registry(Duration::from_secs(5));
        let executor = TaskExecutor::new(registry);

        let unknown = executor.execute(&Task::new("t2", "bogus")).await;
        assert_eq!(unknown.status, ResultStatus::Error);
        assert_eq!(unknown.message.as_deref(), Some("Unknown task type: bogus"));

        let no_script = executor.execute(&Task::new("c", "cicd")).await;
        assert_eq!(no_script.task_id, "c");
        assert_eq!(no_script.status, ResultStatus::Error);
        assert_eq!(no_script.message.as_deref(), Some("No script specified"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_executor_timeout_kills_script() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let mut script = tempfile::NamedTempFile::new_in(dir.path()).unwrap();
        write!(script, "sleep 2\ntouch \"$MARKER\"\n").unwrap();

        let (registry, _) = registry(Duration::from_millis(300));
        let executor = TaskExecutor::new(registry);

        let task = Task::new("slow", "cicd")
            .with_script(script.path().to_str().unwrap())
            .with_arg("MARKER", marker.to_str().unwrap());

        let started = Instant::now();
        let result = executor.execute(&task).await;

        assert_eq!(result.task_id, "slow");
        assert_eq!(result.status, ResultStatus::Timeout);
        assert!(result.message.unwrap().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(2));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!marker.exists(), "script kept running after the budget expired");
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7u8)), "unknown panic");
    }
}
