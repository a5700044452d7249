use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub worker_id: Option<String>,
    pub queue: QueueConfig,
    pub execution: ExecutionConfig,
    pub delivery: DeliveryConfig,
    pub alerts: AlertConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub redis_url: String,
    pub task_queue: String,
    pub result_queue: String,
    pub poll_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Wall-clock budget for subprocess-backed (`cicd`) tasks
    pub cicd_timeout_secs: u64,
    /// Program used to run scripts, e.g. `python3`. Scripts are executed
    /// directly when unset.
    pub interpreter: Option<String>,
}

/// What to do when a result cannot be pushed to the output queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Extra push attempts after the first one fails (0 = best-effort)
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub webhook_url: Option<String>,
    pub webhook_timeout_secs: u64,
    pub orchestrator_bin: String,
    /// Upper bound for one orchestrator command
    pub action_timeout_secs: u64,
    pub namespace: String,
    pub restart_deployment: String,
    pub scale_deployment: String,
    pub scale_replicas: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            task_queue: opstool_client::TASK_QUEUE.to_string(),
            result_queue: opstool_client::RESULT_QUEUE.to_string(),
            poll_timeout_secs: 5,
            connect_timeout_secs: 5,
            reconnect_base_delay_ms: 500,
            reconnect_max_delay_ms: 30_000,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            cicd_timeout_secs: 300,
            interpreter: None,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        DeliveryConfig {
            max_retries: 0,
            retry_delay_ms: 250,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        AlertConfig {
            webhook_url: None,
            webhook_timeout_secs: 10,
            orchestrator_bin: "kubectl".to_string(),
            action_timeout_secs: 60,
            namespace: "opstool".to_string(),
            restart_deployment: "opstool-server".to_string(),
            scale_deployment: "opstool-worker".to_string(),
            scale_replicas: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl WorkerConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: WorkerConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    pub fn generate_worker_id(&self) -> String {
        use std::process;
        use uuid::Uuid;

        if let Some(id) = &self.worker_id {
            return id.clone();
        }

        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        let pid = process::id();
        let random = Uuid::new_v4().simple().to_string();

        format!("{}-{}-{}", hostname, pid, &random[..8])
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.queue.poll_timeout_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.queue.connect_timeout_secs.max(1))
    }

    pub fn cicd_budget(&self) -> Duration {
        Duration::from_secs(self.execution.cicd_timeout_secs)
    }
}

/// Build a redis URL from the `REDIS_HOST` / `REDIS_PORT` / `REDIS_PASSWORD`
/// variables older deployments set. `None` when `REDIS_HOST` is unset.
pub fn redis_url_from_env() -> Option<String> {
    let host = std::env::var("REDIS_HOST").ok().filter(|h| !h.is_empty())?;
    let port = std::env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
    let password = std::env::var("REDIS_PASSWORD").unwrap_or_default();

    Some(redis_url(&host, &port, &password))
}

fn redis_url(host: &str, port: &str, password: &str) -> String {
    if password.is_empty() {
        format!("redis://{}:{}", host, port)
    } else {
        format!("redis://:{}@{}:{}", password, host, port)
    }
}
