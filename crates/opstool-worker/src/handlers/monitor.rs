use super::TaskHandler;
use async_trait::async_trait;
use opstool_core::{DispatchError, Result, Task, TaskResult};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use sysinfo::{Disks, System};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

/// Local host monitoring: health metrics and log scanning
pub struct MonitorHandler;

#[async_trait]
impl TaskHandler for MonitorHandler {
    async fn handle(&self, task: &Task) -> Result<TaskResult> {
        match task.action() {
            "health_check" => {
                let snapshot = sample_health().await?;
                info!(
                    task_id = %task.id,
                    cpu = snapshot.cpu_usage,
                    memory = snapshot.memory_usage,
                    disk = snapshot.disk_usage,
                    "Health check completed"
                );

                let data = serde_json::to_value(&snapshot)
                    .map_err(|e| DispatchError::HandlerFailure(e.to_string()))?;
                Ok(TaskResult::completed(&task.id, "Health check completed").with_data(data))
            }
            "log_analysis" => analyze_logs(task).await,
            other => Err(DispatchError::UnknownSubAction {
                task_type: "monitor",
                action: other.to_string(),
            }),
        }
    }
}

/// Host utilization, each value a percentage in `0..=100`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
    /// Unix seconds
    pub timestamp: f64,
}

/// Read CPU, memory and root-disk utilization from the OS.
///
/// CPU usage needs two samples; the whole read runs on the blocking pool.
pub async fn sample_health() -> Result<HealthSnapshot> {
    tokio::task::spawn_blocking(|| {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let disks = Disks::new_with_refreshed_list();
        let root = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new("/"))
            .or_else(|| disks.list().iter().max_by_key(|d| d.total_space()));
        let disk_usage = root
            .map(|d| percent(d.total_space().saturating_sub(d.available_space()), d.total_space()))
            .unwrap_or(0.0);

        HealthSnapshot {
            cpu_usage: clamp_percent(sys.global_cpu_usage() as f64),
            memory_usage: percent(sys.used_memory(), sys.total_memory()),
            disk_usage,
            timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        }
    })
    .await
    .map_err(|e| DispatchError::HandlerFailure(format!("Health sampling failed: {}", e)))
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    clamp_percent(used as f64 / total as f64 * 100.0)
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

async fn analyze_logs(task: &Task) -> Result<TaskResult> {
    let Some(path) = task.arg("log_path") else {
        return Ok(TaskResult::completed(&task.id, "Log analysis completed"));
    };

    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| DispatchError::HandlerFailure(format!("Failed to read log file {}: {}", path, e)))?;
    let mut reader = BufReader::new(file);

    let mut lines = 0u64;
    let mut errors = 0u64;
    let mut warnings = 0u64;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| DispatchError::HandlerFailure(format!("Failed to read log file {}: {}", path, e)))?;
        if read == 0 {
            break;
        }

        // Logs are not guaranteed to be UTF-8
        lines += 1;
        let line = String::from_utf8_lossy(&buf).to_lowercase();
        if line.contains("error") {
            errors += 1;
        } else if line.contains("warn") {
            warnings += 1;
        }
    }

    info!(task_id = %task.id, lines, errors, warnings, "Analyzed {}", path);

    Ok(TaskResult::completed(&task.id, "Log analysis completed").with_data(json!({
        "log_path": path,
        "lines": lines,
        "errors": errors,
        "warnings": warnings,
    })))
}
