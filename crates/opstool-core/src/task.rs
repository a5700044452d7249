use crate::{DispatchError, Result, Severity};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Producer-assigned task identifier
pub type TaskId = String;

/// Id reported for tasks that arrive without one
pub const UNKNOWN_TASK_ID: &str = "unknown";

/// Closed set of task types the worker knows how to handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    /// Run an external CI/CD script
    Cicd,
    /// Version-control operation
    Vcs,
    /// Local host monitoring
    Monitor,
    /// React to an alert
    AlertResponse,
}

impl TaskType {
    pub const ALL: [TaskType; 4] = [
        TaskType::Cicd,
        TaskType::Vcs,
        TaskType::Monitor,
        TaskType::AlertResponse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Cicd => "cicd",
            TaskType::Vcs => "vcs",
            TaskType::Monitor => "monitor",
            TaskType::AlertResponse => "alert_response",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "cicd" => Some(TaskType::Cicd),
            "vcs" => Some(TaskType::Vcs),
            "monitor" => Some(TaskType::Monitor),
            "alert_response" => Some(TaskType::AlertResponse),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work as it travels through the input queue.
///
/// The `type` tag is kept as the raw string so that an unrecognized value
/// still decodes and can be reported back instead of being dropped. It is
/// resolved into a [`TaskType`] at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default = "unknown_task_id", deserialize_with = "id_or_sentinel")]
    pub id: TaskId,

    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub task_type: String,

    /// Executable path, `cicd` only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    /// Environment overrides or handler parameters (`action`, ...)
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub args: HashMap<String, String>,

    /// Embedded alert, `alert_response` only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, task_type: impl Into<String>) -> Self {
        Task {
            id: id.into(),
            task_type: task_type.into(),
            script: None,
            args: HashMap::new(),
            alert: None,
        }
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn with_alert(mut self, alert: Alert) -> Self {
        self.alert = Some(alert);
        self
    }

    /// Resolve the type tag
    pub fn kind(&self) -> Result<TaskType> {
        TaskType::from_str(&self.task_type)
            .ok_or_else(|| DispatchError::UnknownType(self.task_type.clone()))
    }

    /// Script path, treating an empty string as absent
    pub fn script(&self) -> Option<&str> {
        self.script.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }

    /// Sub-operation selector for `vcs` and `monitor` tasks
    pub fn action(&self) -> &str {
        self.arg("action").unwrap_or_default()
    }
}

/// An event signal embedded in `alert_response` tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default = "default_severity", deserialize_with = "severity_or_info")]
    pub severity: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,

    /// Producer metadata carried through untouched (`id`, `type`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Alert {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Alert {
            severity: severity.as_str().to_string(),
            message: message.into(),
            timestamp: None,
            source: None,
            extra: Map::new(),
        }
    }

    /// Parsed severity, `None` when the producer sent something unrecognized
    pub fn level(&self) -> Option<Severity> {
        Severity::parse(&self.severity)
    }

    /// Case-insensitive substring match on the message
    pub fn mentions(&self, needle: &str) -> bool {
        self.message.to_lowercase().contains(&needle.to_lowercase())
    }

    pub fn source_or_default(&self) -> String {
        match &self.source {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "OPSTOOL".to_string(),
        }
    }

    pub fn timestamp_string(&self) -> String {
        match &self.timestamp {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

impl Default for Alert {
    fn default() -> Self {
        Alert::new(Severity::Info, "")
    }
}

fn unknown_task_id() -> TaskId {
    UNKNOWN_TASK_ID.to_string()
}

fn default_severity() -> String {
    Severity::Info.as_str().to_string()
}

fn id_or_sentinel<'de, D>(deserializer: D) -> std::result::Result<TaskId, D::Error>
where
    D: Deserializer<'de>,
{
    let id = Option::<String>::deserialize(deserializer)?;
    Ok(id.filter(|s| !s.is_empty()).unwrap_or_else(unknown_task_id))
}

fn severity_or_info<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_severity))
}

/// Producers written in Go encode empty maps and strings as `null`
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_names() {
        for kind in TaskType::ALL {
            assert_eq!(TaskType::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(TaskType::from_str("bogus"), None);
        assert_eq!(TaskType::from_str("CICD"), None);
    }

    #[test]
    fn test_decode_producer_shape() {
        let json = r#"{
            "id": "abc",
            "name": "nightly deploy",
            "type": "cicd",
            "script": "scripts/cicd/k8s_deploy.py",
            "schedule": "0 2 * * *",
            "args": {"ACTION": "deploy"},
            "status": "pending",
            "created": "2024-01-01T00:00:00Z"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();

        assert_eq!(task.id, "abc");
        assert_eq!(task.kind().unwrap(), TaskType::Cicd);
        assert_eq!(task.script(), Some("scripts/cicd/k8s_deploy.py"));
        assert_eq!(task.arg("ACTION"), Some("deploy"));
    }

    #[test]
    fn test_decode_nulls_and_missing_fields() {
        let task: Task = serde_json::from_str(r#"{"type": "vcs", "args": null, "script": ""}"#).unwrap();

        assert_eq!(task.id, UNKNOWN_TASK_ID);
        assert!(task.args.is_empty());
        assert_eq!(task.script(), None);
        assert_eq!(task.action(), "");
    }

    #[test]
    fn test_unknown_type_is_an_error_not_a_panic() {
        let task = Task::new("t2", "bogus");
        match task.kind() {
            Err(DispatchError::UnknownType(name)) => assert_eq!(name, "bogus"),
            other => panic!("Expected UnknownType, got {:?}", other),
        }
    }

    #[test]
    fn test_alert_defaults_and_passthrough() {
        let json = r#"{"id": "a1", "type": "disk_full", "message": "Disk at 97%", "timestamp": 1700000000.5}"#;
        let alert: Alert = serde_json::from_str(json).unwrap();

        assert_eq!(alert.level(), Some(Severity::Info));
        assert_eq!(alert.extra.get("type"), Some(&Value::from("disk_full")));
        assert_eq!(alert.timestamp_string(), "1700000000.5");
        assert_eq!(alert.source_or_default(), "OPSTOOL");

        let back = serde_json::to_value(&alert).unwrap();
        assert_eq!(back["id"], "a1");
        assert_eq!(back["type"], "disk_full");
    }

    #[test]
    fn test_alert_mentions_is_case_insensitive() {
        let alert = Alert::new(Severity::Critical, "Deployment FAILED, Queue backing up");
        assert!(alert.mentions("deployment"));
        assert!(alert.mentions("queue"));
        assert!(!alert.mentions("disk"));
    }
}
