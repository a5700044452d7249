//! Outbound alert notifications.

use async_trait::async_trait;
use opstool_core::{Alert, Severity};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook returned status {0}")]
    Status(u16),
}

/// Sends a human-readable alert notification somewhere
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert, severity: Severity) -> Result<(), NotifyError>;
}

/// Posts a chat-style JSON payload to a webhook URL
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(WebhookNotifier {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &Alert, severity: Severity) -> Result<(), NotifyError> {
        let payload = notification_payload(alert, severity);

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        debug!("Webhook notification delivered ({})", status);
        Ok(())
    }
}

pub fn notification_payload(alert: &Alert, severity: Severity) -> Value {
    let message = if alert.message.is_empty() {
        "Unknown alert"
    } else {
        alert.message.as_str()
    };

    json!({
        "text": format!("{}: {}", severity.notification_prefix(), message),
        "attachments": [{
            "color": severity.color(),
            "fields": [
                {"title": "Severity", "value": severity.as_str(), "short": true},
                {"title": "Timestamp", "value": alert.timestamp_string(), "short": true},
                {"title": "Source", "value": alert.source_or_default(), "short": true},
            ]
        }]
    })
}
