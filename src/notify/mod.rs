//! Operator alerts for failed database backups.

use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;
use std::time::Duration;

use crate::config::NotificationConfig;
use crate::errors::{BackupError, Result};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_failure(&self, database: &str, message: &str) -> Result<()>;
}

pub fn failure_subject(database: &str) -> String {
    format!("Backup failed for database {}", database)
}

#[derive(Debug, Serialize)]
struct EmailMessage<'a> {
    from: &'a str,
    to: &'a [String],
    subject: String,
    text: String,
}

/// Sends alerts through an HTTP email API (JSON body, bearer token).
pub struct EmailApiNotifier {
    client: reqwest::Client,
    config: NotificationConfig,
}

impl EmailApiNotifier {
    pub fn new(config: NotificationConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackupError::Notify(format!("failed to build HTTP client: {}", e)))?;
        Ok(EmailApiNotifier { client, config })
    }
}

#[async_trait]
impl Notifier for EmailApiNotifier {
    async fn notify_failure(&self, database: &str, message: &str) -> Result<()> {
        let body = EmailMessage {
            from: &self.config.sender,
            to: &self.config.recipients,
            subject: failure_subject(database),
            text: format!(
                "The backup of database '{}' failed on {}.\n\n{}",
                database,
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S %Z"),
                message
            ),
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackupError::Notify(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackupError::Notify(format!(
                "email API answered {}: {}",
                status,
                detail.trim()
            )));
        }

        info!(
            "[{}] Failure alert sent to {}",
            database,
            self.config.recipients.join(", ")
        );
        Ok(())
    }
}

/// Used when no notification transport is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_failure(&self, database: &str, message: &str) -> Result<()> {
        warn!("{} (no notification transport configured): {}", failure_subject(database), message);
        Ok(())
    }
}
