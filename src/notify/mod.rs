//! Escalation notifications
//!
//! The retry controller calls a `Notifier` once when a request has exhausted
//! its attempts. Notification failures are logged by the caller and never
//! abort a harvest.

mod webhook;

pub use webhook::WebhookNotifier;

use crate::config::NotificationConfig;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Alert sent when retries for a unit of work are exhausted
pub const ESCALATION_MESSAGE: &str =
    "### Harvest error\nRequests keep failing after all retries, please check the session.\n";

/// Errors that can occur while delivering a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook rejected message: errcode {code}, {message}")]
    Rejected { code: i64, message: String },
}

/// Outbound alert channel
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn escalate(&self, message: &str) -> Result<(), NotifyError>;
}

/// Notifier that only writes the alert to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn escalate(&self, message: &str) -> Result<(), NotifyError> {
        tracing::error!("Escalation: {}", message);
        Ok(())
    }
}

/// Builds the notifier described by the configuration
pub fn build_notifier(config: &NotificationConfig) -> Arc<dyn Notifier> {
    match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url, config.debug_mode)),
        None => Arc::new(LogNotifier),
    }
}
