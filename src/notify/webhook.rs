use super::{Notifier, NotifyError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Group-chat robot webhook taking markdown messages
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
    debug_mode: bool,
}

#[derive(Debug, Deserialize)]
struct WebhookReply {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: &str, debug_mode: bool) -> Self {
        if debug_mode {
            tracing::warn!("Webhook notifier running in debug mode, messages are only logged");
        }

        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            webhook_url: webhook_url.to_string(),
            debug_mode,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn escalate(&self, message: &str) -> Result<(), NotifyError> {
        if self.debug_mode {
            let preview: String = message.chars().take(100).collect();
            tracing::info!("Debug mode: would send webhook message: {}", preview);
            return Ok(());
        }

        let payload = json!({
            "msgtype": "markdown",
            "markdown": { "content": message },
        });

        let reply: WebhookReply = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::info!("Webhook delivered: {}, {}", reply.errcode, reply.errmsg);

        if reply.errcode != 0 {
            return Err(NotifyError::Rejected {
                code: reply.errcode,
                message: reply.errmsg,
            });
        }

        Ok(())
    }
}
