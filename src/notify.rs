// Notification delivery for moderators and responders

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::NotificationConfig;

/// Who gets told
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Emergency,
    Moderation,
    Support,
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotificationChannel::Emergency => "emergency",
            NotificationChannel::Moderation => "moderation",
            NotificationChannel::Support => "support",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyOutcome {
    pub success: bool,
    pub method: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        channel: NotificationChannel,
        payload: &serde_json::Value,
    ) -> Result<NotifyOutcome>;
}

/// Writes notifications to the tracing log
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        channel: NotificationChannel,
        payload: &serde_json::Value,
    ) -> Result<NotifyOutcome> {
        match channel {
            NotificationChannel::Emergency => {
                tracing::warn!(channel = %channel, payload = %payload, "Emergency notification")
            }
            _ => tracing::info!(channel = %channel, payload = %payload, "Notification"),
        }

        Ok(NotifyOutcome {
            success: true,
            method: "log".to_string(),
        })
    }
}

/// POSTs JSON payloads to per-channel webhooks; channels without a URL log
pub struct WebhookNotifier {
    client: Client,
    config: NotificationConfig,
    fallback: LogNotifier,
}

impl WebhookNotifier {
    pub fn new(config: NotificationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            config,
            fallback: LogNotifier,
        })
    }

    fn url_for(&self, channel: NotificationChannel) -> Option<&str> {
        match channel {
            NotificationChannel::Emergency => self.config.emergency_webhook.as_deref(),
            NotificationChannel::Moderation => self.config.moderation_webhook.as_deref(),
            NotificationChannel::Support => self.config.support_webhook.as_deref(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        channel: NotificationChannel,
        payload: &serde_json::Value,
    ) -> Result<NotifyOutcome> {
        let Some(url) = self.url_for(channel) else {
            return self.fallback.notify(channel, payload).await;
        };

        let body = serde_json::json!({
            "channel": channel,
            "payload": payload,
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to deliver {} notification", channel))?;

        let success = response.status().is_success();
        if !success {
            tracing::warn!(
                channel = %channel,
                status = %response.status(),
                "Webhook rejected notification"
            );
        }

        Ok(NotifyOutcome {
            success,
            method: "webhook".to_string(),
        })
    }
}

/// Build the notifier described by config
pub fn create_notifier(config: &NotificationConfig) -> Result<Arc<dyn Notifier>> {
    let any_webhook = config.emergency_webhook.is_some()
        || config.moderation_webhook.is_some()
        || config.support_webhook.is_some();

    if any_webhook {
        Ok(Arc::new(WebhookNotifier::new(config.clone())?))
    } else {
        Ok(Arc::new(LogNotifier))
    }
}
