//! HTTP webhook delivery for execution alerts

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use super::types::AlertPayload;
use crate::common::errors::{CoreError, Result};
use crate::common::traits::AlertSink;
use crate::config::WebhookConfig;

/// POSTs alert payloads as JSON to a fixed URL
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    /// Create a sink with a 10 second request timeout
    pub fn new(url: &str) -> Result<Self> {
        Self::with_timeout(url, Duration::from_secs(10))
    }

    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Build a sink from configuration, `None` when no URL is set
    pub fn from_config(config: &WebhookConfig) -> Result<Option<Self>> {
        match config.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(Some(Self::with_timeout(
                url,
                Duration::from_secs(config.timeout_seconds),
            )?)),
            _ => Ok(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    #[instrument(skip(self, payload), fields(alert_type = %payload.alert_type))]
    async fn send(&self, payload: &AlertPayload) -> Result<()> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Webhook {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), "Alert delivered to webhook");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
