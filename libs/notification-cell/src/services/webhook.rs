// libs/notification-cell/src/services/webhook.rs
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info};

use scheduling_cell::effects::{DispatchError, Effect, EffectDispatcher};
use shared_config::AppConfig;

use crate::models::WebhookPayload;

/// Posts effect lists as JSON to an external notification endpoint.
#[derive(Debug)]
pub struct WebhookDispatcher {
    client: Client,
    url: String,
}

impl WebhookDispatcher {
    pub fn new(config: &AppConfig) -> Result<Self, DispatchError> {
        if !config.is_webhook_configured() {
            return Err(DispatchError::NotConfigured);
        }

        Ok(Self::with_url(config.notification_webhook_url.clone()))
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl EffectDispatcher for WebhookDispatcher {
    async fn dispatch(&self, effects: &[Effect]) -> Result<(), DispatchError> {
        if effects.is_empty() {
            return Ok(());
        }

        let payload = WebhookPayload::new(effects);
        debug!("Posting {} effects to {} (delivery {})", effects.len(), self.url, payload.delivery_id);

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DispatchError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            error!("Notification webhook rejected delivery {}: {}", payload.delivery_id, status);
            return Err(DispatchError::Rejected(status.as_u16()));
        }

        info!("Delivered {} effects ({})", effects.len(), payload.delivery_id);
        Ok(())
    }
}
