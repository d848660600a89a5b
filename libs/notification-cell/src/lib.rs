use std::sync::Arc;

use tracing::info;

use scheduling_cell::effects::EffectDispatcher;
use shared_config::AppConfig;

pub mod models;
pub mod services;

pub use services::fanout::FanoutDispatcher;
pub use services::log::TracingDispatcher;
pub use services::webhook::WebhookDispatcher;

/// Dispatcher for the configured environment: effects are always logged and
/// additionally posted to the webhook when one is set.
pub fn dispatcher_from_config(config: &AppConfig) -> Arc<dyn EffectDispatcher> {
    match WebhookDispatcher::new(config) {
        Ok(webhook) => {
            info!("Posting effects to {}", config.notification_webhook_url);
            Arc::new(FanoutDispatcher::new(vec![
                Arc::new(TracingDispatcher),
                Arc::new(webhook),
            ]))
        }
        Err(_) => Arc::new(TracingDispatcher),
    }
}
