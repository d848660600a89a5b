// libs/notification-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scheduling_cell::effects::Effect;

/// Body POSTed to the notification webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub delivery_id: Uuid,
    pub sent_at: DateTime<Utc>,
    pub effects: Vec<Effect>,
}

impl WebhookPayload {
    pub fn new(effects: &[Effect]) -> Self {
        Self {
            delivery_id: Uuid::new_v4(),
            sent_at: Utc::now(),
            effects: effects.to_vec(),
        }
    }
}
