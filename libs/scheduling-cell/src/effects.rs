// libs/scheduling-cell/src/effects.rs
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    #[serde(rename = "notify.created")]
    Created,
    #[serde(rename = "notify.confirmed")]
    Confirmed,
    #[serde(rename = "notify.checked_in")]
    CheckedIn,
    #[serde(rename = "notify.completed")]
    Completed,
    #[serde(rename = "notify.cancelled")]
    Cancelled,
    #[serde(rename = "notify.no_show")]
    NoShow,
    #[serde(rename = "notify.rescheduled")]
    Rescheduled,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Created => "notify.created",
            NotificationKind::Confirmed => "notify.confirmed",
            NotificationKind::CheckedIn => "notify.checked_in",
            NotificationKind::Completed => "notify.completed",
            NotificationKind::Cancelled => "notify.cancelled",
            NotificationKind::NoShow => "notify.no_show",
            NotificationKind::Rescheduled => "notify.rescheduled",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    Customer(Uuid),
    Staff(Uuid),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Info,
    Warning,
}

/// Side effect requested by a committed transition. Effects are data; the
/// caller decides how and when to carry them out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    Notify {
        kind: NotificationKind,
        recipient: Recipient,
        severity: Severity,
        data: Value,
    },
    ReleaseHold {
        appointment_id: Uuid,
        staff_id: Uuid,
        date: NaiveDate,
    },
    RecordCancellation {
        appointment_id: Uuid,
        reason: String,
        late: bool,
    },
    RecordRevenue {
        appointment_id: Uuid,
        amount: i64,
    },
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Notify { kind, .. } => kind.as_str(),
            Effect::ReleaseHold { .. } => "release.hold",
            Effect::RecordCancellation { .. } => "record.cancellation",
            Effect::RecordRevenue { .. } => "record.revenue",
        }
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, Effect::Notify { .. })
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("dispatcher is not configured")]
    NotConfigured,

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("endpoint rejected effects with status {0}")]
    Rejected(u16),
}

/// Notification collaborator consuming effect lists in order.
#[async_trait]
pub trait EffectDispatcher: Send + Sync {
    async fn dispatch(&self, effects: &[Effect]) -> Result<(), DispatchError>;
}

/// Deliver effects on the runtime without holding up the caller. Failures are
/// logged; a committed transition is never rolled back.
pub fn dispatch_in_background(dispatcher: Arc<dyn EffectDispatcher>, effects: Vec<Effect>) {
    if effects.is_empty() {
        return;
    }
    debug!("Dispatching {} effects in background", effects.len());
    tokio::spawn(async move {
        if let Err(e) = dispatcher.dispatch(&effects).await {
            warn!("Effect dispatch failed: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_match_serialized_form() {
        let kinds = [
            NotificationKind::Created,
            NotificationKind::Confirmed,
            NotificationKind::CheckedIn,
            NotificationKind::Completed,
            NotificationKind::Cancelled,
            NotificationKind::NoShow,
            NotificationKind::Rescheduled,
        ];
        for kind in kinds {
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                Value::String(kind.as_str().to_string())
            );
        }
    }
}
