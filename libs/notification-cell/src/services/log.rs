// libs/notification-cell/src/services/log.rs
use async_trait::async_trait;
use tracing::info;

use scheduling_cell::effects::{DispatchError, Effect, EffectDispatcher};

/// Writes every effect to the log. Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDispatcher;

#[async_trait]
impl EffectDispatcher for TracingDispatcher {
    async fn dispatch(&self, effects: &[Effect]) -> Result<(), DispatchError> {
        for effect in effects {
            match effect {
                Effect::Notify {
                    kind,
                    recipient,
                    severity,
                    ..
                } => info!("{} -> {:?} ({:?})", kind, recipient, severity),
                Effect::ReleaseHold {
                    appointment_id,
                    staff_id,
                    date,
                } => info!("release.hold {} for staff {} on {}", appointment_id, staff_id, date),
                Effect::RecordCancellation {
                    appointment_id,
                    reason,
                    late,
                } => info!("record.cancellation {} late={} reason={}", appointment_id, late, reason),
                Effect::RecordRevenue {
                    appointment_id,
                    amount,
                } => info!("record.revenue {} amount={}", appointment_id, amount),
            }
        }
        Ok(())
    }
}
