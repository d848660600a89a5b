// libs/scheduling-cell/src/services/lifecycle.rs
use chrono::{Duration, NaiveDateTime};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::effects::{Effect, NotificationKind, Recipient, Severity};
use crate::error::SchedulingError;
use crate::models::{
    Appointment, AppointmentStatus, AppointmentTotals, AppointmentTrigger, AuditStamp,
    StatusChange, TransitionPayload,
};
use crate::policy::SchedulingPolicy;
use crate::services::pricing::PricingService;

/// A validated status change, not yet applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub trigger: AppointmentTrigger,
    pub from: AppointmentStatus,
    pub to: AppointmentStatus,
    pub at: NaiveDateTime,
    pub actor: Uuid,
    pub changed: bool,
    pub cancellation_reason: Option<String>,
    pub totals: Option<AppointmentTotals>,
    pub notes: Option<String>,
    pub effects: Vec<Effect>,
}

/// Appointment after a transition together with what it asks the outside world to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub appointment: Appointment,
    pub effects: Vec<Effect>,
    pub changed: bool,
}

/// The appointment status graph. Pure: it never touches storage or the clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentStateMachine;

impl AppointmentStateMachine {
    pub fn new() -> Self {
        Self
    }

    /// Status a trigger leads to.
    pub fn target_status(&self, trigger: AppointmentTrigger) -> AppointmentStatus {
        match trigger {
            AppointmentTrigger::Create => AppointmentStatus::Pending,
            AppointmentTrigger::Submit => AppointmentStatus::Pending,
            AppointmentTrigger::Confirm => AppointmentStatus::Confirmed,
            AppointmentTrigger::CheckIn => AppointmentStatus::CheckedIn,
            AppointmentTrigger::StartService => AppointmentStatus::InProgress,
            AppointmentTrigger::Complete => AppointmentStatus::Completed,
            AppointmentTrigger::Cancel => AppointmentStatus::Cancelled,
            AppointmentTrigger::MarkNoShow => AppointmentStatus::NoShow,
            AppointmentTrigger::Reschedule => AppointmentStatus::Rescheduled,
        }
    }

    /// Statuses a trigger may fire from.
    pub fn allowed_sources(&self, trigger: AppointmentTrigger) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match trigger {
            AppointmentTrigger::Create => &[],
            AppointmentTrigger::Submit => &[Draft],
            AppointmentTrigger::Confirm => &[Pending],
            AppointmentTrigger::CheckIn => &[Confirmed],
            AppointmentTrigger::StartService => &[Confirmed, CheckedIn],
            AppointmentTrigger::Complete => &[Confirmed, CheckedIn, InProgress],
            AppointmentTrigger::Cancel | AppointmentTrigger::Reschedule => {
                &[Draft, Pending, Confirmed, CheckedIn, InProgress]
            }
            AppointmentTrigger::MarkNoShow => &[Confirmed, CheckedIn],
        }
    }

    /// Triggers that can currently fire from `status`.
    pub fn get_valid_transitions(&self, status: AppointmentStatus) -> Vec<AppointmentTrigger> {
        [
            AppointmentTrigger::Submit,
            AppointmentTrigger::Confirm,
            AppointmentTrigger::CheckIn,
            AppointmentTrigger::StartService,
            AppointmentTrigger::Complete,
            AppointmentTrigger::Cancel,
            AppointmentTrigger::MarkNoShow,
            AppointmentTrigger::Reschedule,
        ]
        .into_iter()
        .filter(|trigger| self.allowed_sources(*trigger).contains(&status))
        .collect()
    }

    /// Validate `trigger` against the current state and work out its effects.
    pub fn plan(
        &self,
        appointment: &Appointment,
        trigger: AppointmentTrigger,
        payload: &TransitionPayload,
        now: NaiveDateTime,
        actor: Uuid,
        policy: &SchedulingPolicy,
    ) -> Result<TransitionPlan, SchedulingError> {
        let current = appointment.status;
        debug!("Planning {} for appointment {} in status {}", trigger, appointment.id, current);

        if matches!(trigger, AppointmentTrigger::Create | AppointmentTrigger::Reschedule) {
            return Err(SchedulingError::invalid_transition(
                current,
                trigger,
                "handled by booking and rescheduling",
            ));
        }

        let target = self.target_status(trigger);
        let at = appointment.updated_at.max(now);

        if current == target {
            debug!("Appointment {} already {}, nothing to do", appointment.id, target);
            return Ok(TransitionPlan {
                trigger,
                from: current,
                to: target,
                at: appointment.updated_at,
                actor,
                changed: false,
                cancellation_reason: None,
                totals: None,
                notes: None,
                effects: Vec::new(),
            });
        }

        if current == AppointmentStatus::Rescheduled {
            let successor = appointment
                .rescheduled_to
                .map(|id| id.to_string())
                .unwrap_or_else(|| "a new appointment".to_string());
            return Err(SchedulingError::invalid_transition(
                current,
                trigger,
                format!("appointment was superseded by {}", successor),
            ));
        }

        if current.is_terminal() {
            warn!("Rejected {} on closed appointment {}", trigger, appointment.id);
            return Err(SchedulingError::invalid_transition(
                current,
                trigger,
                "appointment is closed",
            ));
        }

        if !self.allowed_sources(trigger).contains(&current) {
            return Err(SchedulingError::invalid_transition(
                current,
                trigger,
                format!("not allowed from {}", current),
            ));
        }

        let mut plan = TransitionPlan {
            trigger,
            from: current,
            to: target,
            at,
            actor,
            changed: true,
            cancellation_reason: None,
            totals: None,
            notes: payload.notes.clone(),
            effects: Vec::new(),
        };

        match trigger {
            AppointmentTrigger::Submit | AppointmentTrigger::StartService => {}
            AppointmentTrigger::Confirm => {
                plan.effects.push(self.notify(
                    appointment,
                    NotificationKind::Confirmed,
                    Recipient::Customer(appointment.customer_id),
                    Severity::Info,
                ));
            }
            AppointmentTrigger::CheckIn => {
                if now.date() != appointment.date {
                    return Err(SchedulingError::invalid_transition(
                        current,
                        trigger,
                        format!("check-in is only possible on {}", appointment.date),
                    ));
                }
                plan.effects.push(self.notify(
                    appointment,
                    NotificationKind::CheckedIn,
                    Recipient::Staff(appointment.staff_id),
                    Severity::Info,
                ));
            }
            AppointmentTrigger::Complete => {
                let pricing = PricingService::new(policy.tax_rate_bps);
                let totals = pricing.finalize(&appointment.totals, payload.tip.unwrap_or(0))?;
                plan.effects.push(self.release_hold(appointment));
                plan.effects.push(Effect::RecordRevenue {
                    appointment_id: appointment.id,
                    amount: totals.total,
                });
                plan.effects.push(self.notify(
                    appointment,
                    NotificationKind::Completed,
                    Recipient::Customer(appointment.customer_id),
                    Severity::Info,
                ));
                plan.totals = Some(totals);
            }
            AppointmentTrigger::Cancel => {
                let reason = payload
                    .reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| {
                        SchedulingError::Validation("a cancellation reason is required".to_string())
                    })?
                    .to_string();
                let notice = Duration::hours(policy.min_cancellation_notice_hours as i64);
                let late = now + notice > appointment.starts_at();
                if late {
                    info!("Late cancellation of appointment {}", appointment.id);
                }

                plan.effects.push(self.release_hold(appointment));
                plan.effects.push(Effect::RecordCancellation {
                    appointment_id: appointment.id,
                    reason: reason.clone(),
                    late,
                });
                plan.effects.push(self.notify(
                    appointment,
                    NotificationKind::Cancelled,
                    Recipient::Customer(appointment.customer_id),
                    if late { Severity::Warning } else { Severity::Info },
                ));
                plan.cancellation_reason = Some(reason);
            }
            AppointmentTrigger::MarkNoShow => {
                if now < appointment.starts_at() {
                    return Err(SchedulingError::invalid_transition(
                        current,
                        trigger,
                        format!("appointment has not started yet (starts {})", appointment.starts_at()),
                    ));
                }
                plan.effects.push(self.release_hold(appointment));
                plan.effects.push(self.notify(
                    appointment,
                    NotificationKind::NoShow,
                    Recipient::Customer(appointment.customer_id),
                    Severity::Info,
                ));
            }
            AppointmentTrigger::Create | AppointmentTrigger::Reschedule => {}
        }

        Ok(plan)
    }

    /// Apply a plan to a copy of the appointment.
    pub fn apply(&self, appointment: &Appointment, plan: TransitionPlan) -> Transition {
        if !plan.changed {
            return Transition {
                appointment: appointment.clone(),
                effects: Vec::new(),
                changed: false,
            };
        }

        let mut updated = appointment.clone();
        let stamp = AuditStamp {
            at: plan.at,
            by: plan.actor,
        };

        updated.status = plan.to;
        updated.updated_at = plan.at;
        updated.status_history.push(StatusChange {
            from: Some(plan.from),
            to: plan.to,
            trigger: plan.trigger,
            at: plan.at,
            by: plan.actor,
        });

        match plan.to {
            AppointmentStatus::CheckedIn => updated.checked_in = Some(stamp),
            AppointmentStatus::InProgress => updated.started = Some(stamp),
            AppointmentStatus::Completed => updated.completed = Some(stamp),
            AppointmentStatus::Cancelled => updated.cancelled = Some(stamp),
            AppointmentStatus::NoShow => updated.no_show = Some(stamp),
            _ => {}
        }
        if let Some(reason) = plan.cancellation_reason {
            updated.cancellation_reason = Some(reason);
        }
        if let Some(totals) = plan.totals {
            updated.totals = totals;
        }
        if let Some(notes) = plan.notes {
            updated.notes = Some(notes);
        }

        info!("Appointment {} moved {} -> {}", updated.id, plan.from, plan.to);

        Transition {
            appointment: updated,
            effects: plan.effects,
            changed: true,
        }
    }

    /// Plan and apply in one step.
    pub fn transition(
        &self,
        appointment: &Appointment,
        trigger: AppointmentTrigger,
        payload: &TransitionPayload,
        now: NaiveDateTime,
        actor: Uuid,
        policy: &SchedulingPolicy,
    ) -> Result<Transition, SchedulingError> {
        let plan = self.plan(appointment, trigger, payload, now, actor, policy)?;
        Ok(self.apply(appointment, plan))
    }

    pub fn creation_effects(&self, appointment: &Appointment) -> Vec<Effect> {
        vec![
            self.notify(
                appointment,
                NotificationKind::Created,
                Recipient::Customer(appointment.customer_id),
                Severity::Info,
            ),
            self.notify(
                appointment,
                NotificationKind::Created,
                Recipient::Staff(appointment.staff_id),
                Severity::Info,
            ),
        ]
    }

    pub fn initial_history(&self, appointment: &Appointment, by: Uuid) -> StatusChange {
        StatusChange {
            from: None,
            to: appointment.status,
            trigger: AppointmentTrigger::Create,
            at: appointment.created_at,
            by,
        }
    }

    pub fn check_reschedulable(&self, appointment: &Appointment) -> Result<(), SchedulingError> {
        let trigger = AppointmentTrigger::Reschedule;
        if self.allowed_sources(trigger).contains(&appointment.status) {
            return Ok(());
        }
        let reason = if appointment.status == AppointmentStatus::Rescheduled {
            "appointment was already rescheduled"
        } else {
            "appointment is closed"
        };
        Err(SchedulingError::invalid_transition(appointment.status, trigger, reason))
    }

    /// Status the replacement appointment starts in.
    pub fn successor_status(&self, original: AppointmentStatus) -> AppointmentStatus {
        match original {
            AppointmentStatus::Confirmed
            | AppointmentStatus::CheckedIn
            | AppointmentStatus::InProgress => AppointmentStatus::Confirmed,
            _ => AppointmentStatus::Pending,
        }
    }

    /// Mark `original` as superseded by `successor_id`.
    pub fn supersede(
        &self,
        original: &Appointment,
        successor_id: Uuid,
        now: NaiveDateTime,
        actor: Uuid,
    ) -> Appointment {
        let at = original.updated_at.max(now);
        let mut superseded = original.clone();
        superseded.status = AppointmentStatus::Rescheduled;
        superseded.rescheduled_to = Some(successor_id);
        superseded.updated_at = at;
        superseded.status_history.push(StatusChange {
            from: Some(original.status),
            to: AppointmentStatus::Rescheduled,
            trigger: AppointmentTrigger::Reschedule,
            at,
            by: actor,
        });
        superseded
    }

    pub fn reschedule_effects(&self, original: &Appointment, successor: &Appointment) -> Vec<Effect> {
        vec![
            self.release_hold(original),
            Effect::Notify {
                kind: NotificationKind::Rescheduled,
                recipient: Recipient::Customer(successor.customer_id),
                severity: Severity::Info,
                data: json!({
                    "appointment_id": successor.id,
                    "previous_appointment_id": original.id,
                    "confirmation_code": successor.confirmation_code,
                    "previous_date": original.date,
                    "previous_start_time": original.start_time,
                    "date": successor.date,
                    "start_time": successor.start_time,
                    "staff_id": successor.staff_id,
                }),
            },
        ]
    }

    fn release_hold(&self, appointment: &Appointment) -> Effect {
        Effect::ReleaseHold {
            appointment_id: appointment.id,
            staff_id: appointment.staff_id,
            date: appointment.date,
        }
    }

    fn notify(
        &self,
        appointment: &Appointment,
        kind: NotificationKind,
        recipient: Recipient,
        severity: Severity,
    ) -> Effect {
        Effect::Notify {
            kind,
            recipient,
            severity,
            data: json!({
                "appointment_id": appointment.id,
                "confirmation_code": appointment.confirmation_code,
                "salon_id": appointment.salon_id,
                "date": appointment.date,
                "start_time": appointment.start_time,
            }),
        }
    }
}
