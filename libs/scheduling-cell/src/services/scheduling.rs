// libs/scheduling-cell/src/services/scheduling.rs
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_models::auth::RequestContext;

use crate::clock::Clock;
use crate::effects::Effect;
use crate::error::SchedulingError;
use crate::models::{
    minute_of_day, minutes_i32, require_fits_in_day, time_from_minute, Appointment,
    AppointmentService, AppointmentStatus, AppointmentTrigger, BookingOverrides, BookingRequest,
    DayAvailability, ProposedSlot, RescheduleRequest, ServiceInfo, StaffMember, StatusChange,
    TransitionPayload,
};
use crate::policy::{PolicyProvider, SchedulingPolicy};
use crate::services::availability::AvailabilityResolver;
use crate::services::calendar::DayCalendar;
use crate::services::guard::BookingConflictGuard;
use crate::services::lifecycle::AppointmentStateMachine;
use crate::services::pricing::PricingService;
use crate::store::SchedulingStore;

const CONFIRMATION_PREFIX: &str = "BK";
const CONFIRMATION_LENGTH: usize = 8;

/// Value returned by a state-changing operation together with the effects
/// the caller should dispatch.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub effects: Vec<Effect>,
    pub changed: bool,
}

impl<T> Outcome<T> {
    pub fn changed(value: T, effects: Vec<Effect>) -> Self {
        Self {
            value,
            effects,
            changed: true,
        }
    }

    pub fn unchanged(value: T) -> Self {
        Self {
            value,
            effects: Vec::new(),
            changed: false,
        }
    }
}

/// Entry point for every scheduling operation.
#[derive(Clone)]
pub struct SchedulingService {
    store: Arc<dyn SchedulingStore>,
    policies: Arc<dyn PolicyProvider>,
    clock: Arc<dyn Clock>,
    guard: Arc<BookingConflictGuard>,
    resolver: AvailabilityResolver,
    lifecycle: AppointmentStateMachine,
}

impl SchedulingService {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        policies: Arc<dyn PolicyProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let guard = Arc::new(BookingConflictGuard::new(store.clone()));
        Self {
            store,
            policies,
            clock,
            guard,
            resolver: AvailabilityResolver::new(),
            lifecycle: AppointmentStateMachine::new(),
        }
    }

    pub fn guard(&self) -> &BookingConflictGuard {
        &self.guard
    }

    /// Free slots for one staff member on one day. Advisory only.
    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn find_available_slots(
        &self,
        ctx: &RequestContext,
        staff_id: Uuid,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> Result<Vec<ProposedSlot>, SchedulingError> {
        let staff = self.scoped_staff(ctx, staff_id).await?;
        let policy = self.policies.policy(staff.salon_id).await;
        require_fits_in_day(duration_minutes, policy.buffer_minutes)?;
        let calendar = self.guard.load_calendar(&staff, date).await?;

        let slots: Vec<ProposedSlot> = self
            .resolver
            .list_free_slots(
                &calendar,
                duration_minutes,
                policy.buffer_minutes,
                policy.slot_granularity_minutes,
            )
            .collect();

        debug!("Found {} free slots for staff {} on {}", slots.len(), staff_id, date);
        Ok(slots)
    }

    /// Per-day working hours, bookings and free slots over `from..=to`.
    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn find_availability_range(
        &self,
        ctx: &RequestContext,
        staff_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        duration_minutes: u32,
    ) -> Result<Vec<DayAvailability>, SchedulingError> {
        if to < from {
            return Err(SchedulingError::Validation(format!(
                "range end {} is before start {}",
                to, from
            )));
        }

        let staff = self.scoped_staff(ctx, staff_id).await?;
        let policy = self.policies.policy(staff.salon_id).await;
        require_fits_in_day(duration_minutes, policy.buffer_minutes)?;
        let days = (to - from).num_days() + 1;
        if days > policy.max_horizon_days as i64 {
            return Err(SchedulingError::Validation(format!(
                "range of {} days exceeds the {} day limit",
                days, policy.max_horizon_days
            )));
        }

        let mut result = Vec::with_capacity(days as usize);
        for date in from.iter_days().take(days as usize) {
            let calendar = self.guard.load_calendar(&staff, date).await?;
            let free_slots = self
                .resolver
                .list_free_slots(
                    &calendar,
                    duration_minutes,
                    policy.buffer_minutes,
                    policy.slot_granularity_minutes,
                )
                .collect();
            result.push(DayAvailability {
                date,
                working_hours: calendar.effective_hours(),
                booked: calendar.bookings.clone(),
                free_slots,
            });
        }

        Ok(result)
    }

    #[instrument(skip(self, ctx, request), fields(user_id = %ctx.user_id, staff_id = %request.staff_id))]
    pub async fn book_appointment(
        &self,
        ctx: &RequestContext,
        request: BookingRequest,
    ) -> Result<Outcome<Appointment>, SchedulingError> {
        let staff = self.scoped_staff(ctx, request.staff_id).await?;
        if !staff.is_active {
            return Err(SchedulingError::Validation(format!(
                "staff member {} is not taking bookings",
                staff.id
            )));
        }
        if !self
            .store
            .customer_exists(staff.salon_id, request.customer_id)
            .await?
        {
            return Err(SchedulingError::not_found("customer", request.customer_id));
        }

        let policy = self.policies.policy(staff.salon_id).await;
        policy.authorize_overrides(ctx.role, &request.overrides)?;

        let selections = self.resolve_services(&staff, &request).await?;
        let pricing = PricingService::new(policy.tax_rate_bps);
        let services = pricing.build_service_lines(request.start_time, &selections)?;
        let totals = pricing.quote(&services, request.discount)?;
        let duration_minutes = services_duration(&services)?;

        let slot = ProposedSlot {
            staff_id: staff.id,
            date: request.date,
            start_time: request.start_time,
            duration_minutes,
            buffer_minutes: policy.buffer_minutes,
        };
        slot.validate()?;

        let now = self.clock.now();
        if slot.starts_at() < now {
            return Err(SchedulingError::Validation(
                "cannot book a slot in the past".to_string(),
            ));
        }

        let calendar = self.guard.load_calendar(&staff, slot.date).await?;
        self.ensure_available(&calendar, &slot, &request.overrides, &policy)?;

        let status: AppointmentStatus = request.initial_status.into();
        let overrides = request.overrides;
        let customer_id = request.customer_id;
        let notes = request.notes;
        let salon_id = staff.salon_id;
        let lifecycle = self.lifecycle;
        let actor = ctx.user_id;
        let end_time = slot_end(&slot)?;
        let appointment = self
            .guard
            .commit_booking(&slot, &overrides, policy.lock_timeout(), move || {
                let mut appointment = Appointment {
                    id: Uuid::new_v4(),
                    salon_id,
                    staff_id: slot.staff_id,
                    customer_id,
                    confirmation_code: generate_confirmation_code(),
                    date: slot.date,
                    start_time: slot.start_time,
                    end_time,
                    duration_minutes,
                    buffer_minutes: slot.buffer_minutes,
                    services,
                    totals,
                    status,
                    notes,
                    cancellation_reason: None,
                    rescheduled_from: None,
                    rescheduled_to: None,
                    checked_in: None,
                    started: None,
                    completed: None,
                    cancelled: None,
                    no_show: None,
                    status_history: Vec::new(),
                    created_at: now,
                    updated_at: now,
                };
                let created = lifecycle.initial_history(&appointment, actor);
                appointment.status_history.push(created);
                Ok(appointment)
            })
            .await?;

        info!(
            "Booked appointment {} ({}) for customer {}",
            appointment.id, appointment.confirmation_code, appointment.customer_id
        );

        let effects = if appointment.status == AppointmentStatus::Draft {
            Vec::new()
        } else {
            self.lifecycle.creation_effects(&appointment)
        };
        Ok(Outcome::changed(appointment, effects))
    }

    #[instrument(skip(self, ctx, request), fields(user_id = %ctx.user_id))]
    pub async fn reschedule_appointment(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
        request: RescheduleRequest,
    ) -> Result<Outcome<Appointment>, SchedulingError> {
        let original = self.scoped_appointment(ctx, appointment_id).await?;
        let staff_id = request.staff_id.unwrap_or(original.staff_id);
        let staff = self.scoped_staff(ctx, staff_id).await?;
        if staff.salon_id != original.salon_id {
            return Err(SchedulingError::Validation(
                "appointments cannot move between salons".to_string(),
            ));
        }
        if let Some(line) = original.services.iter().find(|l| !staff.performs(l.service_id)) {
            return Err(SchedulingError::Validation(format!(
                "{} does not perform {}",
                staff.display_name, line.name
            )));
        }

        let policy = self.policies.policy(original.salon_id).await;
        policy.authorize_overrides(ctx.role, &request.overrides)?;

        let slot = ProposedSlot {
            staff_id,
            date: request.date,
            start_time: request.start_time,
            duration_minutes: original.duration_minutes,
            buffer_minutes: policy.buffer_minutes,
        };
        slot.validate()?;

        if original.status == AppointmentStatus::Rescheduled {
            if let Some(successor) = self.existing_successor(&original, &slot).await? {
                debug!("Reschedule of {} already applied", original.id);
                return Ok(Outcome::unchanged(successor));
            }
        }
        self.lifecycle.check_reschedulable(&original)?;

        let now = self.clock.now();
        if slot.starts_at() < now {
            return Err(SchedulingError::Validation(
                "cannot move an appointment into the past".to_string(),
            ));
        }

        let calendar = self
            .guard
            .load_calendar(&staff, slot.date)
            .await?
            .excluding(original.id);
        self.ensure_available(&calendar, &slot, &request.overrides, &policy)?;

        let lifecycle = self.lifecycle;
        let actor = ctx.user_id;
        let end_time = slot_end(&slot)?;
        let commit = self
            .guard
            .commit_reschedule(
                original.id,
                &slot,
                &request.overrides,
                policy.lock_timeout(),
                move |latest| {
                    lifecycle.check_reschedulable(latest)?;
                    let services = relay_services(&latest.services, slot.start_time)?;
                    let status = lifecycle.successor_status(latest.status);
                    let created_at = latest.updated_at.max(now);
                    let successor_id = Uuid::new_v4();

                    let mut successor = latest.clone();
                    successor.id = successor_id;
                    successor.staff_id = slot.staff_id;
                    successor.confirmation_code = generate_confirmation_code();
                    successor.date = slot.date;
                    successor.start_time = slot.start_time;
                    successor.end_time = end_time;
                    successor.buffer_minutes = slot.buffer_minutes;
                    successor.services = services;
                    successor.status = status;
                    successor.rescheduled_from = Some(latest.id);
                    successor.rescheduled_to = None;
                    successor.checked_in = None;
                    successor.started = None;
                    successor.status_history = vec![StatusChange {
                        from: None,
                        to: status,
                        trigger: AppointmentTrigger::Reschedule,
                        at: created_at,
                        by: actor,
                    }];
                    successor.created_at = created_at;
                    successor.updated_at = created_at;

                    let superseded = lifecycle.supersede(latest, successor_id, now, actor);
                    Ok((superseded, successor))
                },
            )
            .await?;

        if !commit.changed {
            return Ok(Outcome::unchanged(commit.successor));
        }

        let effects = self
            .lifecycle
            .reschedule_effects(&commit.superseded, &commit.successor);
        Ok(Outcome::changed(commit.successor, effects))
    }

    #[instrument(skip(self, ctx, payload), fields(user_id = %ctx.user_id))]
    pub async fn transition_status(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
        trigger: AppointmentTrigger,
        payload: TransitionPayload,
    ) -> Result<Outcome<Appointment>, SchedulingError> {
        if matches!(trigger, AppointmentTrigger::Create | AppointmentTrigger::Reschedule) {
            return Err(SchedulingError::Validation(format!(
                "{} is not a status transition; use the booking endpoints",
                trigger
            )));
        }

        let appointment = self.scoped_appointment(ctx, appointment_id).await?;
        let policy = self.policies.policy(appointment.salon_id).await;
        let now = self.clock.now();
        let actor = ctx.user_id;
        let lifecycle = self.lifecycle;

        let transition = self
            .guard
            .commit_transition(appointment_id, policy.lock_timeout(), |latest| {
                lifecycle.transition(latest, trigger, &payload, now, actor, &policy)
            })
            .await?;

        if !transition.changed {
            debug!("{} on {} was a no-op", trigger, appointment_id);
        }

        Ok(Outcome {
            value: transition.appointment,
            effects: transition.effects,
            changed: transition.changed,
        })
    }

    pub async fn get_appointment(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        self.scoped_appointment(ctx, appointment_id).await
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn scoped_staff(
        &self,
        ctx: &RequestContext,
        staff_id: Uuid,
    ) -> Result<StaffMember, SchedulingError> {
        match self.store.staff(staff_id).await? {
            Some(staff) if ctx.can_access_salon(staff.salon_id) => Ok(staff),
            Some(_) => {
                warn!("User {} requested staff {} outside their salon", ctx.user_id, staff_id);
                Err(SchedulingError::not_found("staff", staff_id))
            }
            None => Err(SchedulingError::not_found("staff", staff_id)),
        }
    }

    async fn scoped_appointment(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        match self.store.appointment(appointment_id).await? {
            Some(appointment) if ctx.can_access_salon(appointment.salon_id) => Ok(appointment),
            Some(_) => {
                warn!(
                    "User {} requested appointment {} outside their salon",
                    ctx.user_id, appointment_id
                );
                Err(SchedulingError::not_found("appointment", appointment_id))
            }
            None => Err(SchedulingError::not_found("appointment", appointment_id)),
        }
    }

    async fn resolve_services(
        &self,
        staff: &StaffMember,
        request: &BookingRequest,
    ) -> Result<Vec<(ServiceInfo, u32)>, SchedulingError> {
        let mut selections = Vec::with_capacity(request.services.len());
        for selection in &request.services {
            let service = match self.store.service(selection.service_id).await? {
                Some(service) if service.salon_id == staff.salon_id => service,
                _ => return Err(SchedulingError::not_found("service", selection.service_id)),
            };
            if !service.is_active {
                return Err(SchedulingError::Validation(format!(
                    "service {} is no longer offered",
                    service.name
                )));
            }
            if !staff.performs(service.id) {
                return Err(SchedulingError::Validation(format!(
                    "{} does not perform {}",
                    staff.display_name, service.name
                )));
            }
            selections.push((service, selection.quantity));
        }
        Ok(selections)
    }

    /// Advisory check; a negative answer carries same-day alternatives.
    fn ensure_available(
        &self,
        calendar: &DayCalendar,
        slot: &ProposedSlot,
        overrides: &BookingOverrides,
        policy: &SchedulingPolicy,
    ) -> Result<(), SchedulingError> {
        let availability = self.resolver.is_available(calendar, slot, overrides);
        let Some(reason) = availability.reason else {
            return Ok(());
        };

        let alternatives = self
            .resolver
            .list_free_slots(
                calendar,
                slot.duration_minutes,
                slot.buffer_minutes,
                policy.slot_granularity_minutes,
            )
            .take(policy.alternative_slot_count)
            .collect();

        debug!("Slot {} {} unavailable: {}", slot.date, slot.start_time, reason);
        Err(SchedulingError::Unavailable {
            reason,
            alternatives,
        })
    }

    async fn existing_successor(
        &self,
        appointment: &Appointment,
        slot: &ProposedSlot,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let Some(successor_id) = appointment.rescheduled_to else {
            return Ok(None);
        };
        let successor = self.store.appointment(successor_id).await?;
        Ok(successor.filter(|s| s.is_at(slot.staff_id, slot.date, slot.start_time)))
    }
}

fn services_duration(lines: &[AppointmentService]) -> Result<u32, SchedulingError> {
    lines
        .iter()
        .try_fold(0u32, |total, line| {
            line.total_minutes().and_then(|minutes| total.checked_add(minutes))
        })
        .ok_or_else(|| {
            SchedulingError::Validation("combined service duration is too long".to_string())
        })
}

fn slot_end(slot: &ProposedSlot) -> Result<NaiveTime, SchedulingError> {
    slot.end_time().ok_or_else(|| {
        SchedulingError::Validation("slot runs past the end of the day".to_string())
    })
}

/// Shift service lines so the first one starts at `start_time`.
fn relay_services(
    lines: &[AppointmentService],
    start_time: NaiveTime,
) -> Result<Vec<AppointmentService>, SchedulingError> {
    let mut cursor = minute_of_day(start_time);
    let mut relaid = Vec::with_capacity(lines.len());
    for line in lines {
        let end = line
            .total_minutes()
            .and_then(|minutes| cursor.checked_add(minutes_i32(minutes)));
        let (Some(line_start), Some(end), Some(line_end)) = (
            time_from_minute(cursor),
            end,
            end.and_then(time_from_minute),
        ) else {
            return Err(SchedulingError::Validation(format!(
                "service {} would run past the end of the day",
                line.name
            )));
        };
        relaid.push(AppointmentService {
            start_time: line_start,
            end_time: line_end,
            ..line.clone()
        });
        cursor = end;
    }
    Ok(relaid)
}

fn generate_confirmation_code() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CONFIRMATION_LENGTH)
        .map(char::from)
        .collect();
    format!("{}{}", CONFIRMATION_PREFIX, suffix.to_uppercase())
}
