// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::RequestContext;
use shared_models::error::AppError;

use crate::effects::{dispatch_in_background, EffectDispatcher};
use crate::models::{Appointment, AppointmentTrigger, BookingRequest, RescheduleRequest, TransitionPayload};
use crate::services::lifecycle::AppointmentStateMachine;
use crate::services::scheduling::{Outcome, SchedulingService};

/// Shared state behind the scheduling routes.
pub struct SchedulingState {
    pub service: SchedulingService,
    pub dispatcher: Arc<dyn EffectDispatcher>,
}

impl SchedulingState {
    pub fn new(service: SchedulingService, dispatcher: Arc<dyn EffectDispatcher>) -> Self {
        Self { service, dispatcher }
    }

    fn respond(&self, outcome: Outcome<Appointment>) -> Json<Value> {
        let effects: Vec<&str> = outcome.effects.iter().map(|e| e.name()).collect();
        let body = json!({
            "success": true,
            "changed": outcome.changed,
            "appointment": outcome.value,
            "effects": effects,
        });
        dispatch_in_background(self.dispatcher.clone(), outcome.effects);
        Json(body)
    }
}

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
    pub duration_minutes: u32,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub duration_minutes: u32,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub trigger: AppointmentTrigger,
    #[serde(flatten)]
    pub payload: TransitionPayload,
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

pub async fn get_available_slots(
    State(state): State<Arc<SchedulingState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(staff_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state
        .service
        .find_available_slots(&ctx, staff_id, query.date, query.duration_minutes)
        .await?;

    Ok(Json(json!({
        "success": true,
        "staff_id": staff_id,
        "date": query.date,
        "duration_minutes": query.duration_minutes,
        "total": slots.len(),
        "slots": slots,
    })))
}

pub async fn get_availability_range(
    State(state): State<Arc<SchedulingState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(staff_id): Path<Uuid>,
    Query(query): Query<AvailabilityRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let days = state
        .service
        .find_availability_range(&ctx, staff_id, query.from, query.to, query.duration_minutes)
        .await?;

    Ok(Json(json!({
        "success": true,
        "staff_id": staff_id,
        "from": query.from,
        "to": query.to,
        "days": days,
    })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

pub async fn book_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = state.service.book_appointment(&ctx, request).await?;
    Ok(state.respond(outcome))
}

pub async fn get_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.service.get_appointment(&ctx, appointment_id).await?;
    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

pub async fn reschedule_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = state
        .service
        .reschedule_appointment(&ctx, appointment_id, request)
        .await?;
    Ok(state.respond(outcome))
}

pub async fn transition_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = state
        .service
        .transition_status(&ctx, appointment_id, request.trigger, request.payload)
        .await?;
    Ok(state.respond(outcome))
}

/// Triggers that can fire from the appointment's current status.
pub async fn get_valid_transitions(
    State(state): State<Arc<SchedulingState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.service.get_appointment(&ctx, appointment_id).await?;
    let triggers = AppointmentStateMachine::new().get_valid_transitions(appointment.status);

    Ok(Json(json!({
        "success": true,
        "appointment_id": appointment_id,
        "status": appointment.status,
        "triggers": triggers,
    })))
}
