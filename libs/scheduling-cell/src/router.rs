// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::context_middleware;

use crate::handlers::{self, SchedulingState};

pub fn scheduling_routes(state: Arc<SchedulingState>) -> Router {
    Router::new()
        .route("/staff/{staff_id}/slots", get(handlers::get_available_slots))
        .route("/staff/{staff_id}/availability", get(handlers::get_availability_range))
        .route("/", post(handlers::book_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/reschedule", post(handlers::reschedule_appointment))
        .route(
            "/{appointment_id}/transitions",
            get(handlers::get_valid_transitions).post(handlers::transition_appointment),
        )
        .layer(middleware::from_fn(context_middleware))
        .with_state(state)
}
