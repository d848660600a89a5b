use std::sync::Arc;

use axum::{routing::get, Router};

use scheduling_cell::handlers::SchedulingState;
use scheduling_cell::router::scheduling_routes;

pub fn create_router(state: Arc<SchedulingState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Salon scheduling API is running!" }))
        .nest("/appointments", scheduling_routes(state))
}
