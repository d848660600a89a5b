use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod demo;
mod router;

use notification_cell::dispatcher_from_config;
use scheduling_cell::clock::SystemClock;
use scheduling_cell::handlers::SchedulingState;
use scheduling_cell::policy::SchedulingPolicy;
use scheduling_cell::store::InMemoryStore;
use scheduling_cell::SchedulingService;
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting salon scheduling API server");

    let config = AppConfig::from_env();

    let store = Arc::new(InMemoryStore::new());
    if config.seed_demo_data {
        demo::seed(&store).await;
    }

    let policy = SchedulingPolicy::from_config(&config);
    let service = SchedulingService::new(store, Arc::new(policy), Arc::new(SystemClock));
    let state = Arc::new(SchedulingState::new(service, dispatcher_from_config(&config)));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
