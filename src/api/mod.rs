//! HTTP API module
//!
//! Loopback endpoints for dosing UIs: the give entry point plus the timer
//! controls and status.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timers", get(status_handler).post(start_handler))
        .route("/timers/:id", delete(remove_handler))
        .route("/timers/:id/top-up", post(top_up_handler))
        .route("/timers/:id/nudge", post(nudge_handler))
        .route("/timers/:id/silence", post(silence_handler))
        .route("/timers/:id/pause", post(pause_handler))
        .route("/timers/:id/resume", post(resume_handler))
        .route("/give/:agent", post(give_handler))
        .route("/agents", get(agents_handler))
        .route("/agents/:agent/dose", get(dose_handler))
        .route("/patient", put(patient_handler))
        .route("/health", get(health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
