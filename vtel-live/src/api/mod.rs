//! HTTP surface of the live service
//!
//! Read-only display API under `/api`, the telemetry event stream under
//! `/events`, and the job-control hooks under `/control`.

pub mod control;
pub mod events;
pub mod health;
pub mod sessions;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::LiveEngine;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LiveEngine>,
}

impl AppState {
    pub fn new(engine: Arc<LiveEngine>) -> Self {
        Self { engine }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::health_routes())
        .route("/api/sessions", get(sessions::list_sessions))
        .route("/api/sessions/:session_id", get(sessions::get_session))
        .route("/api/sessions/:session_id/summary", get(sessions::get_summary))
        .route("/api/sessions/:session_id/events", get(events::session_event_stream))
        .route("/events", get(events::event_stream))
        .route("/control/sessions", post(control::start_session))
        .route("/control/sessions/:session_id", delete(control::remove_session))
        .route("/control/reset", post(control::reset))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
