//! Read-only display API

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::session::{SessionId, SessionView};
use crate::summary::SummaryItem;

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    /// Live session ids, oldest first
    pub sessions: Vec<SessionId>,
    pub capacity: usize,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub session_id: SessionId,
    pub items: Vec<SummaryItem>,
}

/// GET /api/sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    Json(SessionListResponse {
        sessions: state.engine.reader().list_sessions().await,
        capacity: state.engine.config().capacity,
    })
}

/// GET /api/sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> ApiResult<Json<SessionView>> {
    state
        .engine
        .reader()
        .get_view(&session_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("session {}", session_id)))
}

/// GET /api/sessions/:session_id/summary
pub async fn get_summary(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> ApiResult<Json<SummaryResponse>> {
    let items = state
        .engine
        .reader()
        .summary(&session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("session {}", session_id)))?;
    Ok(Json(SummaryResponse { session_id, items }))
}
