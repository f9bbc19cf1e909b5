//! Job-control hooks
//!
//! Called by the component that launches analytics jobs, not by the display.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::session::{SessionDescriptor, SessionId};

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub session_id: SessionId,
    pub industry: String,
    pub sub_industry: String,
    pub rule_id: String,
    #[serde(default)]
    pub source_label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: SessionId,
    pub rule_name: String,
    pub created: bool,
    pub evicted: Vec<SessionId>,
}

#[derive(Debug, Serialize)]
pub struct RemoveSessionResponse {
    pub session_id: SessionId,
    pub removed: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub cleared: usize,
}

/// POST /control/sessions
pub async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> ApiResult<(StatusCode, Json<StartSessionResponse>)> {
    if request.session_id.trim().is_empty() {
        return Err(ApiError::BadRequest("session_id must not be empty".to_string()));
    }

    let descriptor = SessionDescriptor::new(
        request.session_id,
        request.industry,
        request.sub_industry,
        request.rule_id,
        request.source_label.unwrap_or_default(),
    );
    let session_id = descriptor.session_id.clone();
    let rule_name = descriptor.rule_name.clone();

    info!(session_id = %session_id, rule = %rule_name, "Session start notified");
    let outcome = state.engine.notify_session_started(descriptor).await;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(StartSessionResponse {
            session_id,
            rule_name,
            created: outcome.created,
            evicted: outcome.evicted,
        }),
    ))
}

/// DELETE /control/sessions/:session_id
pub async fn remove_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Json<RemoveSessionResponse> {
    let removed = state.engine.remove_session(&session_id).await;
    Json(RemoveSessionResponse { session_id, removed })
}

/// POST /control/reset
pub async fn reset(State(state): State<AppState>) -> Json<ResetResponse> {
    let cleared = state.engine.reset().await;
    Json(ResetResponse { cleared })
}
