//! Telemetry event streams (SSE)

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use vtel_common::sse::{event_bus_sse_stream, to_sse_event, KEEP_ALIVE_INTERVAL};

use super::AppState;
use crate::session::SessionId;

/// GET /events - every telemetry event
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    event_bus_sse_stream("vtel-live", state.engine.subscribe())
}

/// GET /api/sessions/:session_id/events - events of one session
///
/// Cache-wide events (reset) are passed through as well.
pub async fn session_event_stream(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!(session_id = %session_id, "New SSE client for session events");

    let stream = BroadcastStream::new(state.engine.subscribe()).filter_map(move |result| {
        let session_id = session_id.clone();
        async move {
            match result {
                Ok(event) => match event.session_id() {
                    Some(id) if id != session_id => None,
                    _ => to_sse_event(&event).map(Ok),
                },
                Err(e) => {
                    warn!("Session SSE stream error: {:?}", e);
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("keep-alive"))
}
