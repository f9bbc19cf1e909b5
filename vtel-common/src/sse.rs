//! Server-Sent Events (SSE) utilities

use crate::events::TelemetryEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Keep-alive interval for every VTEL SSE endpoint
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Convert one telemetry event to an SSE frame
pub fn to_sse_event(event: &TelemetryEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.event_type()).data(json)),
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            None
        }
    }
}

/// Build an SSE response that relays every event from `rx`
///
/// A lagging client skips the events it missed and keeps receiving.
/// The stream ends when the bus is dropped.
pub fn event_bus_sse_stream(
    service_name: &'static str,
    mut rx: broadcast::Receiver<TelemetryEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    debug!("SSE: Broadcasting event: {}", event.event_type());
                    if let Some(frame) = to_sse_event(&event) {
                        yield Ok(frame);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("SSE client lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("SSE: {} event bus closed", service_name);
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}
