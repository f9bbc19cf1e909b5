//! Connection state machine for one push stream
//!
//! `Connecting -> Open -> Closing(reason) -> Closed(reason)`, then either a
//! single backoff-delayed reconnect or the end of the task.

use super::handlers::{Flow, MessageRouter, Payload};
use crate::transport::{StreamConnection, StreamConnector, StreamEvent};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vtel_common::events::{CloseReason, ConnectionState, EventBus, StreamKind, TelemetryEvent};

/// Reconnect only after an abnormal closure of a session that is still running
pub fn should_reconnect(reason: CloseReason, completed: bool) -> bool {
    reason == CloseReason::Error && !completed
}

pub(crate) struct StreamTask {
    pub(crate) kind: StreamKind,
    pub(crate) connector: Arc<dyn StreamConnector>,
    pub(crate) router: MessageRouter,
    pub(crate) events: EventBus,
    pub(crate) cancel: CancellationToken,
    pub(crate) completed: watch::Receiver<bool>,
    pub(crate) backoff: Duration,
}

impl StreamTask {
    pub(crate) async fn run(self) {
        loop {
            let reason = self.connect_and_pump().await;
            if !should_reconnect(reason, self.is_completed()) {
                debug!(session_id = %self.router.session_id(), stream = %self.kind, ?reason, "Stream finished");
                break;
            }

            info!(
                session_id = %self.router.session_id(),
                stream = %self.kind,
                backoff_ms = self.backoff.as_millis() as u64,
                "Scheduling reconnect"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.backoff) => {}
            }
            // Completion may have arrived on another stream during the backoff
            if self.is_completed() {
                break;
            }
        }
    }

    fn is_completed(&self) -> bool {
        *self.completed.borrow()
    }

    /// One connection lifetime; returns why it closed
    async fn connect_and_pump(&self) -> CloseReason {
        self.set_state(ConnectionState::Connecting);

        let connected = tokio::select! {
            _ = self.cancel.cancelled() => Err(CloseReason::Teardown),
            result = self.connector.connect(self.kind, self.router.session_id()) => match result {
                Ok(connection) => Ok(connection),
                Err(e) if e.is_fatal() => {
                    error!(session_id = %self.router.session_id(), stream = %self.kind, "Connect failed: {}", e);
                    self.router.fatal(self.kind, e).await;
                    Err(CloseReason::Fatal)
                }
                Err(e) => {
                    warn!(session_id = %self.router.session_id(), stream = %self.kind, "Connect failed: {}", e);
                    Err(CloseReason::Error)
                }
            },
        };
        let mut connection = match connected {
            Ok(connection) => connection,
            Err(reason) => {
                self.set_state(ConnectionState::Closed(reason));
                return reason;
            }
        };

        self.set_state(ConnectionState::Open);
        let reason = self.pump(connection.as_mut()).await;

        self.set_state(ConnectionState::Closing(reason));
        connection.close().await;
        self.set_state(ConnectionState::Closed(reason));
        reason
    }

    async fn pump(&self, connection: &mut dyn StreamConnection) -> CloseReason {
        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => return CloseReason::Teardown,
                event = connection.next_event() => event,
            };

            let flow = match event {
                StreamEvent::Text(text) => self.router.route(self.kind, Payload::Text(text)).await,
                StreamEvent::Binary(bytes) => self.router.route(self.kind, Payload::Binary(bytes)).await,
                StreamEvent::Closed { clean: true } => Flow::Close(CloseReason::Clean),
                StreamEvent::Closed { clean: false } => {
                    warn!(session_id = %self.router.session_id(), stream = %self.kind, "Stream closed uncleanly");
                    Flow::Close(CloseReason::Error)
                }
                StreamEvent::Failed(e) if e.is_fatal() => {
                    error!(session_id = %self.router.session_id(), stream = %self.kind, "Stream failed: {}", e);
                    self.router.fatal(self.kind, e).await;
                    Flow::Close(CloseReason::Fatal)
                }
                StreamEvent::Failed(e) => {
                    warn!(session_id = %self.router.session_id(), stream = %self.kind, "Stream dropped: {}", e);
                    Flow::Close(CloseReason::Error)
                }
            };

            if let Flow::Close(reason) = flow {
                return reason;
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        debug!(session_id = %self.router.session_id(), stream = %self.kind, ?state, "Stream state");
        self.events.emit_lossy(TelemetryEvent::StreamStateChanged {
            session_id: self.router.session_id().to_string(),
            stream: self.kind,
            state,
            timestamp: Utc::now(),
        });
    }
}
