//! Event types for the VTEL event system
//!
//! Provides shared event definitions and the EventBus used to observe
//! session lifecycle and ingestion progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// The three push streams owned by one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Periodic structured result snapshots (SSE)
    Results,
    /// Per-frame raw detection records (SSE)
    LiveData,
    /// JPEG frame snapshots (WebSocket)
    Frames,
}

impl StreamKind {
    pub const ALL: [StreamKind; 3] = [StreamKind::Results, StreamKind::LiveData, StreamKind::Frames];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Results => "results",
            StreamKind::LiveData => "live_data",
            StreamKind::Frames => "frames",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a stream connection left the `Open` state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// A message told us the producer is done
    Message,
    /// The peer closed the connection cleanly
    Clean,
    /// Transport error or unclean disconnect
    Error,
    /// Unrecoverable protocol failure (not retried)
    Fatal,
    /// Session teardown
    Teardown,
}

/// Connection state machine for one stream
///
/// `Connecting -> Open -> Closing(reason) -> Closed(reason)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing(CloseReason),
    Closed(CloseReason),
}

/// VTEL event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TelemetryEvent {
    /// A session was registered by the job-control path
    SessionStarted {
        session_id: String,
        industry: String,
        sub_industry: String,
        rule_id: String,
        rule_name: String,
        timestamp: DateTime<Utc>,
    },

    /// A session was dropped because the cache exceeded capacity
    SessionEvicted {
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A session was removed explicitly
    SessionRemoved {
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    /// All sessions were cleared
    SessionsReset { timestamp: DateTime<Utc> },

    /// A batched update was applied to a session
    SessionUpdated {
        session_id: String,
        /// Number of series points carried by the update
        points: usize,
        /// Whether a new latest result was stored
        result: bool,
        /// Whether a new frame was stored
        frame: bool,
        timestamp: DateTime<Utc>,
    },

    /// The results stream reported a terminal status
    SessionCompleted {
        session_id: String,
        status: String,
        timestamp: DateTime<Utc>,
    },

    /// A stream connection changed state
    StreamStateChanged {
        session_id: String,
        stream: StreamKind,
        state: ConnectionState,
        timestamp: DateTime<Utc>,
    },

    /// A session pipeline stopped on an unrecoverable protocol error
    SessionFailed {
        session_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl TelemetryEvent {
    /// Event type string used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            TelemetryEvent::SessionStarted { .. } => "SessionStarted",
            TelemetryEvent::SessionEvicted { .. } => "SessionEvicted",
            TelemetryEvent::SessionRemoved { .. } => "SessionRemoved",
            TelemetryEvent::SessionsReset { .. } => "SessionsReset",
            TelemetryEvent::SessionUpdated { .. } => "SessionUpdated",
            TelemetryEvent::SessionCompleted { .. } => "SessionCompleted",
            TelemetryEvent::StreamStateChanged { .. } => "StreamStateChanged",
            TelemetryEvent::SessionFailed { .. } => "SessionFailed",
        }
    }

    /// Session the event concerns; `None` for cache-wide events
    pub fn session_id(&self) -> Option<&str> {
        match self {
            TelemetryEvent::SessionStarted { session_id, .. }
            | TelemetryEvent::SessionEvicted { session_id, .. }
            | TelemetryEvent::SessionRemoved { session_id, .. }
            | TelemetryEvent::SessionUpdated { session_id, .. }
            | TelemetryEvent::SessionCompleted { session_id, .. }
            | TelemetryEvent::StreamStateChanged { session_id, .. }
            | TelemetryEvent::SessionFailed { session_id, .. } => Some(session_id),
            TelemetryEvent::SessionsReset { .. } => None,
        }
    }
}

/// One-to-many event distribution built on `tokio::sync::broadcast`
///
/// Slow subscribers lag and lose the oldest events; emitters never block.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TelemetryEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.tx.subscribe()
    }

    /// Emit an event
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: TelemetryEvent,
    ) -> Result<usize, broadcast::error::SendError<TelemetryEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: TelemetryEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
