//! Live telemetry engine
//!
//! Ties the session cache to the per-session supervisors. The job-control
//! side calls [`LiveEngine::notify_session_started`]; the display side only
//! gets the read-only [`SessionReader`].

use crate::cache::{SessionCache, UpsertOutcome};
use crate::session::{SessionDescriptor, SessionId, SessionState, SessionView};
use crate::summary::{self, SummaryItem};
use crate::supervisor::{SessionSupervisor, SupervisorConfig};
use crate::transport::StreamConnector;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::info;
use vtel_common::config::EngineSection;
use vtel_common::events::{EventBus, TelemetryEvent};

/// Engine tuning, overridable at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of cached sessions
    pub capacity: usize,
    pub flush_interval: Duration,
    pub reconnect_backoff: Duration,
    /// Capacity of the telemetry event broadcast channel
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            flush_interval: Duration::from_millis(500),
            reconnect_backoff: Duration::from_millis(2000),
            event_capacity: 100,
        }
    }
}

impl From<&EngineSection> for EngineConfig {
    fn from(section: &EngineSection) -> Self {
        Self {
            capacity: section.capacity,
            flush_interval: Duration::from_millis(section.flush_interval_ms),
            reconnect_backoff: Duration::from_millis(section.reconnect_backoff_ms),
            event_capacity: section.event_capacity,
        }
    }
}

pub struct LiveEngine {
    cache: SessionCache,
    supervisors: Mutex<HashMap<SessionId, SessionSupervisor>>,
    connector: Arc<dyn StreamConnector>,
    config: EngineConfig,
    events: EventBus,
}

impl LiveEngine {
    pub fn new(config: EngineConfig, connector: Arc<dyn StreamConnector>) -> Self {
        let events = EventBus::new(config.event_capacity.max(1));
        Self {
            cache: SessionCache::new(config.capacity, events.clone()),
            supervisors: Mutex::new(HashMap::new()),
            connector,
            config,
            events,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a started job and open its streams
    ///
    /// Sessions pushed out by capacity have their streams cancelled without
    /// waiting for them to wind down. The supervisor map stays locked across
    /// the cache change so a concurrent start cannot orphan a supervisor.
    pub async fn notify_session_started(&self, descriptor: SessionDescriptor) -> UpsertOutcome {
        let mut supervisors = self.supervisors.lock().await;
        let outcome = self.cache.upsert(descriptor.clone()).await;

        for evicted in &outcome.evicted {
            if let Some(supervisor) = supervisors.remove(evicted) {
                info!(session_id = %supervisor.session_id(), "Stopping streams of evicted session");
                supervisor.teardown();
            }
        }
        if outcome.created {
            let supervisor = SessionSupervisor::spawn(
                descriptor.clone(),
                self.connector.clone(),
                self.cache.clone(),
                self.events.clone(),
                SupervisorConfig {
                    flush_interval: self.config.flush_interval,
                    reconnect_backoff: self.config.reconnect_backoff,
                },
            );
            if let Some(previous) = supervisors.insert(descriptor.session_id, supervisor) {
                previous.teardown();
            }
        }
        outcome
    }

    /// Tear down and forget one session; false when it was unknown
    pub async fn remove_session(&self, session_id: &str) -> bool {
        let mut supervisors = self.supervisors.lock().await;
        if let Some(supervisor) = supervisors.remove(session_id) {
            supervisor.teardown();
        }
        self.cache.remove(session_id).await
    }

    /// Tear down and forget every session; returns how many were cached
    pub async fn reset(&self) -> usize {
        let mut supervisors = self.supervisors.lock().await;
        for (_, supervisor) in supervisors.drain() {
            supervisor.teardown();
        }
        self.cache.reset().await.len()
    }

    /// Stop every session and wait for pipelines to flush into the cache
    pub async fn shutdown(&self) {
        let supervisors: Vec<SessionSupervisor> =
            self.supervisors.lock().await.drain().map(|(_, s)| s).collect();
        info!(sessions = supervisors.len(), "Shutting down live engine");
        for supervisor in &supervisors {
            supervisor.teardown();
        }
        for supervisor in supervisors {
            supervisor.join().await;
        }
    }

    /// Number of sessions with a running supervisor
    pub async fn active_supervisors(&self) -> usize {
        self.supervisors.lock().await.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Read-only view for the display layer
    pub fn reader(&self) -> SessionReader {
        SessionReader {
            cache: self.cache.clone(),
        }
    }
}

/// Read-only query surface over the session cache
#[derive(Clone)]
pub struct SessionReader {
    cache: SessionCache,
}

impl SessionReader {
    /// Live session ids, oldest first
    pub async fn list_sessions(&self) -> Vec<SessionId> {
        self.cache.list_sessions().await
    }

    pub async fn get_session(&self, session_id: &str) -> Option<SessionState> {
        self.cache.get_session(session_id).await
    }

    pub async fn get_view(&self, session_id: &str) -> Option<SessionView> {
        self.get_session(session_id).await.map(SessionView::from)
    }

    /// Headline figures of the session's latest result
    pub async fn summary(&self, session_id: &str) -> Option<Vec<SummaryItem>> {
        let state = self.get_session(session_id).await?;
        Some(match &state.latest_result {
            Some(result) => summary::summarize(&state.descriptor, result),
            None => Vec::new(),
        })
    }
}
