//! Bounded session cache
//!
//! The only state shared across sessions. The global lock guards the
//! insertion-ordered id list and the id -> session map and is held for a
//! single operation; each session carries its own lock so updates to one
//! session never wait on another.

use crate::session::{SessionDescriptor, SessionId, SessionState, SessionUpdate};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use vtel_common::events::{EventBus, TelemetryEvent};

/// Result of [`SessionCache::upsert`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// The id was new and a session was created
    pub created: bool,
    /// Sessions dropped to stay within capacity, oldest first
    pub evicted: Vec<SessionId>,
}

#[derive(Default)]
struct CacheInner {
    order: VecDeque<SessionId>,
    sessions: HashMap<SessionId, Arc<RwLock<SessionState>>>,
}

#[derive(Clone)]
pub struct SessionCache {
    inner: Arc<RwLock<CacheInner>>,
    capacity: usize,
    events: EventBus,
}

impl SessionCache {
    pub fn new(capacity: usize, events: EventBus) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheInner::default())),
            capacity: capacity.max(1),
            events,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register a session; evicts the oldest-inserted sessions beyond capacity
    ///
    /// A known id is left untouched.
    pub async fn upsert(&self, descriptor: SessionDescriptor) -> UpsertOutcome {
        let session_id = descriptor.session_id.clone();
        let started = TelemetryEvent::SessionStarted {
            session_id: session_id.clone(),
            industry: descriptor.industry.clone(),
            sub_industry: descriptor.sub_industry.clone(),
            rule_id: descriptor.rule_id.clone(),
            rule_name: descriptor.rule_name.clone(),
            timestamp: Utc::now(),
        };

        let mut outcome = UpsertOutcome::default();
        {
            let mut inner = self.inner.write().await;
            if inner.sessions.contains_key(&session_id) {
                debug!(session_id = %session_id, "Session already cached");
                return outcome;
            }

            inner.order.push_back(session_id.clone());
            inner
                .sessions
                .insert(session_id.clone(), Arc::new(RwLock::new(SessionState::new(descriptor))));
            outcome.created = true;

            while inner.order.len() > self.capacity {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                inner.sessions.remove(&oldest);
                outcome.evicted.push(oldest);
            }
        }

        info!(session_id = %session_id, "Session registered");
        self.events.emit_lossy(started);
        for evicted in &outcome.evicted {
            info!(session_id = %evicted, capacity = self.capacity, "Session evicted");
            self.events.emit_lossy(TelemetryEvent::SessionEvicted {
                session_id: evicted.clone(),
                timestamp: Utc::now(),
            });
        }
        outcome
    }

    /// Merge a partial update; false when the session is unknown
    pub async fn apply_update(&self, session_id: &str, update: SessionUpdate) -> bool {
        let Some(entry) = self.entry(session_id).await else {
            debug!(session_id, "Update for unknown session ignored");
            return false;
        };

        let points = update.point_count();
        let result = update.result.is_some();
        let frame = update.frame.is_some();
        entry.write().await.apply(update);

        self.events.emit_lossy(TelemetryEvent::SessionUpdated {
            session_id: session_id.to_string(),
            points,
            result,
            frame,
            timestamp: Utc::now(),
        });
        true
    }

    /// Remove one session; safe on unknown ids
    pub async fn remove(&self, session_id: &str) -> bool {
        let removed = {
            let mut inner = self.inner.write().await;
            inner.order.retain(|id| id != session_id);
            inner.sessions.remove(session_id).is_some()
        };
        if removed {
            info!(session_id, "Session removed");
            self.events.emit_lossy(TelemetryEvent::SessionRemoved {
                session_id: session_id.to_string(),
                timestamp: Utc::now(),
            });
        }
        removed
    }

    /// Drop every session, returning their ids in insertion order
    pub async fn reset(&self) -> Vec<SessionId> {
        let cleared: Vec<SessionId> = {
            let mut inner = self.inner.write().await;
            inner.sessions.clear();
            inner.order.drain(..).collect()
        };
        info!(count = cleared.len(), "Session cache reset");
        self.events.emit_lossy(TelemetryEvent::SessionsReset { timestamp: Utc::now() });
        cleared
    }

    /// Live session ids, oldest first
    pub async fn list_sessions(&self) -> Vec<SessionId> {
        self.inner.read().await.order.iter().cloned().collect()
    }

    /// Snapshot of one session
    pub async fn get_session(&self, session_id: &str) -> Option<SessionState> {
        let entry = self.entry(session_id).await?;
        let state = entry.read().await.clone();
        Some(state)
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.inner.read().await.sessions.contains_key(session_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn entry(&self, session_id: &str) -> Option<Arc<RwLock<SessionState>>> {
        self.inner.read().await.sessions.get(session_id).cloned()
    }
}
