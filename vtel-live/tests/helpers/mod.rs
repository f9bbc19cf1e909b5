//! Test helpers for vtel-live integration tests
//!
//! `MockConnector` hands out in-memory connections whose events are pushed
//! by the test, and records how often each stream was opened and closed.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use vtel_common::events::StreamKind;
use vtel_live::engine::{EngineConfig, LiveEngine};
use vtel_live::session::SessionDescriptor;
use vtel_live::transport::{StreamConnection, StreamConnector, StreamEvent, TransportError};

type Key = (String, StreamKind);

#[derive(Default)]
struct MockState {
    senders: HashMap<Key, mpsc::UnboundedSender<StreamEvent>>,
    connects: HashMap<Key, usize>,
    closes: HashMap<Key, usize>,
    refuse: HashMap<Key, TransportError>,
}

#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn key(session_id: &str, kind: StreamKind) -> Key {
        (session_id.to_string(), kind)
    }

    /// Push an event to the most recent connection of a stream
    pub fn push(&self, session_id: &str, kind: StreamKind, event: StreamEvent) {
        let state = self.state.lock().unwrap();
        let sender = state
            .senders
            .get(&Self::key(session_id, kind))
            .unwrap_or_else(|| panic!("{} {} never connected", session_id, kind));
        sender.send(event).expect("connection dropped");
    }

    pub fn push_json(&self, session_id: &str, kind: StreamKind, message: Value) {
        self.push(session_id, kind, StreamEvent::Text(message.to_string()));
    }

    /// Make the next connect of a stream fail
    pub fn refuse_next(&self, session_id: &str, kind: StreamKind, error: TransportError) {
        self.state
            .lock()
            .unwrap()
            .refuse
            .insert(Self::key(session_id, kind), error);
    }

    pub fn connects(&self, session_id: &str, kind: StreamKind) -> usize {
        let state = self.state.lock().unwrap();
        state.connects.get(&Self::key(session_id, kind)).copied().unwrap_or(0)
    }

    pub fn closes(&self, session_id: &str, kind: StreamKind) -> usize {
        let state = self.state.lock().unwrap();
        state.closes.get(&Self::key(session_id, kind)).copied().unwrap_or(0)
    }
}

#[async_trait]
impl StreamConnector for MockConnector {
    async fn connect(
        &self,
        kind: StreamKind,
        session_id: &str,
    ) -> Result<Box<dyn StreamConnection>, TransportError> {
        let key = Self::key(session_id, kind);
        let mut state = self.state.lock().unwrap();
        *state.connects.entry(key.clone()).or_default() += 1;
        if let Some(error) = state.refuse.remove(&key) {
            return Err(error);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.senders.insert(key.clone(), tx);
        Ok(Box::new(MockConnection {
            key,
            rx,
            state: self.state.clone(),
        }))
    }
}

struct MockConnection {
    key: Key,
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl StreamConnection for MockConnection {
    async fn next_event(&mut self) -> StreamEvent {
        match self.rx.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        *state.closes.entry(self.key.clone()).or_default() += 1;
    }
}

/// Engine with default timings backed by `connector`
pub fn engine(connector: Arc<MockConnector>, capacity: usize) -> Arc<LiveEngine> {
    let config = EngineConfig {
        capacity,
        event_capacity: 1024,
        ..EngineConfig::default()
    };
    Arc::new(LiveEngine::new(config, connector))
}

pub fn person_count(session_id: &str) -> SessionDescriptor {
    SessionDescriptor::new(session_id, "retail", "store_analytics", "1", "entrance")
}

pub fn helmet(session_id: &str) -> SessionDescriptor {
    SessionDescriptor::new(session_id, "safety_industry", "safety", "2", "gate")
}

/// Let spawned tasks run without letting the (paused) clock move
pub async fn settle() {
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
}

/// Advance the paused clock, then let tasks react
pub async fn advance(millis: u64) {
    tokio::time::advance(Duration::from_millis(millis)).await;
    settle().await;
}
