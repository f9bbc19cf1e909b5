//! Upstream push-stream transport
//!
//! The supervisor only sees [`StreamConnector`] / [`StreamConnection`]; the
//! production [`HttpConnector`] speaks SSE (results, raw live data) and
//! WebSocket (frames). Tests substitute an in-memory connector.

pub mod sse;
pub mod ws;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use vtel_common::events::StreamKind;

/// Connect timeout for both SSE and WebSocket upstreams
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport failures, split by whether a retry can help
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Could not establish the connection (refused, 5xx, timeout)
    #[error("connect failed: {0}")]
    Connect(String),

    /// An open connection broke
    #[error("connection interrupted: {0}")]
    Interrupted(String),

    /// The upstream rejected the request or spoke something unusable
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Fatal errors are never retried
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Protocol(_))
    }
}

/// One transition observed on an open connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Text(String),
    Binary(Vec<u8>),
    /// The peer ended the stream; `clean` is false for abnormal closure
    Closed { clean: bool },
    Failed(TransportError),
}

/// An open push stream
#[async_trait]
pub trait StreamConnection: Send {
    /// Wait for the next event; must be cancel-safe
    async fn next_event(&mut self) -> StreamEvent;

    /// Close intentionally
    async fn close(&mut self);
}

/// Opens the push stream of a given kind for a session
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(
        &self,
        kind: StreamKind,
        session_id: &str,
    ) -> Result<Box<dyn StreamConnection>, TransportError>;
}

/// Production connector for the analytics backend
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
    http_base_url: String,
    ws_base_url: String,
}

impl HttpConnector {
    pub fn new(http_base_url: &str, ws_base_url: &str) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vtel-live/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| crate::Error::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            http_base_url: http_base_url.trim_end_matches('/').to_string(),
            ws_base_url: ws_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Upstream address of a session's stream
    pub fn endpoint(&self, kind: StreamKind, session_id: &str) -> String {
        match kind {
            StreamKind::Results => format!("{}/stream-results/{}", self.http_base_url, session_id),
            StreamKind::LiveData => format!("{}/stream-live-data/{}", self.http_base_url, session_id),
            StreamKind::Frames => format!("{}/ws/stream-frames/{}", self.ws_base_url, session_id),
        }
    }
}

#[async_trait]
impl StreamConnector for HttpConnector {
    async fn connect(
        &self,
        kind: StreamKind,
        session_id: &str,
    ) -> Result<Box<dyn StreamConnection>, TransportError> {
        let url = self.endpoint(kind, session_id);
        debug!(session_id, stream = %kind, url = %url, "Connecting upstream stream");

        match kind {
            StreamKind::Results | StreamKind::LiveData => {
                let connection = sse::SseConnection::open(&self.client, &url).await?;
                Ok(Box::new(connection))
            }
            StreamKind::Frames => {
                let connection = tokio::time::timeout(CONNECT_TIMEOUT, ws::WsConnection::open(&url))
                    .await
                    .map_err(|_| TransportError::Connect(format!("timed out connecting to {}", url)))??;
                Ok(Box::new(connection))
            }
        }
    }
}
