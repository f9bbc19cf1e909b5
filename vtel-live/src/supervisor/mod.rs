//! Stream supervisor
//!
//! One [`SessionSupervisor`] per cached session: three stream tasks (results,
//! raw live data, frames) and the pipeline task they feed, all sharing one
//! cancellation token.

mod connection;
mod handlers;
mod pipeline;

pub use connection::should_reconnect;

use crate::cache::SessionCache;
use crate::session::{SessionDescriptor, SessionId};
use crate::throttle::DispatchThrottler;
use crate::transport::StreamConnector;
use connection::StreamTask;
use handlers::MessageRouter;
use pipeline::Pipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vtel_common::events::{EventBus, StreamKind};

/// Depth of the stream -> pipeline queue
const PIPELINE_QUEUE: usize = 256;

/// Timing knobs handed to every supervisor
#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    pub flush_interval: Duration,
    pub reconnect_backoff: Duration,
}

/// Owner of one session's connection tasks
pub struct SessionSupervisor {
    session_id: SessionId,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionSupervisor {
    /// Spawn the pipeline and the three stream tasks for a session
    pub fn spawn(
        descriptor: SessionDescriptor,
        connector: Arc<dyn StreamConnector>,
        cache: SessionCache,
        events: EventBus,
        config: SupervisorConfig,
    ) -> Self {
        let session_id = descriptor.session_id.clone();
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(PIPELINE_QUEUE);
        let (completed_tx, _) = watch::channel(false);
        let completed_tx = Arc::new(completed_tx);

        let pipeline = Pipeline::new(
            session_id.clone(),
            cache,
            events.clone(),
            DispatchThrottler::new(config.flush_interval),
            rx,
            cancel.clone(),
        );
        let mut tasks = vec![tokio::spawn(pipeline.run())];

        let router = MessageRouter::new(descriptor, tx, completed_tx.clone());
        for kind in StreamKind::ALL {
            let task = StreamTask {
                kind,
                connector: connector.clone(),
                router: router.clone(),
                events: events.clone(),
                cancel: cancel.clone(),
                completed: completed_tx.subscribe(),
                backoff: config.reconnect_backoff,
            };
            tasks.push(tokio::spawn(task.run()));
        }

        info!(session_id = %session_id, "Session supervisor started");
        Self {
            session_id,
            cancel,
            tasks,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Cancel every task of the session; idempotent and non-blocking
    pub fn teardown(&self) {
        if !self.cancel.is_cancelled() {
            debug!(session_id = %self.session_id, "Tearing down session streams");
            self.cancel.cancel();
        }
    }

    /// Wait for every task to exit (the pipeline flushes on its way out)
    pub async fn join(mut self) {
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!(session_id = %self.session_id, "Session task failed: {}", e);
            }
        }
    }
}

impl Drop for SessionSupervisor {
    fn drop(&mut self) {
        self.teardown();
    }
}
