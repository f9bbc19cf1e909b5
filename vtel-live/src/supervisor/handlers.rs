//! Per-stream message handling
//!
//! Parses one upstream message, detects terminal markers and forwards the
//! outcome to the session pipeline. Malformed messages are logged and dropped.

use super::pipeline::PipelineMsg;
use crate::normalizer::{self, NormalizedRecord};
use crate::session::{FrameImage, SessionDescriptor};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use vtel_common::events::{CloseReason, StreamKind};

const RESULTS_DONE: &str = "processing completed";
const LIVE_DATA_DONE: &str = "live data completed";
const FRAMES_DONE: &str = "live frames completed";

/// Raw message body as received
#[derive(Debug)]
pub(crate) enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

/// What the connection loop should do after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Close(CloseReason),
}

/// Routes messages of all three streams of one session into its pipeline
#[derive(Clone)]
pub(crate) struct MessageRouter {
    descriptor: SessionDescriptor,
    pipeline: mpsc::Sender<PipelineMsg>,
    completed: Arc<watch::Sender<bool>>,
}

impl MessageRouter {
    pub(crate) fn new(
        descriptor: SessionDescriptor,
        pipeline: mpsc::Sender<PipelineMsg>,
        completed: Arc<watch::Sender<bool>>,
    ) -> Self {
        Self {
            descriptor,
            pipeline,
            completed,
        }
    }

    pub(crate) fn session_id(&self) -> &str {
        &self.descriptor.session_id
    }

    pub(crate) async fn route(&self, kind: StreamKind, payload: Payload) -> Flow {
        match (kind, payload) {
            (StreamKind::Frames, Payload::Binary(bytes)) => {
                self.send(PipelineMsg::Frame(FrameImage::from_jpeg_bytes(&bytes))).await
            }
            (kind, payload) => {
                let parsed = match &payload {
                    Payload::Text(text) => serde_json::from_str::<Value>(text),
                    Payload::Binary(bytes) => serde_json::from_slice::<Value>(bytes),
                };
                match parsed {
                    Ok(message) => match kind {
                        StreamKind::Results => self.on_result(message).await,
                        StreamKind::LiveData => self.on_live_data(message).await,
                        StreamKind::Frames => self.on_frame(message).await,
                    },
                    Err(e) => {
                        warn!(session_id = %self.session_id(), stream = %kind, "Dropping malformed message: {}", e);
                        Flow::Continue
                    }
                }
            }
        }
    }

    /// Pass a fatal transport error on to the pipeline
    pub(crate) async fn fatal(&self, kind: StreamKind, error: crate::transport::TransportError) {
        let _ = self.pipeline.send(PipelineMsg::Fatal { stream: kind, error }).await;
    }

    async fn on_result(&self, record: Value) -> Flow {
        let terminal = is_results_terminal(&record);
        if terminal {
            // Stops reconnects on every stream of the session
            self.completed.send_replace(true);
        }
        match self.send(PipelineMsg::Result { record, terminal }).await {
            Flow::Continue if terminal => Flow::Close(CloseReason::Message),
            flow => flow,
        }
    }

    async fn on_live_data(&self, message: Value) -> Flow {
        if is_live_data_terminal(&message) {
            if let Some(history) = message.get("all_data").and_then(Value::as_array) {
                let records: Vec<NormalizedRecord> = history
                    .iter()
                    .map(|record| normalizer::normalize(&self.descriptor, record))
                    .collect();
                debug!(session_id = %self.session_id(), records = records.len(), "Replaying full live-data history");
                if let Flow::Close(reason) = self.send(PipelineMsg::Snapshot(records)).await {
                    return Flow::Close(reason);
                }
            }
            return Flow::Close(CloseReason::Message);
        }

        let record = normalizer::normalize(&self.descriptor, normalizer::unwrap_incremental(&message));
        if record.is_empty() {
            return Flow::Continue;
        }
        self.send(PipelineMsg::Points(record)).await
    }

    async fn on_frame(&self, message: Value) -> Flow {
        if let Some(encoded) = message.get("frame").and_then(Value::as_str) {
            if !encoded.is_empty() && encoded != "None" {
                if let Flow::Close(reason) = self.send(PipelineMsg::Frame(FrameImage::from_base64(encoded))).await {
                    return Flow::Close(reason);
                }
            }
        }
        if message.get("message").and_then(Value::as_str) == Some(FRAMES_DONE) {
            return Flow::Close(CloseReason::Message);
        }
        Flow::Continue
    }

    async fn send(&self, msg: PipelineMsg) -> Flow {
        match self.pipeline.send(msg).await {
            Ok(()) => Flow::Continue,
            // Pipeline gone: the session is being torn down
            Err(_) => Flow::Close(CloseReason::Teardown),
        }
    }
}

fn status_is_terminal(message: &Value) -> bool {
    matches!(
        message.get("status").and_then(Value::as_str),
        Some("completed") | Some("error")
    )
}

pub(crate) fn is_results_terminal(message: &Value) -> bool {
    status_is_terminal(message) || message.get("message").and_then(Value::as_str) == Some(RESULTS_DONE)
}

pub(crate) fn is_live_data_terminal(message: &Value) -> bool {
    message.get("is_final").and_then(Value::as_bool) == Some(true)
        || status_is_terminal(message)
        || message.get("message").and_then(Value::as_str) == Some(LIVE_DATA_DONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn router() -> (MessageRouter, mpsc::Receiver<PipelineMsg>, watch::Receiver<bool>) {
        let (tx, rx) = mpsc::channel(16);
        let (completed_tx, completed_rx) = watch::channel(false);
        let descriptor = SessionDescriptor::new("s1", "retail", "store_analytics", "1", "cam");
        (MessageRouter::new(descriptor, tx, Arc::new(completed_tx)), rx, completed_rx)
    }

    #[test]
    fn test_terminal_markers() {
        assert!(is_results_terminal(&json!({"status": "completed"})));
        assert!(is_results_terminal(&json!({"status": "error"})));
        assert!(is_results_terminal(&json!({"message": "processing completed"})));
        assert!(!is_results_terminal(&json!({"status": "running"})));

        assert!(is_live_data_terminal(&json!({"is_final": true, "all_data": []})));
        assert!(is_live_data_terminal(&json!({"message": "live data completed"})));
        assert!(!is_live_data_terminal(&json!({"is_final": false})));
    }

    #[tokio::test]
    async fn test_terminal_result_marks_completed() {
        let (router, mut rx, completed) = router();
        let flow = router
            .route(StreamKind::Results, Payload::Text(r#"{"status":"completed","person_count":4}"#.into()))
            .await;

        assert_eq!(flow, Flow::Close(CloseReason::Message));
        assert!(*completed.borrow());
        match rx.recv().await.unwrap() {
            PipelineMsg::Result { record, terminal } => {
                assert!(terminal);
                assert_eq!(record["person_count"], 4);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_message_is_dropped() {
        let (router, mut rx, _completed) = router();
        let flow = router.route(StreamKind::LiveData, Payload::Text("{not json".into())).await;
        assert_eq!(flow, Flow::Continue);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_final_live_data_replays_history() {
        let (router, mut rx, completed) = router();
        let message = json!({
            "is_final": true,
            "all_data": [
                {"Frame_no": 1, "Number of Persons": 5},
                {"Frame_no": 2, "Number of Persons": 7}
            ]
        });
        let flow = router.route(StreamKind::LiveData, Payload::Text(message.to_string())).await;

        assert_eq!(flow, Flow::Close(CloseReason::Message));
        assert!(!*completed.borrow());
        match rx.recv().await.unwrap() {
            PipelineMsg::Snapshot(records) => assert_eq!(records.len(), 2),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrapped_incremental_record() {
        let (router, mut rx, _completed) = router();
        let message = json!({"latest_data": {"Frame_no": 9, "Number of Persons": 1}});
        router.route(StreamKind::LiveData, Payload::Text(message.to_string())).await;
        match rx.recv().await.unwrap() {
            PipelineMsg::Points(record) => assert_eq!(record.frame_index, Some(9)),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_frame_messages() {
        let (router, mut rx, _completed) = router();

        let flow = router
            .route(StreamKind::Frames, Payload::Text(r#"{"frame":"QUJD"}"#.into()))
            .await;
        assert_eq!(flow, Flow::Continue);
        assert!(matches!(rx.recv().await, Some(PipelineMsg::Frame(_))));

        let flow = router.route(StreamKind::Frames, Payload::Binary(vec![0xFF, 0xD8])).await;
        assert_eq!(flow, Flow::Continue);
        assert!(matches!(rx.recv().await, Some(PipelineMsg::Frame(_))));

        let flow = router
            .route(StreamKind::Frames, Payload::Text(r#"{"message":"live frames completed"}"#.into()))
            .await;
        assert_eq!(flow, Flow::Close(CloseReason::Message));
    }

    #[tokio::test]
    async fn test_closed_pipeline_means_teardown() {
        let (router, rx, _completed) = router();
        drop(rx);
        let flow = router
            .route(StreamKind::Frames, Payload::Binary(vec![1, 2, 3]))
            .await;
        assert_eq!(flow, Flow::Close(CloseReason::Teardown));
    }
}
