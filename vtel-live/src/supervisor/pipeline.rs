//! Per-session pipeline
//!
//! The single writer for one session: every stream task funnels its messages
//! through an mpsc channel into this actor, which owns the session's
//! [`DispatchThrottler`] and is the only code that updates the cache entry.

use crate::cache::SessionCache;
use crate::normalizer::NormalizedRecord;
use crate::series::{SeriesPatch, SeriesPoint};
use crate::session::{FrameImage, SessionId, SessionUpdate};
use crate::throttle::DispatchThrottler;
use crate::transport::TransportError;
use chrono::Utc;
use serde_json::Value;
use std::ops::ControlFlow;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use vtel_common::events::{EventBus, StreamKind, TelemetryEvent};

#[derive(Debug)]
pub(crate) enum PipelineMsg {
    /// Structured result snapshot; applied immediately
    Result { record: Value, terminal: bool },
    /// One incremental live-data record; throttled
    Points(NormalizedRecord),
    /// Full live-data history replayed at stream end
    Snapshot(Vec<NormalizedRecord>),
    /// Latest frame; throttled, latest wins
    Frame(FrameImage),
    /// Unrecoverable protocol failure on one stream
    Fatal { stream: StreamKind, error: TransportError },
}

pub(crate) struct Pipeline {
    session_id: SessionId,
    cache: SessionCache,
    events: EventBus,
    throttler: DispatchThrottler,
    rx: mpsc::Receiver<PipelineMsg>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub(crate) fn new(
        session_id: SessionId,
        cache: SessionCache,
        events: EventBus,
        throttler: DispatchThrottler,
        rx: mpsc::Receiver<PipelineMsg>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            cache,
            events,
            throttler,
            rx,
            cancel,
        }
    }

    /// Run until teardown or until every stream task has finished
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                // Ahead of the queue so a busy stream cannot postpone a due flush
                _ = self.throttler.wait_due(), if self.throttler.is_pending() => self.flush().await,

                msg = self.rx.recv() => match msg {
                    Some(msg) => {
                        if self.handle(msg).await.is_break() {
                            break;
                        }
                    }
                    None => {
                        debug!(session_id = %self.session_id, "All streams finished");
                        break;
                    }
                },
            }
        }

        // Messages already queued by the stream tasks still count
        while let Ok(msg) = self.rx.try_recv() {
            if let PipelineMsg::Fatal { .. } = msg {
                continue;
            }
            let _ = self.handle(msg).await;
        }
        self.flush().await;
        debug!(session_id = %self.session_id, "Pipeline stopped");
    }

    async fn handle(&mut self, msg: PipelineMsg) -> ControlFlow<()> {
        match msg {
            PipelineMsg::Result { record, terminal } => {
                let status = terminal.then(|| terminal_status(&record));
                self.cache
                    .apply_update(
                        &self.session_id,
                        SessionUpdate {
                            result: Some(record),
                            completed: terminal,
                            ..Default::default()
                        },
                    )
                    .await;
                if let Some(status) = status {
                    info!(session_id = %self.session_id, status = %status, "Session completed");
                    self.events.emit_lossy(TelemetryEvent::SessionCompleted {
                        session_id: self.session_id.clone(),
                        status,
                        timestamp: Utc::now(),
                    });
                }
            }
            PipelineMsg::Points(record) => self.throttler.push_record(record),
            PipelineMsg::Frame(frame) => self.throttler.push_frame(frame),
            PipelineMsg::Snapshot(records) => {
                self.flush().await;
                if let Some(update) = snapshot_update(records) {
                    self.cache.apply_update(&self.session_id, update).await;
                }
            }
            PipelineMsg::Fatal { stream, error } => {
                error!(session_id = %self.session_id, stream = %stream, "Unrecoverable stream error: {}", error);
                self.flush().await;
                let message = format!("{} stream: {}", stream, error);
                self.cache
                    .apply_update(
                        &self.session_id,
                        SessionUpdate {
                            error: Some(message.clone()),
                            ..Default::default()
                        },
                    )
                    .await;
                self.events.emit_lossy(TelemetryEvent::SessionFailed {
                    session_id: self.session_id.clone(),
                    error: message,
                    timestamp: Utc::now(),
                });
                self.cancel.cancel();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn flush(&mut self) {
        if let Some(update) = self.throttler.take() {
            debug!(session_id = %self.session_id, points = update.point_count(), "Flushing buffered updates");
            self.cache.apply_update(&self.session_id, update).await;
        }
    }
}

fn terminal_status(record: &Value) -> String {
    record
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("completed")
        .to_string()
}

/// Fold a replayed history into one update, one patch per series
fn snapshot_update(records: Vec<NormalizedRecord>) -> Option<SessionUpdate> {
    let mut grouped: Vec<(&'static str, Vec<SeriesPoint>)> = Vec::new();
    let mut frame_index: Option<u64> = None;

    for record in records {
        if let Some(index) = record.frame_index {
            frame_index = Some(frame_index.map_or(index, |seen| seen.max(index)));
        }
        for named in record.points {
            match grouped.iter_mut().find(|(name, _)| *name == named.series) {
                Some((_, points)) => points.push(named.point),
                None => grouped.push((named.series, vec![named.point])),
            }
        }
    }

    if grouped.is_empty() {
        return None;
    }
    Some(SessionUpdate {
        series: grouped
            .into_iter()
            .map(|(name, points)| SeriesPatch::from_points(name, points))
            .collect(),
        frame_index,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::NamedPoint;
    use crate::series::MergeMode;
    use crate::session::SessionDescriptor;
    use std::time::Duration;

    fn record(x: i64, y: f64) -> NormalizedRecord {
        NormalizedRecord {
            points: vec![NamedPoint {
                series: "Persons Count",
                point: SeriesPoint::new(x, y),
            }],
            frame: None,
            frame_index: Some(x as u64),
        }
    }

    #[test]
    fn test_snapshot_update_groups_by_series() {
        let update = snapshot_update(vec![record(1, 5.0), record(2, 7.0)]).unwrap();
        assert_eq!(update.series.len(), 1);
        assert_eq!(update.series[0].mode, MergeMode::Replace);
        assert_eq!(update.point_count(), 2);
        assert_eq!(update.frame_index, Some(2));
    }

    #[test]
    fn test_empty_snapshot_is_noop() {
        assert!(snapshot_update(Vec::new()).is_none());
    }

    #[test]
    fn test_terminal_status() {
        assert_eq!(terminal_status(&serde_json::json!({"status": "error"})), "error");
        assert_eq!(terminal_status(&serde_json::json!({"message": "processing completed"})), "completed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_due_flush_runs_before_queued_messages() {
        let events = EventBus::new(64);
        let mut updates = events.subscribe();
        let cache = SessionCache::new(4, events.clone());
        cache
            .upsert(SessionDescriptor::new("s1", "retail", "store_analytics", "1", "cam"))
            .await;

        let mut throttler = DispatchThrottler::new(Duration::from_millis(500));
        throttler.push_record(record(1, 1.0));
        tokio::time::advance(Duration::from_millis(600)).await;

        let (tx, rx) = mpsc::channel(16);
        for x in 2..12 {
            tx.send(PipelineMsg::Points(record(x, 1.0))).await.unwrap();
        }
        drop(tx);

        Pipeline::new("s1".to_string(), cache.clone(), events, throttler, rx, CancellationToken::new())
            .run()
            .await;

        let flushed: Vec<usize> = std::iter::from_fn(|| updates.try_recv().ok())
            .filter_map(|event| match event {
                TelemetryEvent::SessionUpdated { points, .. } => Some(points),
                _ => None,
            })
            .collect();
        assert_eq!(flushed, vec![1, 10]);
        let state = cache.get_session("s1").await.unwrap();
        assert_eq!(state.series("Persons Count").unwrap().points.len(), 11);
    }
}
