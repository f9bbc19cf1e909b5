//! Dispatch throttler
//!
//! Buffers normalized points for one session and hands them to the cache as
//! a single batched [`SessionUpdate`] at most once per interval. The first
//! buffered item arms a trailing deadline; nothing is armed while idle, so an
//! interval without arrivals produces no flush.

use crate::normalizer::NormalizedRecord;
use crate::series::{SeriesPatch, SeriesPoint};
use crate::session::{FrameImage, SessionUpdate};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct DispatchThrottler {
    interval: Duration,
    deadline: Option<Instant>,
    /// Buffered points per series, series in first-arrival order
    points: Vec<(&'static str, Vec<SeriesPoint>)>,
    frame: Option<FrameImage>,
    frame_index: Option<u64>,
}

impl DispatchThrottler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
            points: Vec::new(),
            frame: None,
            frame_index: None,
        }
    }

    /// True while something is buffered and a flush is scheduled
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Number of buffered series points
    pub fn buffered_points(&self) -> usize {
        self.points.iter().map(|(_, p)| p.len()).sum()
    }

    /// Buffer the output of one normalized record
    pub fn push_record(&mut self, record: NormalizedRecord) {
        if let Some(index) = record.frame_index {
            self.frame_index = Some(self.frame_index.map_or(index, |seen| seen.max(index)));
        }
        let mut armed = false;
        for named in record.points {
            match self.points.iter_mut().find(|(name, _)| *name == named.series) {
                Some((_, buffered)) => buffered.push(named.point),
                None => self.points.push((named.series, vec![named.point])),
            }
            armed = true;
        }
        if let Some(frame) = record.frame {
            self.frame = Some(frame);
            armed = true;
        }
        if armed {
            self.arm();
        }
    }

    /// Buffer a frame; only the latest one survives until the flush
    pub fn push_frame(&mut self, frame: FrameImage) {
        self.frame = Some(frame);
        self.arm();
    }

    fn arm(&mut self) {
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.interval);
        }
    }

    /// Resolve once the armed deadline has passed; never resolves while idle
    pub async fn wait_due(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }

    /// Drain the buffer into one batched update, or `None` if nothing is buffered
    pub fn take(&mut self) -> Option<SessionUpdate> {
        self.deadline = None;
        if self.points.is_empty() && self.frame.is_none() {
            return None;
        }
        let series = self
            .points
            .drain(..)
            .map(|(name, points)| SeriesPatch::increment(name, points))
            .collect();
        Some(SessionUpdate {
            series,
            frame: self.frame.take(),
            frame_index: self.frame_index.take(),
            ..Default::default()
        })
    }
}
