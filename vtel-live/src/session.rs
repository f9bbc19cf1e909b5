//! Session data model
//!
//! A [`SessionState`] is owned by the session cache and mutated only through
//! [`SessionState::apply`]. Display code receives clones.

use crate::rules;
use crate::series::{self, LiveSeries, SeriesPatch};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque identifier of one analytics run
pub type SessionId = String;

/// Lowest upper bound offered for the frame progress axis
const FRAME_AXIS_FLOOR: u64 = 500;

/// Immutable description of a session, fixed when the job starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub session_id: SessionId,
    pub industry: String,
    pub sub_industry: String,
    pub rule_id: String,
    pub rule_name: String,
    pub source_label: String,
}

impl SessionDescriptor {
    /// Build a descriptor, resolving the rule name from the catalogue
    pub fn new(
        session_id: impl Into<SessionId>,
        industry: impl Into<String>,
        sub_industry: impl Into<String>,
        rule_id: impl Into<String>,
        source_label: impl Into<String>,
    ) -> Self {
        let industry = industry.into();
        let sub_industry = sub_industry.into();
        let rule_id = rule_id.into();
        let rule_name = rules::rule_name(&industry, &sub_industry, &rule_id);
        Self {
            session_id: session_id.into(),
            industry,
            sub_industry,
            rule_id,
            rule_name,
            source_label: source_label.into(),
        }
    }

    /// Catalogue entry for this session's rule, if known
    pub fn rule(&self) -> Option<&'static rules::RuleSpec> {
        rules::lookup(&self.industry, &self.sub_industry, &self.rule_id)
    }
}

/// Latest JPEG snapshot, kept as a data URL ready for an `<img>` tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameImage {
    pub data_url: String,
}

impl FrameImage {
    pub fn from_base64(encoded: &str) -> Self {
        Self {
            data_url: format!("data:image/jpeg;base64,{}", encoded),
        }
    }

    pub fn from_jpeg_bytes(bytes: &[u8]) -> Self {
        Self::from_base64(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }
}

/// Partial update merged into a stored session
///
/// `result` and `frame` replace, `series` patches merge per their mode,
/// `completed` is OR-ed in and `frame_index` only ever raises the high-water mark.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub result: Option<Value>,
    pub series: Vec<SeriesPatch>,
    pub frame: Option<FrameImage>,
    pub completed: bool,
    pub frame_index: Option<u64>,
    pub error: Option<String>,
}

impl SessionUpdate {
    pub fn is_empty(&self) -> bool {
        self.result.is_none()
            && self.series.iter().all(|p| p.points.is_empty())
            && self.frame.is_none()
            && !self.completed
            && self.frame_index.is_none()
            && self.error.is_none()
    }

    /// Number of series points carried
    pub fn point_count(&self) -> usize {
        self.series.iter().map(|p| p.points.len()).sum()
    }
}

/// Mutable per-session state held by the cache
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub descriptor: SessionDescriptor,
    pub latest_result: Option<Value>,
    pub series: Vec<LiveSeries>,
    pub latest_frame: Option<FrameImage>,
    pub completed: bool,
    /// Greatest numeric frame index seen; drives progress display only
    pub frame_high_water: u64,
    /// Set when the pipeline stopped on an unrecoverable protocol error
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    /// Fresh state seeded with the rule's canonical (empty) series
    pub fn new(descriptor: SessionDescriptor) -> Self {
        let series = rules::canonical_series(
            &descriptor.industry,
            &descriptor.sub_industry,
            &descriptor.rule_id,
        )
        .into_iter()
        .map(LiveSeries::new)
        .collect();
        let now = Utc::now();
        Self {
            descriptor,
            latest_result: None,
            series,
            latest_frame: None,
            completed: false,
            frame_high_water: 0,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn series(&self, name: &str) -> Option<&LiveSeries> {
        self.series.iter().find(|s| s.name == name)
    }

    /// Raise the frame high-water mark; never lowers it
    pub fn observe_frame_index(&mut self, index: u64) {
        self.frame_high_water = self.frame_high_water.max(index);
    }

    /// Upper bound for a frame progress axis: high-water rounded up to 100, at least 500
    pub fn frame_axis_max(&self) -> u64 {
        let rounded = self.frame_high_water.div_ceil(100).saturating_mul(100);
        rounded.max(FRAME_AXIS_FLOOR)
    }

    /// Merge a partial update; returns the number of series points stored
    pub fn apply(&mut self, update: SessionUpdate) -> usize {
        let mut stored = 0;

        if let Some(result) = update.result {
            self.latest_result = Some(result);
        }
        for patch in update.series {
            stored += series::apply_patch(&mut self.series, patch);
        }
        if let Some(frame) = update.frame {
            self.latest_frame = Some(frame);
        }
        if update.completed {
            self.completed = true;
        }
        if let Some(index) = update.frame_index {
            self.observe_frame_index(index);
        }
        if update.error.is_some() {
            self.error = update.error;
        }

        self.updated_at = Utc::now();
        stored
    }
}

/// Read-side projection of a session for the display layer
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub state: SessionState,
    pub frame_axis_max: u64,
}

impl From<SessionState> for SessionView {
    fn from(state: SessionState) -> Self {
        let frame_axis_max = state.frame_axis_max();
        Self {
            state,
            frame_axis_max,
        }
    }
}
