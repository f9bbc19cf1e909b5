//! Named time series and the accumulator that merges points into them
//!
//! Every [`LiveSeries`] is kept sorted ascending by x and never holds two
//! points with the same x. Numeric x-values compare numerically; as soon as
//! either side is a label both are compared as strings.

use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// X-value of a series point: a frame index / numeric timestamp, or a time label
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SeriesX {
    Number(f64),
    Label(String),
}

impl SeriesX {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SeriesX::Number(n) => Some(*n),
            SeriesX::Label(_) => None,
        }
    }

    /// Ordering used for presentation
    ///
    /// Numeric if both sides are numbers, otherwise lexicographic on the
    /// string form. Mixed-type series are not guaranteed a total order.
    pub fn compare(&self, other: &SeriesX) -> Ordering {
        match (self, other) {
            (SeriesX::Number(a), SeriesX::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (SeriesX::Label(a), SeriesX::Label(b)) => a.cmp(b),
            _ => self.to_string().cmp(&other.to_string()),
        }
    }
}

/// Numeric `==` for numbers, exact string equality for labels, never across types
impl PartialEq for SeriesX {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SeriesX::Number(a), SeriesX::Number(b)) => a == b,
            (SeriesX::Label(a), SeriesX::Label(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for SeriesX {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesX::Number(n) if is_integral(*n) => write!(f, "{}", *n as i64),
            SeriesX::Number(n) => write!(f, "{}", n),
            SeriesX::Label(s) => f.write_str(s),
        }
    }
}

// Frame indices go out as JSON integers, not `12.0`
impl Serialize for SeriesX {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SeriesX::Number(n) if is_integral(*n) => serializer.serialize_i64(*n as i64),
            SeriesX::Number(n) => serializer.serialize_f64(*n),
            SeriesX::Label(s) => serializer.serialize_str(s),
        }
    }
}

fn is_integral(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15
}

impl From<f64> for SeriesX {
    fn from(n: f64) -> Self {
        SeriesX::Number(n)
    }
}

impl From<i64> for SeriesX {
    fn from(n: i64) -> Self {
        SeriesX::Number(n as f64)
    }
}

impl From<&str> for SeriesX {
    fn from(s: &str) -> Self {
        SeriesX::Label(s.to_string())
    }
}

impl From<String> for SeriesX {
    fn from(s: String) -> Self {
        SeriesX::Label(s)
    }
}

/// One `(x, y)` sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub x: SeriesX,
    pub y: f64,
}

impl SeriesPoint {
    pub fn new(x: impl Into<SeriesX>, y: f64) -> Self {
        Self { x: x.into(), y }
    }
}

/// How a patch is folded into an existing series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Insert point by point, dropping duplicates
    Merge,
    /// Discard the existing points and take the patch as a full snapshot
    Replace,
}

/// Points destined for one named series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPatch {
    pub name: String,
    pub points: Vec<SeriesPoint>,
    pub mode: MergeMode,
}

impl SeriesPatch {
    /// Patch whose mode follows the shape of the update
    ///
    /// More than one point is a full snapshot; a single point is an increment.
    pub fn from_points(name: impl Into<String>, points: Vec<SeriesPoint>) -> Self {
        let mode = if points.len() > 1 {
            MergeMode::Replace
        } else {
            MergeMode::Merge
        };
        Self {
            name: name.into(),
            points,
            mode,
        }
    }

    /// Coalesced increments; always merged regardless of size
    pub fn increment(name: impl Into<String>, points: Vec<SeriesPoint>) -> Self {
        Self {
            name: name.into(),
            points,
            mode: MergeMode::Merge,
        }
    }

    /// Full-history snapshot; always replaces
    pub fn snapshot(name: impl Into<String>, points: Vec<SeriesPoint>) -> Self {
        Self {
            name: name.into(),
            points,
            mode: MergeMode::Replace,
        }
    }
}

/// A named, ordered, deduplicated sequence of points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSeries {
    pub name: String,
    pub points: Vec<SeriesPoint>,
}

impl LiveSeries {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Insert one point at its sorted position
    ///
    /// Returns false (and changes nothing) when a point with an equal x exists.
    pub fn insert(&mut self, point: SeriesPoint) -> bool {
        if self.points.iter().any(|p| p.x == point.x) {
            return false;
        }
        let at = self
            .points
            .partition_point(|p| p.x.compare(&point.x) != Ordering::Greater);
        self.points.insert(at, point);
        true
    }

    /// Fold a patch into this series, returning the number of points stored
    pub fn apply(&mut self, patch: SeriesPatch) -> usize {
        if patch.mode == MergeMode::Replace {
            self.points.clear();
        }
        let mut stored = 0;
        for point in patch.points {
            if self.insert(point) {
                stored += 1;
            }
        }
        stored
    }
}

/// Merge one point into the named series of `series`, creating it if absent
///
/// Returns false when the point was a duplicate.
pub fn accumulate(series: &mut Vec<LiveSeries>, name: &str, point: SeriesPoint) -> bool {
    match series.iter_mut().find(|s| s.name == name) {
        Some(existing) => existing.insert(point),
        None => {
            let mut created = LiveSeries::new(name);
            created.insert(point);
            series.push(created);
            true
        }
    }
}

/// Fold a patch into the named series of `series`
///
/// An empty patch never creates a series.
pub fn apply_patch(series: &mut Vec<LiveSeries>, patch: SeriesPatch) -> usize {
    match series.iter_mut().find(|s| s.name == patch.name) {
        Some(existing) => existing.apply(patch),
        None if patch.points.is_empty() => 0,
        None => {
            let mut created = LiveSeries::new(patch.name.clone());
            let stored = created.apply(patch);
            series.push(created);
            stored
        }
    }
}
