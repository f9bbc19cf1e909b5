//! Payload normalizer
//!
//! Turns one raw detection record into named series points plus an optional
//! frame image, driven entirely by the rule catalogue. Pure: no state, no I/O.

use crate::rules::{Coercion, FieldRule};
use crate::series::{SeriesPoint, SeriesX};
use crate::session::{FrameImage, SessionDescriptor};
use serde_json::{Map, Value};

/// Sentinel the producer writes into `Frame` when no image is attached
const NO_FRAME: &str = "None";

/// 2^53: larger frame indices are not exact as f64 and are treated as absent
const MAX_FRAME_INDEX: f64 = 9_007_199_254_740_992.0;

/// A point addressed to one series
#[derive(Debug, Clone, PartialEq)]
pub struct NamedPoint {
    pub series: &'static str,
    pub point: SeriesPoint,
}

/// Output of [`normalize`] for a single record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRecord {
    pub points: Vec<NamedPoint>,
    pub frame: Option<FrameImage>,
    /// Numeric frame index, when the record carried one
    pub frame_index: Option<u64>,
}

impl NormalizedRecord {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.frame.is_none() && self.frame_index.is_none()
    }
}

/// Normalize a record, falling back to the local wall clock for the x-value
pub fn normalize(descriptor: &SessionDescriptor, record: &Value) -> NormalizedRecord {
    normalize_with_clock(descriptor, record, vtel_common::time::wall_clock_label)
}

/// Normalize a record with an injected wall-clock label source
pub fn normalize_with_clock<F>(descriptor: &SessionDescriptor, record: &Value, clock: F) -> NormalizedRecord
where
    F: FnOnce() -> String,
{
    let Some(fields) = record.as_object() else {
        return NormalizedRecord::default();
    };

    let frame_index = frame_index(fields);
    let frame = frame_image(fields);

    let points = match descriptor.rule() {
        Some(rule) if rule.requires_frame_index && frame_index.is_none() => Vec::new(),
        Some(rule) => {
            let x = resolve_x(fields, clock);
            rule.fields
                .iter()
                .map(|field| NamedPoint {
                    series: field.series,
                    point: SeriesPoint {
                        x: x.clone(),
                        y: coerce(field, fields.get(field.field)),
                    },
                })
                .collect()
        }
        // Unknown routing degrades to the empty generic series
        None => Vec::new(),
    };

    NormalizedRecord {
        points,
        frame,
        frame_index,
    }
}

/// Strip the envelope an incremental live-data message may arrive in
pub fn unwrap_incremental(message: &Value) -> &Value {
    ["latest_data", "data"]
        .iter()
        .filter_map(|key| message.get(*key))
        .find(|inner| inner.is_object())
        .unwrap_or(message)
}

/// x-value: `Timestamp`, else `Frame_no`, else rounded numeric `Frame`, else wall clock
fn resolve_x<F: FnOnce() -> String>(fields: &Map<String, Value>, clock: F) -> SeriesX {
    match fields.get("Timestamp") {
        Some(Value::Number(n)) => {
            if let Some(ts) = n.as_f64() {
                return SeriesX::Number(ts);
            }
        }
        Some(Value::String(s)) if !s.is_empty() => return SeriesX::Label(s.clone()),
        _ => {}
    }

    match frame_index(fields) {
        Some(index) => SeriesX::Number(index as f64),
        None => SeriesX::Label(clock()),
    }
}

fn frame_index(fields: &Map<String, Value>) -> Option<u64> {
    fields
        .get("Frame_no")
        .and_then(as_number)
        .or_else(|| fields.get("Frame").and_then(Value::as_f64))
        .filter(|n| n.is_finite() && (0.0..=MAX_FRAME_INDEX).contains(n))
        .map(|n| n.round() as u64)
}

fn frame_image(fields: &Map<String, Value>) -> Option<FrameImage> {
    match fields.get("Frame") {
        Some(Value::String(encoded)) if !encoded.is_empty() && encoded != NO_FRAME => {
            Some(FrameImage::from_base64(encoded))
        }
        _ => None,
    }
}

fn coerce(field: &FieldRule, value: Option<&Value>) -> f64 {
    match field.coercion {
        Coercion::Number => value.and_then(as_number).unwrap_or(0.0),
        Coercion::Alert => match value {
            Some(Value::Bool(true)) => 1.0,
            Some(Value::String(s)) if s == "True" => 1.0,
            Some(Value::Number(n)) if n.as_f64() == Some(1.0) => 1.0,
            _ => 0.0,
        },
        Coercion::Percentage => value
            .and_then(|v| match v {
                Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
                other => other.as_f64(),
            })
            .filter(|n: &f64| n.is_finite())
            .unwrap_or(0.0),
    }
}

/// JSON number, or a string that parses as one
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}
