//! Collapses a per-sample boolean event column into merged time ranges.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Label given to ranges built from the speeding evidence column.
pub const DEFAULT_LABEL: &str = "Speeding";

/// Source tag given to ranges built from the speeding evidence column.
pub const DEFAULT_SOURCE: &str = "SPEEDING_RANGE";

/// One merged interval of consecutive positive samples, in video time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRange {
    pub t: f64,
    pub duration_seconds: f64,
    pub label: String,
    pub source: String,
}

/// One provider row reduced to what the builder needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub t: f64,
    pub is_event: bool,
}

impl EventRow {
    pub fn new(t: f64, is_event: bool) -> Self {
        Self { t, is_event }
    }

    /// Reads a raw provider row: time in the first column, the event flag
    /// in the last.
    ///
    /// Non-array rows read as `(NaN, false)` and are skipped by the builder.
    pub fn from_json(row: &Value) -> Self {
        let cols = row.as_array().map(Vec::as_slice).unwrap_or(&[]);
        let t = cols.first().and_then(json_number).unwrap_or(f64::NAN);
        let is_event = cols.last().map(json_truthy).unwrap_or(false);
        Self { t, is_event }
    }
}

fn json_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |x| x != 0.0 && !x.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Builds merged ranges from event rows.
#[derive(Debug, Clone)]
pub struct EventRangeBuilder {
    label: String,
    source: String,
}

impl Default for EventRangeBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL, DEFAULT_SOURCE)
    }
}

impl EventRangeBuilder {
    pub fn new(label: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            source: source.into(),
        }
    }

    /// Walks consecutive row pairs and emits one range per run of positive
    /// leading rows, shifted by `offset`.
    ///
    /// Pairs with a non-finite or non-increasing time are skipped without
    /// closing the open range. Zero-length ranges are never emitted.
    pub fn build(&self, rows: &[EventRow], offset: f64) -> Vec<EventRange> {
        let mut out = Vec::new();
        if rows.len() < 2 {
            return out;
        }

        let mut open: Option<(f64, f64)> = None;
        for pair in rows.windows(2) {
            let (r0, r1) = (pair[0], pair[1]);
            if !r0.t.is_finite() || !r1.t.is_finite() || r1.t <= r0.t {
                continue;
            }

            if r0.is_event {
                open = Some(match open {
                    Some((start, _)) => (start, r1.t),
                    None => (r0.t, r1.t),
                });
            } else if let Some((start, end)) = open.take() {
                self.emit(&mut out, start, end, offset);
            }
        }

        if let Some((start, end)) = open {
            self.emit(&mut out, start, end, offset);
        }
        out
    }

    fn emit(&self, out: &mut Vec<EventRange>, start: f64, end: f64, offset: f64) {
        if end > start {
            out.push(EventRange {
                t: start + offset,
                duration_seconds: end - start,
                label: self.label.clone(),
                source: self.source.clone(),
            });
        }
    }
}

/// Ranges with the default speeding label and source.
pub fn build_event_ranges(rows: &[EventRow], offset: f64) -> Vec<EventRange> {
    EventRangeBuilder::default().build(rows, offset)
}
