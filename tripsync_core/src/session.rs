//! One loaded trip: sync shift, filters, event ranges and cursor state.
//!
//! A session keeps the raw [`TripDocument`] it was built from. Every change
//! that alters the time base (sync override) or a derived series (filter
//! settings) re-derives from that raw document, so no filter or axis state
//! survives across time bases.

use crate::config::{CursorConfig, FilterConfig, FilterKind};
use crate::cursor::{AxisPolicy, CursorEngine, CursorSeries, SeriesTick, TickGate};
use crate::error::{Result, TripError};
use crate::events::{build_event_ranges, EventRange, EventRow};
use crate::geo::heading_at;
use crate::gps;
use crate::kalman;
use crate::moving_average;
use crate::series::{max_finite, step_resample, GeoTrace, TimeSeries};
use crate::sync::{effective_offset, SyncOverrideStore};
use crate::time_index::{interpolate, nearest_index};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use tripsync_env::TripId;

/// Cursor key of the GPS ground-speed panel.
pub const GPS_SPEED_KEY: &str = "gps_speed";

/// One scalar series as supplied by the data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesDocument {
    pub key: String,
    #[serde(flatten)]
    pub data: TimeSeries,
    #[serde(default)]
    pub policy: AxisPolicy,
    #[serde(default)]
    pub filter: FilterConfig,
}

/// GPS trace plus its optional overlays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsDocument {
    #[serde(flatten)]
    pub trace: GeoTrace,
    /// Posted speed limit (km/h), sampled on its own timeline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_limit: Option<TimeSeries>,
    #[serde(default)]
    pub filter: FilterConfig,
}

/// Everything needed to replay one trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDocument {
    pub id: TripId,
    /// `dataStart - videoStart` in seconds
    #[serde(default)]
    pub offset_seconds: f64,
    #[serde(default)]
    pub series: Vec<SeriesDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsDocument>,
    /// Raw event rows: time first, event flag last
    #[serde(default)]
    pub event_rows: Vec<serde_json::Value>,
}

impl TripDocument {
    pub fn new(id: TripId, offset_seconds: f64) -> Self {
        Self {
            id,
            offset_seconds,
            series: Vec::new(),
            gps: None,
            event_rows: Vec::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let doc: Self = serde_json::from_str(json)?;
        if !doc.offset_seconds.is_finite() {
            return Err(TripError::document("offsetSeconds must be finite"));
        }
        Ok(doc)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Re-applies the provider-input normalization of [`TimeSeries::from_raw`]
    /// and [`GeoTrace::from_raw`] to every series and trace.
    ///
    /// Deserialized documents are already normalized; this covers documents
    /// assembled in code through the public fields.
    pub fn normalize(&mut self) {
        for doc in &mut self.series {
            let data = std::mem::take(&mut doc.data);
            doc.data = TimeSeries::from_raw(data.t, data.v);
        }
        if let Some(gps) = self.gps.as_mut() {
            let trace = std::mem::take(&mut gps.trace);
            gps.trace = GeoTrace::from_raw(trace.t, trace.lat, trace.lon, trace.speed_kmh);
            if let Some(limit) = gps.speed_limit.take() {
                gps.speed_limit = Some(TimeSeries::from_raw(limit.t, limit.v));
            }
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(TripError::from)
    }
}

/// Filters one scalar series. `None` when the filter is off.
pub fn apply_filter(t: &[f64], v: &[f64], config: &FilterConfig) -> Option<Vec<f64>> {
    let config = config.sanitized();
    match config.kind {
        FilterKind::None => None,
        FilterKind::Ma => Some(moving_average::centered(v, config.ma_window)),
        FilterKind::Kalman => Some(kalman::smooth(t, v, config.sigma_a, config.sigma_z)),
    }
}

/// Map marker state at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsCursor {
    pub lat: f64,
    pub lon: f64,
    pub heading_deg: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub speed_limit_kmh: Option<f64>,
}

/// Output of one evaluated tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickFrame {
    pub video_time: f64,
    pub series: Vec<SeriesTick>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsCursor>,
}

/// Session tuning that is not part of the trip data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionOptions {
    pub cursor: CursorConfig,
    /// Keep every n-th provider sample (1 keeps all)
    pub downsample: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            cursor: CursorConfig::default(),
            downsample: 1,
        }
    }
}

/// A loaded trip, ready to be ticked.
pub struct TripSession {
    document: TripDocument,
    options: SessionOptions,
    override_seconds: Option<f64>,
    offset: f64,
    generation: u64,

    /// Shifted raw GPS trace
    gps_raw: GeoTrace,
    /// Filtered GPS trace, in video time
    gps: GeoTrace,
    speed_limit: Option<Vec<f64>>,
    events: Vec<EventRange>,

    cursor: CursorEngine,
    gate: TickGate,
}

impl TripSession {
    /// Loads a trip with an explicit override.
    pub fn load(mut document: TripDocument, override_seconds: Option<f64>, options: SessionOptions) -> Self {
        document.normalize();
        let mut session = Self {
            document,
            options,
            override_seconds: None,
            offset: 0.0,
            generation: 0,
            gps_raw: GeoTrace::default(),
            gps: GeoTrace::default(),
            speed_limit: None,
            events: Vec::new(),
            cursor: CursorEngine::new(options.cursor),
            gate: TickGate::from_hz(options.cursor.tick_hz),
        };
        session.reload(override_seconds);
        session
    }

    /// Loads a trip, reading its override from `store`.
    pub fn load_with_store(document: TripDocument, store: &dyn SyncOverrideStore, options: SessionOptions) -> Self {
        let override_seconds = store.get(&document.id);
        Self::load(document, override_seconds, options)
    }

    /// Re-derives everything from the raw document under a new override.
    ///
    /// All cursor and filter state from the previous time base is dropped.
    pub fn reload(&mut self, override_seconds: Option<f64>) {
        self.override_seconds = override_seconds.filter(|v| v.is_finite());
        self.offset = effective_offset(self.document.offset_seconds, self.override_seconds);
        self.generation += 1;

        let stride = self.options.downsample.max(1);
        let offset = self.offset;

        self.gps_raw = self
            .document
            .gps
            .as_ref()
            .map(|g| g.trace.downsampled(stride).shifted(offset))
            .unwrap_or_default();
        self.derive_gps();

        let rows: Vec<EventRow> = self.document.event_rows.iter().map(EventRow::from_json).collect();
        self.events = build_event_ranges(&rows, offset);

        self.cursor = CursorEngine::new(self.options.cursor);
        self.cursor.load(self.build_cursor_series());
        self.gate.reset();

        info!(
            trip = %self.document.id,
            offset = self.offset,
            overridden = self.override_seconds.is_some(),
            series = self.document.series.len(),
            events = self.events.len(),
            generation = self.generation,
            "trip loaded"
        );
    }

    /// Stores a new override and reloads under it.
    pub fn set_override(&mut self, store: &dyn SyncOverrideStore, value: Option<f64>) -> Result<()> {
        store.set(&self.document.id, value)?;
        let effective = store.get(&self.document.id);
        self.reload(effective);
        Ok(())
    }

    /// Changes the filter of one scalar series; `false` if the key is unknown.
    pub fn set_filter(&mut self, key: &str, config: FilterConfig) -> bool {
        let Some(doc) = self.document.series.iter_mut().find(|s| s.key == key) else {
            return false;
        };
        doc.filter = config;
        debug!(key, kind = config.kind.name(), "series filter changed");
        self.cursor.load(self.build_cursor_series());
        true
    }

    /// Changes the filter of every scalar series.
    pub fn set_filter_all(&mut self, config: FilterConfig) {
        for doc in &mut self.document.series {
            doc.filter = config;
        }
        self.cursor.load(self.build_cursor_series());
    }

    /// Changes the GPS filter and re-derives the trace.
    pub fn set_gps_filter(&mut self, config: FilterConfig) {
        if let Some(gps) = self.document.gps.as_mut() {
            gps.filter = config;
        }
        self.derive_gps();
        self.cursor.load(self.build_cursor_series());
    }

    fn derive_gps(&mut self) {
        let Some(doc) = self.document.gps.as_ref() else {
            self.gps = GeoTrace::default();
            self.speed_limit = None;
            return;
        };
        self.gps = gps::fuse(&self.gps_raw, &doc.filter);
        self.speed_limit = doc.speed_limit.as_ref().map(|limit| {
            let limit = limit.downsampled(self.options.downsample.max(1)).shifted(self.offset);
            step_resample(&limit.t, &limit.v, &self.gps.t)
        });
    }

    fn build_cursor_series(&self) -> Vec<CursorSeries> {
        let stride = self.options.downsample.max(1);
        let mut out: Vec<CursorSeries> = self
            .document
            .series
            .iter()
            .map(|doc| {
                let data = doc.data.downsampled(stride).shifted(self.offset);
                let filtered = apply_filter(&data.t, &data.v, &doc.filter);
                let policy = doc.policy.resolve(&[max_finite(&data.v)]);
                let mut series = CursorSeries::new(doc.key.clone(), data.t, data.v).with_policy(policy);
                series.filtered = filtered;
                series
            })
            .collect();

        if let Some(speed) = self.gps_raw.speed_kmh.as_ref() {
            if !out.iter().any(|s| s.key == GPS_SPEED_KEY) {
                let limit_max = self.speed_limit.as_deref().and_then(max_finite);
                let policy = AxisPolicy::Fixed { max: None }.resolve(&[max_finite(speed), limit_max]);
                out.push(
                    CursorSeries::new(GPS_SPEED_KEY, self.gps_raw.t.clone(), speed.clone()).with_policy(policy),
                );
            }
        }
        out
    }

    /// Gated tick: `None` when it arrives faster than the tick interval.
    pub fn tick(&mut self, now: Duration, video_time: f64) -> Option<TickFrame> {
        if !self.gate.admit(now) {
            return None;
        }
        Some(self.evaluate(video_time))
    }

    /// Evaluates the cursor at `video_time` regardless of the tick gate.
    pub fn evaluate(&mut self, video_time: f64) -> TickFrame {
        TickFrame {
            video_time,
            series: self.cursor.tick(video_time),
            gps: self.gps_cursor(video_time),
        }
    }

    fn gps_cursor(&self, video_time: f64) -> Option<GpsCursor> {
        let lat = interpolate(&self.gps.t, &self.gps.lat, video_time)?;
        let lon = interpolate(&self.gps.t, &self.gps.lon, video_time)?;
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        let idx = nearest_index(&self.gps.t, video_time)?;
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        // Filtered speed lives on the filtered timeline, raw speed on the raw one
        let speed = match (&self.gps.speed_kmh, &self.gps_raw.speed_kmh) {
            (Some(filtered), _) => interpolate(&self.gps.t, filtered, video_time),
            (None, Some(raw)) => interpolate(&self.gps_raw.t, raw, video_time),
            (None, None) => None,
        };
        let limit = self.speed_limit.as_ref().and_then(|l| l.get(idx).copied());
        Some(GpsCursor {
            lat,
            lon,
            heading_deg: heading_at(&self.gps.lat, &self.gps.lon, idx),
            speed_kmh: finite(speed),
            speed_limit_kmh: finite(limit),
        })
    }

    pub fn id(&self) -> &TripId {
        &self.document.id
    }

    pub fn document(&self) -> &TripDocument {
        &self.document
    }

    /// Offset currently applied to every timestamp.
    pub fn effective_offset(&self) -> f64 {
        self.offset
    }

    pub fn override_seconds(&self) -> Option<f64> {
        self.override_seconds
    }

    /// Incremented by every reload.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn events(&self) -> &[EventRange] {
        &self.events
    }

    /// Filtered GPS trace in video time.
    pub fn gps(&self) -> &GeoTrace {
        &self.gps
    }

    /// Speed limit stepped onto the GPS timeline.
    pub fn speed_limit(&self) -> Option<&[f64]> {
        self.speed_limit.as_deref()
    }

    pub fn cursor(&self) -> &CursorEngine {
        &self.cursor
    }

    /// Video-time span covered by the loaded series and GPS trace.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        let times = self
            .cursor
            .series()
            .iter()
            .flat_map(|s| s.t.iter())
            .chain(self.gps.t.iter())
            .copied()
            .filter(|t| t.is_finite());
        times.fold(None, |acc, t| match acc {
            None => Some((t, t)),
            Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::MemoryOverrideStore;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn sample_doc() -> TripDocument {
        let json = json!({
            "id": "D1|20151110175712-16km-D1-NORMAL1-SECONDARY",
            "offsetSeconds": 2.0,
            "series": [
                { "key": "accel_x", "t": [0, 1, 2, 3, 4], "v": [0.1, -0.3, 0.2, null, 0.0],
                  "policy": { "type": "symmetricAroundZero" } },
                { "key": "veh_dist", "t": [0, 2, 4], "v": [10, 12, 9],
                  "policy": { "type": "nonNegative" } }
            ],
            "gps": {
                "t": [0, 1, 2], "lat": [40, 40.00001, 40.00002], "lon": [-3, -3, -3],
                "speedKmh": [0, 4, 4],
                "speedLimit": { "t": [0], "v": [50] }
            },
            "eventRows": [[0, 0], [1, 1], [2, 1], [3, 0]]
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_load_shifts_everything() {
        let session = TripSession::load(sample_doc(), None, SessionOptions::default());
        assert_eq!(session.effective_offset(), 2.0);
        assert_eq!(session.gps().t, vec![2.0, 3.0, 4.0]);
        assert_eq!(session.events()[0].t, 3.0);
        assert_eq!(session.events()[0].duration_seconds, 2.0);
        assert_eq!(session.cursor().series()[0].t[0], 2.0);
        assert_eq!(session.speed_limit(), Some(&[50.0, 50.0, 50.0][..]));
        assert_eq!(session.time_span(), Some((2.0, 6.0)));
    }

    #[test]
    fn test_override_wins_and_resets_axes() {
        let store = MemoryOverrideStore::new();
        let mut session = TripSession::load_with_store(sample_doc(), &store, SessionOptions::default());
        session.evaluate(3.0);
        assert!(session.cursor().axis_window("accel_x").unwrap().min.is_some());

        session.set_override(&store, Some(-1.0)).unwrap();
        assert_eq!(session.effective_offset(), -1.0);
        assert_eq!(session.generation(), 2);
        assert!(session.cursor().axis_window("accel_x").unwrap().min.is_none());
        assert_eq!(session.gps().t[0], -1.0);

        session.set_override(&store, None).unwrap();
        assert_eq!(session.effective_offset(), 2.0);
    }

    #[test]
    fn test_tick_frame_contents() {
        let mut session = TripSession::load(sample_doc(), Some(0.0), SessionOptions::default());
        let frame = session.evaluate(1.0);
        let keys: Vec<&str> = frame.series.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["accel_x", "veh_dist", GPS_SPEED_KEY]);

        let accel = &frame.series[0];
        assert_relative_eq!(accel.axis_max, -accel.axis_min);
        let dist = &frame.series[1];
        assert_eq!(dist.axis_min, 0.0);
        let speed = &frame.series[2];
        assert_eq!((speed.axis_min, speed.axis_max), (0.0, 50.0));

        let gps = frame.gps.unwrap();
        assert_relative_eq!(gps.lat, 40.00001, epsilon = 1e-12);
        assert_relative_eq!(gps.heading_deg.unwrap(), 0.0, epsilon = 1e-6);
        assert_eq!(gps.speed_limit_kmh, Some(50.0));
    }

    #[test]
    fn test_tick_is_gated() {
        let mut session = TripSession::load(sample_doc(), None, SessionOptions::default());
        assert!(session.tick(Duration::from_millis(0), 2.0).is_some());
        assert!(session.tick(Duration::from_millis(5), 2.1).is_none());
        assert!(session.tick(Duration::from_millis(40), 2.2).is_some());
    }

    #[test]
    fn test_set_filter() {
        let mut session = TripSession::load(sample_doc(), Some(0.0), SessionOptions::default());
        assert!(session.cursor().series()[0].filtered.is_none());

        assert!(session.set_filter("accel_x", FilterConfig::moving_average(3)));
        let filtered = session.cursor().series()[0].filtered.clone().unwrap();
        assert_relative_eq!(filtered[0], -0.1, epsilon = 1e-12);
        assert!(!session.set_filter("missing", FilterConfig::default()));
    }

    #[test]
    fn test_gps_kalman_filter_derives_speed() {
        let mut session = TripSession::load(sample_doc(), Some(0.0), SessionOptions::default());
        session.set_gps_filter(FilterConfig::kalman(0.0, 0.0));
        let gps = session.gps();
        assert!(gps.speed_kmh.is_some());
        for (a, b) in gps.lat.iter().zip([40.0, 40.00001, 40.00002]) {
            assert_relative_eq!(*a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_document_round_trip_keeps_gaps() {
        let doc = sample_doc();
        let json = doc.to_json_pretty().unwrap();
        let back = TripDocument::from_json_str(&json).unwrap();
        assert!(back.series[0].data.v[3].is_nan());
        assert_eq!(back.id, doc.id);
    }

    #[test]
    fn test_invalid_document() {
        assert!(matches!(
            TripDocument::from_json_str(r#"{ "id": "" }"#),
            Err(TripError::InvalidDocument(_))
        ));
    }
}
