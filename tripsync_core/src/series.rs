//! Series containers shared by the filters and the cursor.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Reads a float array where JSON `null` marks a gap (NaN).
///
/// `serde_json` writes non-finite floats as `null`, so this keeps documents
/// round-trippable.
pub fn nullable_f64s<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Option<f64>> = Vec::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|x| x.unwrap_or(f64::NAN)).collect())
}

fn optional_nullable_f64s<'de, D>(deserializer: D) -> Result<Option<Vec<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Option<f64>>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|v| v.into_iter().map(|x| x.unwrap_or(f64::NAN)).collect()))
}

/// A scalar series as parallel `t`/`v` arrays.
///
/// `t` is finite and non-decreasing once built through
/// [`TimeSeries::from_raw`], which deserialization also goes through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTimeSeries")]
pub struct TimeSeries {
    pub t: Vec<f64>,
    pub v: Vec<f64>,
}

#[derive(Deserialize)]
struct RawTimeSeries {
    #[serde(deserialize_with = "nullable_f64s")]
    t: Vec<f64>,
    #[serde(deserialize_with = "nullable_f64s")]
    v: Vec<f64>,
}

impl From<RawTimeSeries> for TimeSeries {
    fn from(raw: RawTimeSeries) -> Self {
        TimeSeries::from_raw(raw.t, raw.v)
    }
}

impl TimeSeries {
    /// Builds a series from provider arrays.
    ///
    /// Arrays of unequal length are truncated to the shorter and samples
    /// with a non-finite timestamp are dropped. If `t` decreases anywhere the
    /// remaining samples are stable-sorted by time.
    pub fn from_raw(t: Vec<f64>, v: Vec<f64>) -> Self {
        let (t, v) = normalize_columns(t, vec![v]);
        let v = v.into_iter().next().unwrap_or_default();
        Self { t, v }
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Same series with every finite timestamp shifted by `offset`.
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            t: shift_times(&self.t, offset),
            v: self.v.clone(),
        }
    }

    /// Every `stride`-th sample, starting with the first.
    pub fn downsampled(&self, stride: usize) -> Self {
        Self {
            t: downsample(&self.t, stride),
            v: downsample(&self.v, stride),
        }
    }

    /// Largest finite value, or `None`.
    pub fn max_finite(&self) -> Option<f64> {
        max_finite(&self.v)
    }
}

/// A GPS trace as parallel `t`/`lat`/`lon` arrays, plus the ground speed
/// derived by the Kalman path when available.
///
/// Deserialized traces are normalized like [`TimeSeries::from_raw`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawGeoTrace")]
pub struct GeoTrace {
    pub t: Vec<f64>,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_kmh: Option<Vec<f64>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGeoTrace {
    #[serde(deserialize_with = "nullable_f64s")]
    t: Vec<f64>,
    #[serde(deserialize_with = "nullable_f64s")]
    lat: Vec<f64>,
    #[serde(deserialize_with = "nullable_f64s")]
    lon: Vec<f64>,
    #[serde(default, deserialize_with = "optional_nullable_f64s")]
    speed_kmh: Option<Vec<f64>>,
}

impl From<RawGeoTrace> for GeoTrace {
    fn from(raw: RawGeoTrace) -> Self {
        GeoTrace::from_raw(raw.t, raw.lat, raw.lon, raw.speed_kmh)
    }
}

impl GeoTrace {
    /// Builds a trace, truncating the arrays to a common length.
    pub fn new(mut t: Vec<f64>, mut lat: Vec<f64>, mut lon: Vec<f64>) -> Self {
        let n = t.len().min(lat.len()).min(lon.len());
        t.truncate(n);
        lat.truncate(n);
        lon.truncate(n);
        Self {
            t,
            lat,
            lon,
            speed_kmh: None,
        }
    }

    /// Builds a trace from provider arrays.
    ///
    /// `t`, `lat` and `lon` are truncated to a common length. A speed array
    /// is cut or NaN-padded to that length. Samples with a non-finite
    /// timestamp are dropped and the rest re-sorted if needed.
    pub fn from_raw(t: Vec<f64>, lat: Vec<f64>, lon: Vec<f64>, speed_kmh: Option<Vec<f64>>) -> Self {
        let n = t.len().min(lat.len()).min(lon.len());
        let mut columns = vec![lat, lon];
        if let Some(mut speed) = speed_kmh {
            speed.resize(n, f64::NAN);
            columns.push(speed);
        }
        let (t, columns) = normalize_columns(t, columns);
        let mut columns = columns.into_iter();
        Self {
            t,
            lat: columns.next().unwrap_or_default(),
            lon: columns.next().unwrap_or_default(),
            speed_kmh: columns.next(),
        }
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Same trace with every finite timestamp shifted by `offset`.
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            t: shift_times(&self.t, offset),
            ..self.clone()
        }
    }

    pub fn downsampled(&self, stride: usize) -> Self {
        Self {
            t: downsample(&self.t, stride),
            lat: downsample(&self.lat, stride),
            lon: downsample(&self.lon, stride),
            speed_kmh: self.speed_kmh.as_ref().map(|s| downsample(s, stride)),
        }
    }
}

/// Truncates `t` and every column to their common length, drops rows with a
/// non-finite timestamp and stable-sorts the rest by time.
fn normalize_columns(mut t: Vec<f64>, mut columns: Vec<Vec<f64>>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = columns.iter().map(Vec::len).fold(t.len(), usize::min);
    t.truncate(n);
    for column in &mut columns {
        column.truncate(n);
    }

    let keep: Vec<usize> = (0..n).filter(|&i| t[i].is_finite()).collect();
    if keep.len() < n {
        warn!(dropped = n - keep.len(), "dropping samples with non-finite timestamps");
    }

    let mut order = keep;
    if !order.windows(2).all(|w| t[w[0]] <= t[w[1]]) {
        warn!(samples = order.len(), "series timestamps are not monotonic, re-sorting");
        order.sort_by(|&a, &b| t[a].total_cmp(&t[b]));
    } else if order.len() == n {
        return (t, columns);
    }

    let pick = |values: &[f64]| -> Vec<f64> { order.iter().map(|&i| values[i]).collect() };
    let columns = columns.iter().map(|c| pick(c.as_slice())).collect();
    (pick(t.as_slice()), columns)
}

/// Adds `offset` to every finite timestamp; non-finite ones are kept.
pub fn shift_times(t: &[f64], offset: f64) -> Vec<f64> {
    t.iter()
        .map(|&ti| if ti.is_finite() { ti + offset } else { ti })
        .collect()
}

/// Every `stride`-th element; a stride of 0 or 1 copies the input.
pub fn downsample(values: &[f64], stride: usize) -> Vec<f64> {
    values.iter().step_by(stride.max(1)).copied().collect()
}

/// Largest finite value, or `None` when there is none.
pub fn max_finite(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
}

/// Resamples a step-valued series onto `target_t` using the last known
/// finite value at or before each target time.
///
/// Targets before the first finite source sample get NaN. Both time arrays
/// must be non-decreasing.
pub fn step_resample(source_t: &[f64], source_v: &[f64], target_t: &[f64]) -> Vec<f64> {
    let n = source_t.len().min(source_v.len());
    let mut j = 0;
    let mut last = f64::NAN;
    target_t
        .iter()
        .map(|&tt| {
            while j < n && source_t[j] <= tt {
                if source_v[j].is_finite() {
                    last = source_v[j];
                }
                j += 1;
            }
            last
        })
        .collect()
}
