//! Filter and cursor configuration records.
//!
//! Interactive controls feed these records directly, so out-of-range values
//! are clamped to the nearest valid value instead of being rejected.

use crate::moving_average::{clamp_odd_window, DEFAULT_WINDOW};
use serde::{Deserialize, Deserializer, Serialize};

/// Default process noise (sigma_a) for both accelerometer and GPS filters.
pub const DEFAULT_SIGMA_A: f64 = 1.5;

/// Default measurement noise (sigma_z).
pub const DEFAULT_SIGMA_Z: f64 = 6.0;

/// Which smoothing to apply to a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterKind {
    /// Raw values pass through
    #[default]
    None,
    /// Centered moving average
    #[serde(alias = "movingAverage")]
    Ma,
    /// Constant-velocity Kalman filter
    Kalman,
}

impl FilterKind {
    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::None => "none",
            FilterKind::Ma => "ma",
            FilterKind::Kalman => "kalman",
        }
    }
}

impl std::str::FromStr for FilterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(FilterKind::None),
            "ma" | "movingAverage" => Ok(FilterKind::Ma),
            "kalman" => Ok(FilterKind::Kalman),
            other => Err(format!("Unknown filter kind: {}", other)),
        }
    }
}

/// Flat filter record shared by accelerometer panels and the GPS track.
///
/// `resample_10hz` is only honoured by the GPS pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterConfig {
    pub kind: FilterKind,

    /// Moving-average window, odd in `[1, 301]`
    #[serde(deserialize_with = "clamped_window")]
    pub ma_window: usize,

    /// Kalman process noise (>= 0)
    pub sigma_a: f64,

    /// Kalman measurement noise (>= 0)
    pub sigma_z: f64,

    /// Resample GPS to a fixed 10 Hz grid before filtering
    #[serde(rename = "resample10Hz")]
    pub resample_10hz: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            kind: FilterKind::None,
            ma_window: DEFAULT_WINDOW,
            sigma_a: DEFAULT_SIGMA_A,
            sigma_z: DEFAULT_SIGMA_Z,
            resample_10hz: false,
        }
    }
}

impl FilterConfig {
    pub fn moving_average(window: usize) -> Self {
        Self {
            kind: FilterKind::Ma,
            ma_window: window,
            ..Self::default()
        }
    }

    pub fn kalman(sigma_a: f64, sigma_z: f64) -> Self {
        Self {
            kind: FilterKind::Kalman,
            sigma_a,
            sigma_z,
            ..Self::default()
        }
    }

    pub fn with_resample(mut self, resample_10hz: bool) -> Self {
        self.resample_10hz = resample_10hz;
        self
    }

    /// Copy with every field coerced into its valid range.
    ///
    /// Non-finite sigmas fall back to their defaults; negative ones clamp
    /// to 0.
    pub fn sanitized(&self) -> Self {
        Self {
            kind: self.kind,
            ma_window: clamp_odd_window(self.ma_window as f64),
            sigma_a: sanitize_sigma(self.sigma_a, DEFAULT_SIGMA_A),
            sigma_z: sanitize_sigma(self.sigma_z, DEFAULT_SIGMA_Z),
            resample_10hz: self.resample_10hz,
        }
    }
}

/// Reads any JSON number (or `null`) as a window and clamps it.
fn clamped_window<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let requested: Option<f64> = Option::deserialize(deserializer)?;
    Ok(clamp_odd_window(requested.unwrap_or(f64::NAN)))
}

fn sanitize_sigma(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        fallback
    }
}

/// Cursor loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CursorConfig {
    /// Visible time window around the cursor (seconds, at least 2)
    pub window_seconds: f64,

    /// Exponential smoothing factor for axis bounds
    pub smoothing_alpha: f64,

    /// Fractional padding added above and below the windowed range
    pub padding_fraction: f64,

    /// Maximum tick rate (Hz)
    pub tick_hz: f64,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            window_seconds: 30.0,
            smoothing_alpha: 0.18,
            padding_fraction: 0.08,
            tick_hz: 30.0,
        }
    }
}

impl CursorConfig {
    /// Effective window: never narrower than 2 seconds.
    pub fn effective_window(&self) -> f64 {
        if self.window_seconds.is_finite() {
            self.window_seconds.max(2.0)
        } else {
            2.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FilterConfig::default();
        assert_eq!(config.kind, FilterKind::None);
        assert_eq!(config.ma_window, 9);
        assert_eq!(config.sigma_a, 1.5);
        assert_eq!(config.sigma_z, 6.0);
        assert!(!config.resample_10hz);
    }

    #[test]
    fn test_config_deserialization() {
        let json = r#"{ "kind": "kalman", "maWindow": 12, "sigmaA": -1, "sigmaZ": 3.5, "resample10Hz": true }"#;
        let config: FilterConfig = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(config.kind, FilterKind::Kalman);
        assert!(config.resample_10hz);

        let clean = config.sanitized();
        assert_eq!(clean.ma_window, 13);
        assert_eq!(clean.sigma_a, 0.0);
        assert_eq!(clean.sigma_z, 3.5);
    }

    #[test]
    fn test_out_of_range_window_is_clamped() {
        let read = |json: &str| serde_json::from_str::<FilterConfig>(json).unwrap().ma_window;
        assert_eq!(read(r#"{ "kind": "ma", "maWindow": 8.5 }"#), 9);
        assert_eq!(read(r#"{ "kind": "ma", "maWindow": 8.4 }"#), 9);
        assert_eq!(read(r#"{ "kind": "ma", "maWindow": -3 }"#), 1);
        assert_eq!(read(r#"{ "kind": "ma", "maWindow": 1e6 }"#), 301);
        assert_eq!(read(r#"{ "kind": "ma", "maWindow": null }"#), DEFAULT_WINDOW);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: FilterConfig = serde_json::from_str(r#"{ "kind": "ma" }"#).unwrap();
        assert_eq!(config, FilterConfig::moving_average(9));
    }

    #[test]
    fn test_config_serialization() {
        let json = serde_json::to_string(&FilterConfig::kalman(2.0, 4.0)).unwrap();
        assert!(json.contains(r#""kind":"kalman""#));
        assert!(json.contains(r#""resample10Hz":false"#));
    }

    #[test]
    fn test_filter_kind_from_str() {
        assert_eq!("movingAverage".parse::<FilterKind>(), Ok(FilterKind::Ma));
        assert!("butterworth".parse::<FilterKind>().is_err());
    }

    #[test]
    fn test_nan_sigma_falls_back() {
        let config = FilterConfig::kalman(f64::NAN, f64::INFINITY).sanitized();
        assert_eq!(config.sigma_a, DEFAULT_SIGMA_A);
        assert_eq!(config.sigma_z, DEFAULT_SIGMA_Z);
    }

    #[test]
    fn test_cursor_window_floor() {
        let config = CursorConfig {
            window_seconds: 0.5,
            ..Default::default()
        };
        assert_eq!(config.effective_window(), 2.0);
        assert_eq!(CursorConfig::default().effective_window(), 30.0);
    }
}
