//! Per-tick cursor evaluation and display-ready axis bounds.
//!
//! Series handed to the engine are already shifted into video time, so the
//! query time of a tick is the video clock reading itself. For every series
//! the engine produces the interpolated cursor point and a y-axis range that
//! follows the visible window with exponential smoothing:
//!
//! ```text
//! target   = policy(pad(window_min_max([t - w/2, t + w/2])))
//! smoothed = lerp(prev ?? target, target, alpha)
//! ```

use crate::config::CursorConfig;
use crate::time_index::{interpolate, window_min_max};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Minimum axis height after smoothing.
pub const AXIS_EPSILON: f64 = 1e-6;

/// Axis used by a [`AxisPolicy::Fixed`] series with no known maximum.
pub const DEFAULT_FIXED_MAX: f64 = 160.0;

/// How a series' target axis range is derived from its windowed min/max.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AxisPolicy {
    /// Padded window range as-is
    #[default]
    Auto,
    /// Mirrored around zero using the larger absolute bound
    SymmetricAroundZero,
    /// Baseline pinned at zero
    NonNegative,
    /// Widened around its midpoint to at least `span`
    #[serde(rename_all = "camelCase")]
    MinSpan { span: f64, floor_zero: bool },
    /// Constant `[0, max]`; no smoothing
    Fixed { max: Option<f64> },
}

impl AxisPolicy {
    /// Resolves a data-driven fixed axis against a series' global maxima.
    ///
    /// `Fixed { max: None }` becomes `[0, ceil(max(1, maxima...))]`. Other
    /// policies are returned unchanged.
    pub fn resolve(self, maxima: &[Option<f64>]) -> Self {
        match self {
            AxisPolicy::Fixed { max: None } => {
                let top = maxima
                    .iter()
                    .flatten()
                    .filter(|m| m.is_finite())
                    .fold(1.0_f64, |acc, m| acc.max(m.ceil()));
                AxisPolicy::Fixed { max: Some(top) }
            }
            other => other,
        }
    }

    /// Applies the policy to padded target bounds.
    fn apply(&self, mut min: f64, mut max: f64) -> (f64, f64) {
        match *self {
            AxisPolicy::Auto => {}
            AxisPolicy::SymmetricAroundZero => {
                let max_abs = min.abs().max(max.abs());
                min = -max_abs;
                max = max_abs;
            }
            AxisPolicy::NonNegative => {
                min = 0.0;
                if !max.is_finite() || max <= 0.0 {
                    max = 1.0;
                }
            }
            AxisPolicy::MinSpan { span, floor_zero } => {
                if min.is_finite() && max.is_finite() {
                    let current = max - min;
                    if current > 0.0 && current < span {
                        let mid = (min + max) / 2.0;
                        min = mid - span / 2.0;
                        max = mid + span / 2.0;
                    }
                }
                if floor_zero && min.is_finite() {
                    min = min.max(0.0);
                }
                if max.is_finite() && max < span {
                    max = span;
                }
            }
            AxisPolicy::Fixed { max: fixed } => {
                min = 0.0;
                max = fixed.unwrap_or(DEFAULT_FIXED_MAX);
            }
        }
        (min, max)
    }
}

/// Smoothed axis bounds of one series. Empty until the first tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisWindow {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl AxisWindow {
    /// Moves toward the target by `alpha`; the first call snaps to it.
    pub fn smooth_toward(&mut self, target_min: f64, target_max: f64, alpha: f64) {
        self.min = Some(lerp_from(self.min, target_min, alpha));
        self.max = Some(lerp_from(self.max, target_max, alpha));
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Current bounds with the collapse guard applied.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        let (min, max) = (self.min?, self.max?);
        if !min.is_finite() || !max.is_finite() {
            return None;
        }
        Some((min.min(max - AXIS_EPSILON), max.max(min + AXIS_EPSILON)))
    }
}

fn lerp_from(prev: Option<f64>, target: f64, alpha: f64) -> f64 {
    match prev {
        Some(p) => p + (target - p) * alpha,
        None => target,
    }
}

/// One series as seen by the cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CursorSeries {
    pub key: String,
    pub t: Vec<f64>,
    pub raw: Vec<f64>,
    /// Filtered values, same length as `t`, when a filter is active
    pub filtered: Option<Vec<f64>>,
    pub policy: AxisPolicy,
}

impl CursorSeries {
    pub fn new(key: impl Into<String>, t: Vec<f64>, raw: Vec<f64>) -> Self {
        Self {
            key: key.into(),
            t,
            raw,
            filtered: None,
            policy: AxisPolicy::Auto,
        }
    }

    pub fn with_filtered(mut self, filtered: Vec<f64>) -> Self {
        self.filtered = Some(filtered);
        self
    }

    pub fn with_policy(mut self, policy: AxisPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Values the cursor point follows: filtered when present.
    pub fn cursor_values(&self) -> &[f64] {
        self.filtered.as_deref().unwrap_or(&self.raw)
    }

    /// Min/max over `[t_min, t_max]`, as the union of raw and filtered.
    fn window(&self, t_min: f64, t_max: f64) -> Option<(f64, f64)> {
        let raw = window_min_max(&self.t, &self.raw, t_min, t_max);
        let filtered = self
            .filtered
            .as_ref()
            .filter(|f| f.len() == self.t.len())
            .and_then(|f| window_min_max(&self.t, f, t_min, t_max));
        match (raw, filtered) {
            (Some((a0, a1)), Some((b0, b1))) => Some((a0.min(b0), a1.max(b1))),
            (a, b) => a.or(b),
        }
    }
}

/// The cursor position on a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPoint {
    pub t: f64,
    pub v: f64,
}

/// Per-series output of one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesTick {
    pub key: String,
    pub point: CursorPoint,
    pub axis_min: f64,
    pub axis_max: f64,
}

/// Evaluates all series of one trip at a video time.
#[derive(Debug, Clone, Default)]
pub struct CursorEngine {
    config: CursorConfig,
    series: Vec<CursorSeries>,
    windows: Vec<AxisWindow>,
}

impl CursorEngine {
    pub fn new(config: CursorConfig) -> Self {
        Self {
            config,
            series: Vec::new(),
            windows: Vec::new(),
        }
    }

    pub fn config(&self) -> &CursorConfig {
        &self.config
    }

    /// Replaces every series and clears all axis state.
    pub fn load(&mut self, series: Vec<CursorSeries>) {
        self.windows = vec![AxisWindow::default(); series.len()];
        self.series = series;
    }

    /// Clears smoothing state, keeping the series.
    pub fn reset(&mut self) {
        self.windows.iter_mut().for_each(AxisWindow::reset);
    }

    pub fn series(&self) -> &[CursorSeries] {
        &self.series
    }

    /// Smoothed axis state for a series key.
    pub fn axis_window(&self, key: &str) -> Option<&AxisWindow> {
        let idx = self.series.iter().position(|s| s.key == key)?;
        self.windows.get(idx)
    }

    /// Evaluates every series at `t_video`.
    ///
    /// Series with no interpolated value, or with no axis range yet, are
    /// left out of the result.
    pub fn tick(&mut self, t_video: f64) -> Vec<SeriesTick> {
        let half = self.config.effective_window() / 2.0;
        let alpha = self.config.smoothing_alpha;
        let pad_fraction = self.config.padding_fraction;

        let mut out = Vec::with_capacity(self.series.len());
        for (series, window) in self.series.iter().zip(self.windows.iter_mut()) {
            if series.t.is_empty() {
                continue;
            }
            let Some(v) = interpolate(&series.t, series.cursor_values(), t_video) else {
                continue;
            };
            let point = CursorPoint { t: t_video, v };

            if let AxisPolicy::Fixed { .. } = series.policy {
                window.reset();
                let (axis_min, axis_max) = series.policy.apply(0.0, 0.0);
                out.push(SeriesTick {
                    key: series.key.clone(),
                    point,
                    axis_min,
                    axis_max,
                });
                continue;
            }

            if let Some((lo, hi)) = series.window(t_video - half, t_video + half) {
                let pad = (hi - lo) * pad_fraction;
                let (target_min, target_max) = series.policy.apply(lo - pad, hi + pad);
                window.smooth_toward(target_min, target_max, alpha);
            }

            if let Some((axis_min, axis_max)) = window.bounds() {
                out.push(SeriesTick {
                    key: series.key.clone(),
                    point,
                    axis_min,
                    axis_max,
                });
            }
        }
        out
    }
}

/// Admits ticks at most once per interval.
///
/// Ticks arriving faster are dropped rather than queued; the next admitted
/// tick carries the latest video time.
#[derive(Debug, Clone)]
pub struct TickGate {
    interval: Duration,
    last: Option<Duration>,
    skipped: u64,
}

impl Default for TickGate {
    fn default() -> Self {
        Self::from_hz(30.0)
    }
}

impl TickGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            skipped: 0,
        }
    }

    /// Gate for a target rate; non-positive rates admit every tick.
    pub fn from_hz(hz: f64) -> Self {
        if hz.is_finite() && hz > 0.0 {
            Self::new(Duration::from_secs_f64(1.0 / hz))
        } else {
            Self::new(Duration::ZERO)
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// `true` if a tick at `now` should run.
    pub fn admit(&mut self, now: Duration) -> bool {
        match self.last {
            Some(last) if now.saturating_sub(last) < self.interval => {
                self.skipped += 1;
                false
            }
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Ticks dropped so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn reset(&mut self) {
        if self.skipped > 0 {
            debug!(skipped = self.skipped, "tick gate reset");
        }
        self.last = None;
        self.skipped = 0;
    }
}
