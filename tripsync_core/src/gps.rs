//! GPS resampling and fusion.
//!
//! Pipeline for one raw trace:
//!
//! 1. Optional resampling to a fixed 0.1 s grid (local-meter interpolation)
//! 2. One of:
//!    - `none`: pass-through
//!    - `ma`: moving average on lat and lon **degrees** independently
//!    - `kalman`: Kalman on the projected x/y **meters**, reprojected, plus
//!      ground speed from the filters' velocity states
//!
//! The moving-average path deliberately skips projection; only the Kalman
//! path needs a locally linear frame to produce meaningful velocities.

use crate::config::{FilterConfig, FilterKind};
use crate::geo::{GeoPoint, GeoProjector};
use crate::kalman;
use crate::moving_average;
use crate::series::GeoTrace;
use tracing::{debug, warn};

/// Fixed resampling step (10 Hz).
pub const RESAMPLE_DT: f64 = 0.1;

/// m/s to km/h.
const MS_TO_KMH: f64 = 3.6;

#[derive(Debug, Clone, Copy)]
struct CleanSample {
    t: f64,
    lat: f64,
    lon: f64,
}

/// Samples with finite coordinates and strictly increasing time.
fn clean_samples(trace: &GeoTrace) -> Vec<CleanSample> {
    let mut samples: Vec<CleanSample> = Vec::with_capacity(trace.len());
    let rows = trace.t.iter().zip(&trace.lat).zip(&trace.lon);
    for ((&t, &lat), &lon) in rows {
        let s = CleanSample { t, lat, lon };
        if !s.t.is_finite() || !s.lat.is_finite() || !s.lon.is_finite() {
            continue;
        }
        if matches!(samples.last(), Some(prev) if s.t <= prev.t) {
            continue;
        }
        samples.push(s);
    }
    samples
}

fn trace_from_samples(samples: &[CleanSample]) -> GeoTrace {
    GeoTrace::new(
        samples.iter().map(|s| s.t).collect(),
        samples.iter().map(|s| s.lat).collect(),
        samples.iter().map(|s| s.lon).collect(),
    )
}

/// Resamples an irregular trace to a fixed step of [`RESAMPLE_DT`].
///
/// Invalid and non-increasing samples are dropped first. With fewer than 2
/// clean samples the clean list is returned as-is. Interpolation happens in
/// the local-meter frame of the first clean sample.
pub fn resample_10hz(trace: &GeoTrace) -> GeoTrace {
    let samples = clean_samples(trace);
    if samples.len() < 2 {
        return trace_from_samples(&samples);
    }

    let first = samples[0];
    let last = samples[samples.len() - 1];
    let projector = match GeoProjector::new(GeoPoint::new(first.lat, first.lon)) {
        Some(p) => p,
        None => return trace_from_samples(&samples),
    };

    let local: Vec<_> = samples
        .iter()
        .map(|s| projector.to_local(GeoPoint::new(s.lat, s.lon)))
        .collect();

    let m = (((last.t - first.t) / RESAMPLE_DT).floor() as usize) + 1;
    let mut t_out = Vec::with_capacity(m);
    let mut lat_out = Vec::with_capacity(m);
    let mut lon_out = Vec::with_capacity(m);

    let mut j = 0;
    for k in 0..m {
        let tk = first.t + k as f64 * RESAMPLE_DT;
        while j + 1 < samples.len() && samples[j + 1].t < tk {
            j += 1;
        }
        let b = (j + 1).min(samples.len() - 1);
        let denom = samples[b].t - samples[j].t;
        let alpha = if denom > 0.0 {
            ((tk - samples[j].t) / denom).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let p = local[j] + (local[b] - local[j]) * alpha;
        let geo = projector.to_geo(p);
        t_out.push(tk);
        lat_out.push(geo.lat);
        lon_out.push(geo.lon);
    }

    debug!(input = trace.len(), clean = samples.len(), output = m, "resampled GPS trace to 10 Hz");
    GeoTrace::new(t_out, lat_out, lon_out)
}

/// Kalman-smooths a trace in local meters and derives ground speed.
///
/// Without a valid origin the trace passes through with no speed.
pub fn kalman_local_meters(trace: &GeoTrace, sigma_a: f64, sigma_z: f64) -> GeoTrace {
    if trace.is_empty() {
        return GeoTrace::default();
    }
    let projector = match GeoProjector::from_trace(&trace.lat, &trace.lon) {
        Some(p) => p,
        None => {
            warn!(samples = trace.len(), "GPS trace has no finite fix, skipping Kalman filter");
            return GeoTrace::new(trace.t.clone(), trace.lat.clone(), trace.lon.clone());
        }
    };

    let (x, y) = projector.project(&trace.lat, &trace.lon);
    let kx = kalman::smooth_with_velocity(&trace.t, &x, sigma_a, sigma_z);
    let ky = kalman::smooth_with_velocity(&trace.t, &y, sigma_a, sigma_z);

    let (lat, lon) = projector.unproject(&kx.positions, &ky.positions);
    let speed_kmh = kx
        .velocities
        .iter()
        .zip(ky.velocities.iter())
        .map(|(&vx, &vy)| {
            if vx.is_finite() && vy.is_finite() {
                (vx * vx + vy * vy).sqrt() * MS_TO_KMH
            } else {
                f64::NAN
            }
        })
        .collect();

    let mut out = GeoTrace::new(trace.t.clone(), lat, lon);
    out.speed_kmh = Some(speed_kmh);
    out
}

/// Applies the configured GPS filter to a raw trace.
///
/// Stateless: every call re-derives the output from `raw`, so changing the
/// configuration never carries filter state over.
pub fn fuse(raw: &GeoTrace, config: &FilterConfig) -> GeoTrace {
    let config = config.sanitized();
    let resampled;
    let base = if config.resample_10hz {
        resampled = resample_10hz(raw);
        &resampled
    } else {
        raw
    };

    debug!(kind = config.kind.name(), samples = base.len(), resample = config.resample_10hz, "applying GPS filter");
    match config.kind {
        FilterKind::None => GeoTrace::new(base.t.clone(), base.lat.clone(), base.lon.clone()),
        FilterKind::Ma => GeoTrace::new(
            base.t.clone(),
            moving_average::centered(&base.lat, config.ma_window),
            moving_average::centered(&base.lon, config.ma_window),
        ),
        FilterKind::Kalman => kalman_local_meters(base, config.sigma_a, config.sigma_z),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn straight_north() -> GeoTrace {
        GeoTrace::new(
            vec![0.0, 1.0, 2.0],
            vec![40.0, 40.00001, 40.00002],
            vec![-3.0, -3.0, -3.0],
        )
    }

    #[test]
    fn test_resample_fixed_step() {
        let trace = GeoTrace::new(
            vec![0.0, 0.35, 1.0, 2.05],
            vec![40.0, 40.0001, 40.0003, 40.0004],
            vec![-3.0, -3.0001, -3.0002, -3.0004],
        );
        let out = resample_10hz(&trace);
        // floor(2.05 / 0.1) + 1
        assert_eq!(out.len(), 21);
        for w in out.t.windows(2) {
            assert_relative_eq!(w[1] - w[0], RESAMPLE_DT, epsilon = 1e-9);
        }
        assert_relative_eq!(out.lat[0], 40.0, epsilon = 1e-12);
        assert_relative_eq!(out.lat[10], 40.0003, epsilon = 1e-9);
    }

    #[test]
    fn test_resample_drops_invalid_samples() {
        let trace = GeoTrace::new(
            vec![0.0, 0.5, 0.4, f64::NAN, 1.0],
            vec![40.0, 40.0001, 41.0, 40.0, f64::NAN],
            vec![-3.0, -3.0, -3.0, -3.0, -3.0],
        );
        let out = resample_10hz(&trace);
        // only t=0.0 and t=0.5 survive
        assert_eq!(out.len(), 6);
        assert!(out.lat.iter().all(|la| *la < 40.00011));
    }

    #[test]
    fn test_resample_ignores_unmatched_times() {
        let trace = GeoTrace {
            t: vec![0.0, 1.0, 2.0, 3.0],
            lat: vec![40.0, 40.0001],
            lon: vec![-3.0, -3.0],
            speed_kmh: None,
        };
        let out = resample_10hz(&trace);
        assert_eq!(out.len(), 11);
        assert_relative_eq!(out.lat[10], 40.0001, epsilon = 1e-9);
    }

    #[test]
    fn test_resample_too_few_samples() {
        let trace = GeoTrace::new(vec![0.0, 0.0], vec![40.0, 40.1], vec![-3.0, -3.0]);
        let out = resample_10hz(&trace);
        assert_eq!(out.t, vec![0.0]);
        assert_eq!(out.lat, vec![40.0]);
    }

    #[test]
    fn test_kalman_zero_noise_reproduces_input() {
        let trace = straight_north();
        let out = fuse(&trace, &FilterConfig::kalman(0.0, 0.0));
        for i in 0..3 {
            assert_relative_eq!(out.lat[i], trace.lat[i], epsilon = 1e-6);
            assert_relative_eq!(out.lon[i], trace.lon[i], epsilon = 1e-6);
        }
        let speed = out.speed_kmh.expect("kalman path derives speed");
        assert_eq!(speed.len(), 3);
        assert_eq!(speed[0], 0.0);
        // ~1.11 m/s northward once the filter has locked on
        assert_relative_eq!(speed[2], 1.112 * MS_TO_KMH, epsilon = 0.01);
    }

    #[test]
    fn test_moving_average_on_degrees() {
        let trace = straight_north();
        let out = fuse(&trace, &FilterConfig::moving_average(3));
        assert_relative_eq!(out.lat[0], 40.000005, epsilon = 1e-12);
        assert_relative_eq!(out.lat[1], 40.00001, epsilon = 1e-12);
        assert!(out.speed_kmh.is_none());
    }

    #[test]
    fn test_none_is_pass_through() {
        let trace = straight_north();
        assert_eq!(fuse(&trace, &FilterConfig::default()), trace);
    }

    #[test]
    fn test_kalman_without_valid_fix_passes_through() {
        let trace = GeoTrace::new(vec![0.0, 1.0], vec![f64::NAN, f64::NAN], vec![1.0, 2.0]);
        let out = fuse(&trace, &FilterConfig::kalman(1.0, 1.0));
        assert!(out.lat.iter().all(|v| v.is_nan()));
        assert_eq!(out.lon, vec![1.0, 2.0]);
        assert!(out.speed_kmh.is_none());
    }

    #[test]
    fn test_resample_then_kalman() {
        let trace = straight_north();
        let out = fuse(&trace, &FilterConfig::kalman(1.0, 1.0).with_resample(true));
        assert_eq!(out.len(), 21);
        assert!(out.lat.iter().all(|v| v.is_finite()));
    }
}
