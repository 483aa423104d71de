//! Cross-trip statistics for side-by-side distribution plots.
//!
//! All functions ignore non-finite values and return empty or NaN results on
//! empty input rather than failing.

use serde::{Deserialize, Serialize};

/// Lower percentile of the shared range used by [`compare_distributions`].
pub const ROBUST_LOW_PERCENTILE: f64 = 0.5;

/// Upper percentile of the shared range used by [`compare_distributions`].
pub const ROBUST_HIGH_PERCENTILE: f64 = 99.5;

/// Smallest bin count accepted by [`histogram_density`].
pub const MIN_BINS: usize = 5;

/// Density histogram as bin centers and per-bin fractions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Histogram {
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Population mean and standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanStd {
    pub mean: f64,
    pub std: f64,
}

/// Keeps every `ceil(n / max_points)`-th sample so at most `max_points`
/// remain.
pub fn sample_to_max_points(t: &[f64], v: &[f64], max_points: usize) -> (Vec<f64>, Vec<f64>) {
    let n = t.len().min(v.len());
    if n == 0 || max_points == 0 {
        return (Vec::new(), Vec::new());
    }
    if n <= max_points {
        return (t[..n].to_vec(), v[..n].to_vec());
    }
    let stride = n.div_ceil(max_points);
    (0..n).step_by(stride).map(|i| (t[i], v[i])).unzip()
}

/// Concatenates the finite values of several arrays, stopping at `max_len`.
pub fn concat_finite<'a, I>(arrays: I, max_len: usize) -> Vec<f64>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    arrays
        .into_iter()
        .flat_map(|a| a.iter().copied())
        .filter(|x| x.is_finite())
        .take(max_len)
        .collect()
}

/// Histogram of `values` normalised so the bin fractions sum to 1.
///
/// `range` is used when both bounds are finite and distinct; otherwise the
/// data range is used, widened by 1 on each side if flat. At least
/// [`MIN_BINS`] bins are produced.
pub fn histogram_density(values: &[f64], bins: usize, range: Option<(f64, f64)>) -> Histogram {
    let vals: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if vals.is_empty() {
        return Histogram::default();
    }

    let (mut min, mut max) = match range {
        Some((lo, hi)) if lo.is_finite() && hi.is_finite() && lo != hi => (lo, hi),
        _ => {
            let lo = vals.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = vals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (lo, hi)
        }
    };
    if min == max {
        min -= 1.0;
        max += 1.0;
    }

    let bins = bins.max(MIN_BINS);
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in &vals {
        let raw = ((v - min) / width).floor();
        let idx = raw.clamp(0.0, (bins - 1) as f64) as usize;
        counts[idx] += 1;
    }

    let total = vals.len() as f64;
    Histogram {
        x: (0..bins).map(|i| min + (i as f64 + 0.5) * width).collect(),
        y: counts.iter().map(|&c| c as f64 / total).collect(),
    }
}

/// Mean and population standard deviation; NaN for both on empty input.
pub fn mean_std(values: &[f64]) -> MeanStd {
    let vals: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if vals.is_empty() {
        return MeanStd { mean: f64::NAN, std: f64::NAN };
    }
    let n = vals.len() as f64;
    let mean = vals.iter().sum::<f64>() / n;
    let var = vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    MeanStd { mean, std: var.sqrt() }
}

/// Linearly interpolated percentile, `p` in `[0, 100]` (clamped).
pub fn percentile(values: &[f64], p: f64) -> f64 {
    let mut vals: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.sort_by(f64::total_cmp);

    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) } / 100.0;
    let idx = (vals.len() - 1) as f64 * p;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        return vals[lo];
    }
    let w = idx - lo as f64;
    vals[lo] * (1.0 - w) + vals[hi] * w
}

/// Rate of change of the acceleration magnitude between samples.
///
/// Needs at least 3 samples; steps with a non-positive `dt` or non-finite
/// magnitude are skipped.
pub fn jerk_magnitude(t: &[f64], ax: &[f64], ay: &[f64], az: &[f64]) -> Vec<f64> {
    let n = t.len().min(ax.len()).min(ay.len()).min(az.len());
    if n < 3 {
        return Vec::new();
    }
    let magnitude = |i: usize| (ax[i] * ax[i] + ay[i] * ay[i] + az[i] * az[i]).sqrt();
    (1..n)
        .filter_map(|i| {
            let dt = t[i] - t[i - 1];
            if !dt.is_finite() || dt <= 0.0 {
                return None;
            }
            let (a1, a2) = (magnitude(i - 1), magnitude(i));
            if !a1.is_finite() || !a2.is_finite() {
                return None;
            }
            Some((a2 - a1) / dt)
        })
        .collect()
}

/// Finite-difference yaw rate. Same skipping rules as [`jerk_magnitude`].
pub fn yaw_rate(t: &[f64], yaw: &[f64]) -> Vec<f64> {
    let n = t.len().min(yaw.len());
    if n < 3 {
        return Vec::new();
    }
    (1..n)
        .filter_map(|i| {
            let dt = t[i] - t[i - 1];
            let dy = yaw[i] - yaw[i - 1];
            (dt.is_finite() && dt > 0.0 && dy.is_finite()).then(|| dy / dt)
        })
        .collect()
}

/// Two distributions binned over one shared robust range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionComparison {
    pub a: Histogram,
    pub b: Histogram,
    pub stats_a: MeanStd,
    pub stats_b: MeanStd,
}

/// Bins `a` and `b` over `[min(p0.5), max(p99.5)]` of both sets, so the
/// histograms share bin centers.
///
/// When either set has no finite values there is no shared range and each
/// histogram falls back to its own data range.
pub fn compare_distributions(a: &[f64], b: &[f64], bins: usize) -> DistributionComparison {
    let bounds = [
        percentile(a, ROBUST_LOW_PERCENTILE),
        percentile(b, ROBUST_LOW_PERCENTILE),
        percentile(a, ROBUST_HIGH_PERCENTILE),
        percentile(b, ROBUST_HIGH_PERCENTILE),
    ];
    let range = bounds
        .iter()
        .all(|x| x.is_finite())
        .then(|| (bounds[0].min(bounds[1]), bounds[2].max(bounds[3])));
    DistributionComparison {
        a: histogram_density(a, bins, range),
        b: histogram_density(b, bins, range),
        stats_a: mean_std(a),
        stats_b: mean_std(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sample_to_max_points() {
        let t: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let (tt, vv) = sample_to_max_points(&t, &t, 4);
        // stride = ceil(10 / 4) = 3
        assert_eq!(tt, vec![0.0, 3.0, 6.0, 9.0]);
        assert_eq!(vv, tt);

        let (tt, _) = sample_to_max_points(&t, &t[..5], 100);
        assert_eq!(tt.len(), 5);
    }

    #[test]
    fn test_concat_finite_stops_at_max_len() {
        let a = [1.0, f64::NAN, 2.0];
        let b = [3.0, 4.0];
        assert_eq!(concat_finite([&a[..], &b[..]], 3), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_histogram_sums_to_one() {
        let values: Vec<f64> = (0..1000).map(|i| (i as f64 * 0.37).sin() * 10.0).collect();
        let h = histogram_density(&values, 50, None);
        assert_eq!(h.x.len(), 50);
        assert_relative_eq!(h.y.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_histogram_flat_and_min_bins() {
        let h = histogram_density(&[2.0, 2.0, 2.0], 1, Some((f64::NAN, 3.0)));
        assert_eq!(h.x.len(), MIN_BINS);
        // range widened to [1, 3]
        assert_relative_eq!(h.x[0], 1.2, epsilon = 1e-12);
        assert_relative_eq!(h.y[2], 1.0);
    }

    #[test]
    fn test_histogram_clamps_outliers() {
        let h = histogram_density(&[-100.0, 0.5, 100.0], 5, Some((0.0, 1.0)));
        assert_relative_eq!(h.y[0], 1.0 / 3.0);
        assert_relative_eq!(h.y[4], 1.0 / 3.0);
    }

    #[test]
    fn test_mean_std() {
        let s = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0, f64::NAN]);
        assert_relative_eq!(s.mean, 5.0);
        assert_relative_eq!(s.std, 2.0);
        assert!(mean_std(&[]).mean.is_nan());
    }

    #[test]
    fn test_percentile_interpolates() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 100.0), 4.0);
        assert_relative_eq!(percentile(&v, 50.0), 2.5);
        assert_eq!(percentile(&v, 250.0), 4.0);
        assert!(percentile(&[f64::NAN], 50.0).is_nan());
    }

    #[test]
    fn test_jerk_magnitude() {
        let t = [0.0, 0.5, 0.5, 1.5];
        let ax = [0.0, 3.0, 9.0, 0.0];
        let ay = [1.0, 4.0, 9.0, 0.0];
        let az = [0.0, 0.0, 9.0, 2.0];
        let j = jerk_magnitude(&t, &ax, &ay, &az);
        // (5 - 1) / 0.5, zero-dt step skipped, then (2 - |(9,9,9)|) / 1
        assert_eq!(j.len(), 2);
        assert_relative_eq!(j[0], 8.0);
        assert_relative_eq!(j[1], 2.0 - 243.0_f64.sqrt());
        assert!(jerk_magnitude(&t[..2], &ax, &ay, &az).is_empty());
    }

    #[test]
    fn test_yaw_rate() {
        let r = yaw_rate(&[0.0, 0.1, 0.2, 0.2], &[0.0, 1.0, f64::NAN, 3.0]);
        assert_eq!(r.len(), 1);
        assert_relative_eq!(r[0], 10.0);
    }

    #[test]
    fn test_compare_distributions_share_bins() {
        let a: Vec<f64> = (0..200).map(|i| i as f64 * 0.1).collect();
        let b: Vec<f64> = (0..200).map(|i| 5.0 + i as f64 * 0.05).collect();
        let cmp = compare_distributions(&a, &b, 20);
        assert_eq!(cmp.a.x, cmp.b.x);
        assert_relative_eq!(cmp.stats_b.mean, 5.0 + 199.0 * 0.025, epsilon = 1e-9);
    }

    #[test]
    fn test_compare_with_empty_set_uses_own_range() {
        let a = [10.0, 20.0, 30.0];
        let cmp = compare_distributions(&a, &[f64::NAN], 10);
        assert_eq!(cmp.a, histogram_density(&a, 10, None));
        // own range [10, 30] in 10 bins, not the robust [10.1, 29.9]
        assert_relative_eq!(cmp.a.x[0], 11.0);
        assert!(cmp.b.x.is_empty());
        assert!(cmp.stats_b.mean.is_nan());
    }
}
