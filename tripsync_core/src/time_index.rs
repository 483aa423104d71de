//! Point and range queries over irregularly-sampled time series.
//!
//! Every function expects `t` to be non-decreasing (see
//! [`TimeSeries::from_raw`](crate::series::TimeSeries::from_raw)). Queries
//! outside the sampled range clamp to the endpoints; nothing extrapolates.

/// Binary search shared by `nearest_index` and `bracket`.
enum Probe {
    /// `value` hit a sample exactly (or fell outside the range) at this index
    At(usize),
    /// `value` lies strictly between `t[i0]` and `t[i1]`
    Between(usize, usize),
}

fn probe(t: &[f64], value: f64) -> Option<Probe> {
    let hi = t.len().checked_sub(1)?;
    if value <= t[0] {
        return Some(Probe::At(0));
    }
    if value >= t[hi] {
        return Some(Probe::At(hi));
    }

    let mut lo: isize = 0;
    let mut hi = hi as isize;
    while lo <= hi {
        let mid = (lo + hi) >> 1;
        let v = t[mid as usize];
        if v == value {
            return Some(Probe::At(mid as usize));
        }
        if v < value {
            lo = mid + 1;
        } else {
            hi = mid - 1;
        }
    }

    // lo is the insertion point
    let last = t.len() - 1;
    let i1 = (lo.max(0) as usize).min(last);
    let i0 = ((lo - 1).max(0) as usize).min(last);
    Some(Probe::Between(i0, i1))
}

/// Index of the sample closest to `value`.
///
/// Between two samples the later one wins only on a strictly smaller
/// distance; an exact tie snaps to the earlier sample.
pub fn nearest_index(t: &[f64], value: f64) -> Option<usize> {
    match probe(t, value)? {
        Probe::At(i) => Some(i),
        Probe::Between(i0, i1) => {
            if (t[i1] - value).abs() < (t[i0] - value).abs() {
                Some(i1)
            } else {
                Some(i0)
            }
        }
    }
}

/// Indices `(i0, i1)` with `t[i0] <= value <= t[i1]`.
///
/// Collapses to `(i, i)` at either end of the series and on an exact hit.
pub fn bracket(t: &[f64], value: f64) -> Option<(usize, usize)> {
    match probe(t, value)? {
        Probe::At(i) => Some((i, i)),
        Probe::Between(i0, i1) => Some((i0, i1)),
    }
}

fn lerp(a: f64, b: f64, alpha: f64) -> f64 {
    a + (b - a) * alpha
}

/// Linearly interpolated value of `v` at `value`.
pub fn interpolate(t: &[f64], v: &[f64], value: f64) -> Option<f64> {
    let (i0, i1) = bracket(t, value)?;
    let v0 = *v.get(i0)?;
    if i0 == i1 {
        return Some(v0);
    }
    let v1 = *v.get(i1)?;
    let (t0, t1) = (t[i0], t[i1]);
    if !t0.is_finite() || !t1.is_finite() || t1 == t0 {
        return Some(v0);
    }
    let alpha = ((value - t0) / (t1 - t0)).clamp(0.0, 1.0);
    Some(lerp(v0, v1, alpha))
}

/// Finite min/max of `v` over the samples bracketing `[t_min, t_max]`.
///
/// A flat window is padded so the resulting range never has zero height.
pub fn window_min_max(t: &[f64], v: &[f64], t_min: f64, t_max: f64) -> Option<(f64, f64)> {
    let (a, _) = bracket(t, t_min)?;
    let (_, b) = bracket(t, t_max)?;
    let (i0, i1) = (a.min(b), a.max(b));
    let end = i1.min(v.len().checked_sub(1)?);

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &y in v.get(i0..=end)? {
        if !y.is_finite() {
            continue;
        }
        min = min.min(y);
        max = max.max(y);
    }
    if min == f64::INFINITY || max == f64::NEG_INFINITY {
        return None;
    }
    if min == max {
        let pad = (min.abs() * 0.01).max(1e-6);
        return Some((min - pad, max + pad));
    }
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const T: [f64; 5] = [0.0, 1.0, 2.0, 4.0, 8.0];

    #[test]
    fn test_empty_input() {
        assert_eq!(nearest_index(&[], 1.0), None);
        assert_eq!(bracket(&[], 1.0), None);
        assert_eq!(interpolate(&[], &[], 1.0), None);
        assert_eq!(window_min_max(&[], &[], 0.0, 1.0), None);
    }

    #[test]
    fn test_clamps_to_endpoints() {
        assert_eq!(nearest_index(&T, -3.0), Some(0));
        assert_eq!(bracket(&T, -3.0), Some((0, 0)));
        assert_eq!(nearest_index(&T, 0.0), Some(0));
        assert_eq!(nearest_index(&T, 100.0), Some(4));
        assert_eq!(bracket(&T, 8.0), Some((4, 4)));
    }

    #[test]
    fn test_bracket_interior() {
        assert_eq!(bracket(&T, 3.0), Some((2, 3)));
        assert_eq!(bracket(&T, 4.0), Some((3, 3)));
        assert_eq!(bracket(&T, 0.5), Some((0, 1)));
    }

    #[test]
    fn test_nearest_tie_prefers_earlier() {
        // 3.0 is equidistant from 2.0 and 4.0
        assert_eq!(nearest_index(&T, 3.0), Some(2));
        assert_eq!(nearest_index(&T, 3.1), Some(3));
        assert_eq!(nearest_index(&T, 5.9), Some(3));
        assert_eq!(nearest_index(&T, 6.1), Some(4));
    }

    #[test]
    fn test_interpolate() {
        let v = [0.0, 10.0, 20.0, 40.0, 0.0];
        assert_relative_eq!(interpolate(&T, &v, 0.5).unwrap(), 5.0);
        assert_relative_eq!(interpolate(&T, &v, 6.0).unwrap(), 20.0);
        assert_relative_eq!(interpolate(&T, &v, 99.0).unwrap(), 0.0);
        for (ti, vi) in T.iter().zip(v.iter()) {
            assert_eq!(interpolate(&T, &v, *ti), Some(*vi));
        }
    }

    #[test]
    fn test_interpolate_duplicate_timestamps() {
        let t = [0.0, 1.0, 1.0, 2.0];
        let v = [0.0, 5.0, 7.0, 9.0];
        // exact hit on a duplicate returns one of the duplicates' values
        let y = interpolate(&t, &v, 1.0).unwrap();
        assert!(y == 5.0 || y == 7.0);
    }

    #[test]
    fn test_window_min_max_ignores_nan() {
        let v = [1.0, f64::NAN, -3.0, 2.0, 9.0];
        assert_eq!(window_min_max(&T, &v, 0.0, 4.0), Some((-3.0, 2.0)));
        // window touching only part of the range includes bracket endpoints
        assert_eq!(window_min_max(&T, &v, 3.0, 5.0), Some((-3.0, 9.0)));
    }

    #[test]
    fn test_window_min_max_flat_is_padded() {
        let v = [5.0; 5];
        let (lo, hi) = window_min_max(&T, &v, 0.0, 8.0).unwrap();
        assert_relative_eq!(lo, 4.95, epsilon = 1e-12);
        assert_relative_eq!(hi, 5.05, epsilon = 1e-12);

        let z = [0.0; 5];
        let (lo, hi) = window_min_max(&T, &z, 0.0, 8.0).unwrap();
        assert_relative_eq!(lo, -1e-6);
        assert_relative_eq!(hi, 1e-6);
    }

    #[test]
    fn test_window_min_max_all_nan() {
        let v = [f64::NAN; 5];
        assert_eq!(window_min_max(&T, &v, 0.0, 8.0), None);
    }
}
