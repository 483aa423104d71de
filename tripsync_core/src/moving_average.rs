//! Centered moving average over a 1-D sequence.

/// Smallest accepted window.
pub const MIN_WINDOW: usize = 1;

/// Largest accepted window.
pub const MAX_WINDOW: usize = 301;

/// Window used when the requested one is not a number.
pub const DEFAULT_WINDOW: usize = 9;

/// Coerces a requested window to an odd length in `[1, 301]`.
///
/// Rounds to the nearest integer and clamps; an even result moves up to the
/// next odd value (still clamped, so 301 is the ceiling).
pub fn clamp_odd_window(requested: f64) -> usize {
    if !requested.is_finite() {
        return DEFAULT_WINDOW;
    }
    let clamped = requested
        .round()
        .clamp(MIN_WINDOW as f64, MAX_WINDOW as f64) as usize;
    if clamped % 2 == 1 {
        clamped
    } else {
        (clamped + 1).min(MAX_WINDOW)
    }
}

/// Centered moving average with window `window` (coerced to odd).
///
/// Each output averages the finite values within `half = window / 2`
/// samples on either side, clipped at the ends. When the local window holds
/// no finite value the input passes through unchanged.
pub fn centered(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let w = clamp_odd_window(window as f64);
    let half = w / 2;

    (0..n)
        .map(|i| {
            let a = i.saturating_sub(half);
            let b = (i + half).min(n - 1);
            let (sum, count) = values[a..=b]
                .iter()
                .filter(|v| v.is_finite())
                .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            if count > 0 {
                sum / count as f64
            } else {
                values[i]
            }
        })
        .collect()
}
