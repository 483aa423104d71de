//! Constant-velocity Kalman filter over irregular time steps.
//!
//! One scalar channel at a time: accelerometer axes are filtered directly,
//! GPS is filtered as two independent channels in the local-meter frame
//! (see [`crate::gps`]).

use nalgebra::{Matrix2, RowVector2, Vector2};
use serde::{Deserialize, Serialize};

/// Initial variance on both position and velocity.
const INITIAL_VARIANCE: f64 = 10.0;

/// Filter state: `[pos, vel]` and its 2x2 covariance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KalmanState2 {
    pub state: Vector2<f64>,
    pub covariance: Matrix2<f64>,
}

impl KalmanState2 {
    /// State seeded from a first measurement, zero velocity.
    ///
    /// A non-finite first measurement seeds position 0.
    pub fn from_first(z0: f64) -> Self {
        let pos = if z0.is_finite() { z0 } else { 0.0 };
        Self {
            state: Vector2::new(pos, 0.0),
            covariance: Matrix2::from_diagonal_element(INITIAL_VARIANCE),
        }
    }

    pub fn position(&self) -> f64 {
        self.state[0]
    }

    pub fn velocity(&self) -> f64 {
        self.state[1]
    }
}

/// Smoothed output of one pass over a trace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KalmanOutput {
    pub positions: Vec<f64>,
    pub velocities: Vec<f64>,
}

/// 1-D constant-velocity Kalman filter.
///
/// Process noise follows a continuous white-acceleration model scaled by
/// `q = sigma_a²`; measurement noise is `r = sigma_z²`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalarKalmanFilter {
    /// Current estimate
    pub estimate: KalmanState2,

    /// Process noise intensity (sigma_a²)
    pub process_noise: f64,

    /// Measurement noise variance (sigma_z²)
    pub measurement_noise: f64,
}

impl ScalarKalmanFilter {
    /// Creates a filter; negative or non-finite sigmas clamp to 0.
    pub fn new(sigma_a: f64, sigma_z: f64) -> Self {
        let sigma_a = clamp_sigma(sigma_a);
        let sigma_z = clamp_sigma(sigma_z);
        Self {
            estimate: KalmanState2::from_first(0.0),
            process_noise: sigma_a * sigma_a,
            measurement_noise: sigma_z * sigma_z,
        }
    }

    /// Re-initializes the state from a first measurement.
    pub fn reset(&mut self, z0: f64) {
        self.estimate = KalmanState2::from_first(z0);
    }

    /// Prediction step: advance by `dt` seconds.
    ///
    /// `x' = F x`, `P' = F P Fᵀ + Q` with `F = [[1, dt], [0, 1]]`.
    pub fn predict(&mut self, dt: f64) {
        let transition = Matrix2::new(1.0, dt, 0.0, 1.0);

        let dt2 = dt * dt;
        let dt3 = dt2 * dt;
        let dt4 = dt2 * dt2;
        let q = self.process_noise;
        let noise = Matrix2::new(
            0.25 * dt4 * q, 0.5 * dt3 * q,
            0.5 * dt3 * q, dt2 * q,
        );

        self.estimate.state = transition * self.estimate.state;
        self.estimate.covariance =
            transition * self.estimate.covariance * transition.transpose() + noise;
    }

    /// Update step with a position measurement `z` (`H = [1, 0]`).
    ///
    /// A zero innovation variance yields zero gain.
    pub fn update(&mut self, z: f64) {
        let p = self.estimate.covariance;
        let innovation = z - self.estimate.state[0];
        let s = p[(0, 0)] + self.measurement_noise;
        let gain = if s != 0.0 {
            Vector2::new(p[(0, 0)] / s, p[(1, 0)] / s)
        } else {
            Vector2::zeros()
        };

        let h = RowVector2::new(1.0, 0.0);
        self.estimate.state += gain * innovation;
        self.estimate.covariance = (Matrix2::identity() - gain * h) * p;
    }

    /// Runs predict/update over a whole trace, starting from a fresh state.
    ///
    /// Steps with a non-positive (or non-finite) `dt` or a non-finite
    /// measurement are predict-only.
    pub fn filter(&mut self, t: &[f64], z: &[f64]) -> KalmanOutput {
        let n = t.len().min(z.len());
        let mut out = KalmanOutput {
            positions: Vec::with_capacity(n),
            velocities: Vec::with_capacity(n),
        };
        if n == 0 {
            return out;
        }

        self.reset(z[0]);
        out.positions.push(self.estimate.position());
        out.velocities.push(self.estimate.velocity());

        for i in 1..n {
            let dt_raw = t[i] - t[i - 1];
            let dt = if dt_raw.is_finite() && dt_raw > 0.0 { dt_raw } else { 0.0 };

            self.predict(dt);
            if z[i].is_finite() && dt != 0.0 {
                self.update(z[i]);
            }

            out.positions.push(self.estimate.position());
            out.velocities.push(self.estimate.velocity());
        }

        out
    }
}

fn clamp_sigma(sigma: f64) -> f64 {
    if sigma.is_finite() {
        sigma.max(0.0)
    } else {
        0.0
    }
}

/// Smoothed positions of `z` sampled at `t`.
pub fn smooth(t: &[f64], z: &[f64], sigma_a: f64, sigma_z: f64) -> Vec<f64> {
    ScalarKalmanFilter::new(sigma_a, sigma_z).filter(t, z).positions
}

/// Smoothed positions and velocities of `z` sampled at `t`.
pub fn smooth_with_velocity(t: &[f64], z: &[f64], sigma_a: f64, sigma_z: f64) -> KalmanOutput {
    ScalarKalmanFilter::new(sigma_a, sigma_z).filter(t, z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_filter_initialization() {
        let filter = ScalarKalmanFilter::new(1.5, 6.0);
        assert_relative_eq!(filter.process_noise, 2.25);
        assert_relative_eq!(filter.measurement_noise, 36.0);
        assert_eq!(filter.estimate.covariance, Matrix2::new(10.0, 0.0, 0.0, 10.0));
    }

    #[test]
    fn test_negative_sigmas_clamp() {
        let filter = ScalarKalmanFilter::new(-3.0, f64::NAN);
        assert_eq!(filter.process_noise, 0.0);
        assert_eq!(filter.measurement_noise, 0.0);
    }

    #[test]
    fn test_prediction_step() {
        let mut filter = ScalarKalmanFilter::new(0.0, 1.0);
        filter.estimate.state = Vector2::new(0.0, 2.0);
        filter.predict(0.5);
        assert_relative_eq!(filter.estimate.position(), 1.0);
        assert_relative_eq!(filter.estimate.velocity(), 2.0);
        // P00 = 10 + dt² * 10
        assert_relative_eq!(filter.estimate.covariance[(0, 0)], 12.5);
    }

    #[test]
    fn test_update_reduces_uncertainty() {
        let mut filter = ScalarKalmanFilter::new(1.0, 1.0);
        filter.reset(0.0);
        filter.predict(0.1);
        let before = filter.estimate.covariance.trace();
        filter.update(1.0);
        let after = filter.estimate.covariance.trace();
        assert!(after < before, "update should shrink covariance");
        assert!(filter.estimate.position() > 0.0 && filter.estimate.position() < 1.0);
    }

    #[test]
    fn test_constant_input_zero_noise() {
        let t = [0.0, 0.1, 0.25, 0.4, 1.0, 1.3];
        let z = [7.5; 6];
        let out = smooth_with_velocity(&t, &z, 0.0, 0.0);
        for (p, v) in out.positions.iter().zip(out.velocities.iter()) {
            assert_eq!(*p, 7.5);
            assert_eq!(*v, 0.0);
        }
    }

    #[test]
    fn test_deterministic() {
        let t: Vec<f64> = (0..200).map(|i| i as f64 * 0.05 + (i % 3) as f64 * 0.01).collect();
        let z: Vec<f64> = (0..200).map(|i| (i as f64 * 0.3).sin() * 4.0).collect();
        let a = smooth_with_velocity(&t, &z, 1.5, 6.0);
        let b = smooth_with_velocity(&t, &z, 1.5, 6.0);
        assert_eq!(a.positions.len(), 200);
        for i in 0..200 {
            assert_eq!(a.positions[i].to_bits(), b.positions[i].to_bits());
            assert_eq!(a.velocities[i].to_bits(), b.velocities[i].to_bits());
        }
    }

    #[test]
    fn test_gaps_are_predict_only() {
        let t = [0.0, 1.0, 1.0, 2.0, 3.0];
        let z = [0.0, 1.0, 50.0, f64::NAN, 3.0];
        let out = smooth(&t, &z, 0.0, 0.0);
        // zero-dt step ignores the 50.0 outlier
        assert_relative_eq!(out[2], out[1]);
        assert!(out.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_non_finite_first_sample_seeds_zero() {
        let out = smooth(&[0.0, 1.0], &[f64::NAN, f64::NAN], 1.0, 1.0);
        assert_eq!(out, vec![0.0, 0.0]);
    }

    #[test]
    fn test_smoothing_tracks_ramp() {
        let t: Vec<f64> = (0..100).map(|i| i as f64 * 0.1).collect();
        let z: Vec<f64> = t.iter().map(|x| 3.0 * x).collect();
        let out = smooth_with_velocity(&t, &z, 2.0, 0.5);
        assert_relative_eq!(out.velocities[99], 3.0, epsilon = 0.05);
        assert_relative_eq!(out.positions[99], z[99], epsilon = 0.05);
    }
}
