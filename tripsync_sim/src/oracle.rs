//! Ground truth oracle for replay scenarios.
//!
//! The oracle drives one vehicle along a smooth speed and heading profile,
//! keeps the true track at a fine resolution and renders it into a
//! [`TripDocument`] the way a recording rig would: GPS at a low rate with
//! Gaussian position noise, accelerometers at a higher rate, a distance
//! sensor, and a speeding evidence column.

use nalgebra::Vector2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde_json::json;
use tripsync_core::cursor::AxisPolicy;
use tripsync_core::geo::{haversine_m, GeoPoint, GeoProjector};
use tripsync_core::session::{GpsDocument, SeriesDocument};
use tripsync_core::time_index::interpolate;
use tripsync_core::{FilterConfig, GeoTrace, TimeSeries, TripDocument};
use tripsync_env::TripId;

/// Integration step of the true track (seconds).
const TRUTH_DT: f64 = 0.01;

/// Standard gravity (m/s²).
const G: f64 = 9.80665;

/// Shape of a synthetic trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TripProfile {
    pub duration_secs: f64,
    /// Mean cruise speed (km/h)
    pub cruise_kmh: f64,
    /// Amplitude of the periodic speed swing (km/h)
    pub swing_kmh: f64,
    /// Period of the speed swing (seconds)
    pub swing_period_secs: f64,
    /// Time to reach cruise speed from standstill (seconds)
    pub ramp_secs: f64,
    pub speed_limit_kmh: f64,
    pub heading_deg: f64,
    /// Constant turn rate (deg/s)
    pub turn_rate_dps: f64,
    pub origin: GeoPoint,
    pub gps_hz: f64,
    pub accel_hz: f64,
    /// GPS position noise (meters, 1 sigma)
    pub gps_noise_m: f64,
    /// Accelerometer noise (g, 1 sigma)
    pub accel_noise_g: f64,
    /// Fraction of GPS fixes replaced by gaps
    pub gps_dropout: f64,
    /// Uniform GPS timestamp jitter (± seconds); may reorder fixes
    pub gps_jitter_secs: f64,
    /// `dataStart - videoStart` of the recording
    pub offset_seconds: f64,
}

impl Default for TripProfile {
    fn default() -> Self {
        Self {
            duration_secs: 120.0,
            cruise_kmh: 80.0,
            swing_kmh: 15.0,
            swing_period_secs: 40.0,
            ramp_secs: 10.0,
            speed_limit_kmh: 90.0,
            heading_deg: 30.0,
            turn_rate_dps: 0.2,
            origin: GeoPoint::new(40.4168, -3.7038),
            gps_hz: 1.0,
            accel_hz: 10.0,
            gps_noise_m: 3.0,
            accel_noise_g: 0.03,
            gps_dropout: 0.0,
            gps_jitter_secs: 0.0,
            offset_seconds: 2.0,
        }
    }
}

impl TripProfile {
    /// True speed (km/h) at data time `t`.
    pub fn speed_kmh(&self, t: f64) -> f64 {
        let ramp = if self.ramp_secs > 0.0 { (t / self.ramp_secs).clamp(0.0, 1.0) } else { 1.0 };
        let phase = 2.0 * std::f64::consts::PI * t / self.swing_period_secs.max(1e-3);
        (ramp * (self.cruise_kmh + self.swing_kmh * phase.sin())).max(0.0)
    }

    pub fn heading_deg(&self, t: f64) -> f64 {
        self.heading_deg + self.turn_rate_dps * t
    }
}

/// True vehicle track at [`TRUTH_DT`] resolution, in data time.
#[derive(Debug, Clone, Default)]
pub struct TruthTrack {
    pub t: Vec<f64>,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub speed_kmh: Vec<f64>,
}

impl TruthTrack {
    fn integrate(profile: &TripProfile, projector: &GeoProjector) -> Self {
        let steps = (profile.duration_secs / TRUTH_DT).floor() as usize + 1;
        let mut track = Self::default();
        let mut pos = Vector2::zeros();
        for k in 0..steps {
            let t = k as f64 * TRUTH_DT;
            if k > 0 {
                let speed_ms = profile.speed_kmh(t - TRUTH_DT / 2.0) / 3.6;
                let heading = profile.heading_deg(t - TRUTH_DT / 2.0).to_radians();
                // east = sin(heading), north = cos(heading)
                pos += Vector2::new(heading.sin(), heading.cos()) * speed_ms * TRUTH_DT;
            }
            let geo = projector.to_geo(pos);
            track.t.push(t);
            track.lat.push(geo.lat);
            track.lon.push(geo.lon);
            track.speed_kmh.push(profile.speed_kmh(t));
        }
        track
    }

    /// True position at data time `t`.
    pub fn position_at(&self, t: f64) -> Option<GeoPoint> {
        Some(GeoPoint::new(
            interpolate(&self.t, &self.lat, t)?,
            interpolate(&self.t, &self.lon, t)?,
        ))
    }
}

/// The Oracle - maintains ground truth and renders noisy recordings.
pub struct TripOracle {
    /// Master seed for sensor noise
    physics_seed: u64,

    /// RNG for noise and dropouts
    physics_rng: ChaCha8Rng,

    profile: TripProfile,
    truth: TruthTrack,
}

impl TripOracle {
    /// Creates an oracle and integrates the true track.
    pub fn new(physics_seed: u64, profile: TripProfile) -> Self {
        let projector = GeoProjector::new(profile.origin)
            .or_else(|| GeoProjector::new(TripProfile::default().origin));
        let truth = projector
            .map(|p| TruthTrack::integrate(&profile, &p))
            .unwrap_or_default();
        Self {
            physics_seed,
            physics_rng: ChaCha8Rng::seed_from_u64(physics_seed),
            profile,
            truth,
        }
    }

    pub fn physics_seed(&self) -> u64 {
        self.physics_seed
    }

    pub fn profile(&self) -> &TripProfile {
        &self.profile
    }

    pub fn truth(&self) -> &TruthTrack {
        &self.truth
    }

    fn gaussian(&mut self, std_dev: f64) -> f64 {
        match Normal::new(0.0, std_dev) {
            Ok(normal) if std_dev > 0.0 => normal.sample(&mut self.physics_rng),
            _ => 0.0,
        }
    }

    fn sample_times(&self, hz: f64) -> Vec<f64> {
        if !(hz > 0.0) {
            return Vec::new();
        }
        let n = (self.profile.duration_secs * hz).floor() as usize + 1;
        (0..n).map(|i| i as f64 / hz).collect()
    }

    /// Renders one recording of the trip.
    ///
    /// Each call draws fresh noise from the oracle's RNG stream.
    pub fn record(&mut self, id: TripId) -> TripDocument {
        let gps = self.record_gps();
        let (speeding_rows, limit) = self.record_speeding(&gps);
        let mut doc = TripDocument::new(id, self.profile.offset_seconds);
        doc.series = self.record_accelerometers();
        doc.series.push(self.record_distance());
        doc.gps = Some(GpsDocument {
            trace: gps,
            speed_limit: Some(limit),
            filter: FilterConfig::default(),
        });
        doc.event_rows = speeding_rows;
        doc
    }

    fn record_gps(&mut self) -> GeoTrace {
        let times = self.sample_times(self.profile.gps_hz);
        let projector = GeoProjector::new(self.profile.origin);
        let mut trace = GeoTrace::new(Vec::new(), Vec::new(), Vec::new());
        let mut speed = Vec::with_capacity(times.len());

        for &t in &times {
            let truth = self.truth.position_at(t);
            let true_speed = self.profile.speed_kmh(t);
            let noise = Vector2::new(
                self.gaussian(self.profile.gps_noise_m),
                self.gaussian(self.profile.gps_noise_m),
            );
            let jitter = if self.profile.gps_jitter_secs > 0.0 {
                self.physics_rng.gen_range(-self.profile.gps_jitter_secs..self.profile.gps_jitter_secs)
            } else {
                0.0
            };
            let dropped = self.profile.gps_dropout > 0.0 && self.physics_rng.gen::<f64>() < self.profile.gps_dropout;

            let fix = match (truth, projector.as_ref()) {
                (Some(p), Some(proj)) if !dropped => proj.to_geo(proj.to_local(p) + noise),
                _ => GeoPoint::new(f64::NAN, f64::NAN),
            };
            trace.t.push(t + jitter);
            trace.lat.push(fix.lat);
            trace.lon.push(fix.lon);
            speed.push(if dropped { f64::NAN } else { (true_speed + self.gaussian(1.0)).max(0.0) });
        }
        trace.speed_kmh = Some(speed);
        trace
    }

    fn record_accelerometers(&mut self) -> Vec<SeriesDocument> {
        let times = self.sample_times(self.profile.accel_hz);
        let mut x = Vec::with_capacity(times.len());
        let mut y = Vec::with_capacity(times.len());
        let mut z = Vec::with_capacity(times.len());
        let h = 0.05;
        for &t in &times {
            // longitudinal: dv/dt, lateral: v * yaw rate
            let dv = (self.profile.speed_kmh(t + h) - self.profile.speed_kmh((t - h).max(0.0))) / 3.6;
            let longitudinal = dv / (t + h - (t - h).max(0.0)) / G;
            let lateral = self.profile.speed_kmh(t) / 3.6 * self.profile.turn_rate_dps.to_radians() / G;
            let noise = self.profile.accel_noise_g;
            x.push(longitudinal + self.gaussian(noise));
            y.push(lateral + self.gaussian(noise));
            z.push(self.gaussian(noise));
        }

        [("accel_x", x), ("accel_y", y), ("accel_z", z)]
            .into_iter()
            .map(|(key, v)| SeriesDocument {
                key: key.to_string(),
                data: TimeSeries::from_raw(times.clone(), v),
                policy: AxisPolicy::SymmetricAroundZero,
                filter: FilterConfig::default(),
            })
            .collect()
    }

    fn record_distance(&mut self) -> SeriesDocument {
        let times = self.sample_times(self.profile.gps_hz);
        let v: Vec<f64> = times
            .iter()
            .map(|&t| (25.0 + 10.0 * (t / 17.0).sin() + self.gaussian(0.5)).max(0.0))
            .collect();
        SeriesDocument {
            key: "veh_dist".to_string(),
            data: TimeSeries::from_raw(times, v),
            policy: AxisPolicy::NonNegative,
            filter: FilterConfig::default(),
        }
    }

    /// Provider rows `[t, speed, limit, isSpeeding]` plus the limit series.
    fn record_speeding(&self, gps: &GeoTrace) -> (Vec<serde_json::Value>, TimeSeries) {
        let limit = self.profile.speed_limit_kmh;
        let times = self.sample_times(self.profile.gps_hz);
        let rows = times
            .iter()
            .map(|&t| {
                let speed = self.profile.speed_kmh(t);
                json!([t, speed, limit, u8::from(speed > limit)])
            })
            .collect();
        let limit_series = TimeSeries::from_raw(vec![gps.t.first().copied().unwrap_or(0.0)], vec![limit]);
        (rows, limit_series)
    }

    /// Intervals (data time) where the true speed exceeds the limit.
    pub fn speeding_intervals(&self) -> Vec<(f64, f64)> {
        let mut out = Vec::new();
        let mut open: Option<f64> = None;
        for (&t, &v) in self.truth.t.iter().zip(self.truth.speed_kmh.iter()) {
            match (v > self.profile.speed_limit_kmh, open) {
                (true, None) => open = Some(t),
                (false, Some(start)) => {
                    out.push((start, t));
                    open = None;
                }
                _ => {}
            }
        }
        if let (Some(start), Some(&end)) = (open, self.truth.t.last()) {
            out.push((start, end));
        }
        out
    }

    /// RMS horizontal error (meters) of a video-time trace against the
    /// truth, skipping gaps.
    pub fn rms_error_m(&self, trace: &GeoTrace, offset: f64) -> Option<f64> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for i in 0..trace.len() {
            let p = GeoPoint::new(trace.lat[i], trace.lon[i]);
            if !p.is_finite() || !trace.t[i].is_finite() {
                continue;
            }
            let Some(truth) = self.truth.position_at(trace.t[i] - offset) else {
                continue;
            };
            sum += haversine_m(p, truth).powi(2);
            count += 1;
        }
        (count > 0).then(|| (sum / count as f64).sqrt())
    }
}
