//! Local tangent-plane projection and great-circle helpers.
//!
//! GPS fixes are filtered and resampled in a planar meter frame anchored at
//! the first valid fix of a trace:
//!
//! ```text
//! x = rad(lon - lon0) * R * cos(rad(lat0))     (east)
//! y = rad(lat - lat0) * R                      (north)
//! ```
//!
//! The equirectangular approximation is accurate to well under a meter over
//! the extent of a single drive.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Projector between degrees and the local meter frame of one trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoProjector {
    origin: GeoPoint,
    /// cos(lat0), cached
    cos0: f64,
}

impl GeoProjector {
    /// Projector anchored at `origin`; `None` if the origin is not finite.
    pub fn new(origin: GeoPoint) -> Option<Self> {
        if !origin.is_finite() {
            return None;
        }
        Some(Self {
            origin,
            cos0: origin.lat.to_radians().cos(),
        })
    }

    /// Projector anchored at the first sample with finite lat and lon.
    ///
    /// `None` when the trace has no such sample; callers then pass the trace
    /// through unfiltered.
    pub fn from_trace(lat: &[f64], lon: &[f64]) -> Option<Self> {
        lat.iter()
            .zip(lon.iter())
            .map(|(&la, &lo)| GeoPoint::new(la, lo))
            .find(GeoPoint::is_finite)
            .and_then(Self::new)
    }

    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    /// Degrees to local meters; non-finite input maps to NaN.
    pub fn to_local(&self, p: GeoPoint) -> Vector2<f64> {
        if !p.is_finite() {
            return Vector2::new(f64::NAN, f64::NAN);
        }
        Vector2::new(
            (p.lon - self.origin.lon).to_radians() * EARTH_RADIUS_M * self.cos0,
            (p.lat - self.origin.lat).to_radians() * EARTH_RADIUS_M,
        )
    }

    /// Local meters back to degrees; non-finite input maps to NaN.
    pub fn to_geo(&self, local: Vector2<f64>) -> GeoPoint {
        if !local.x.is_finite() || !local.y.is_finite() {
            return GeoPoint::new(f64::NAN, f64::NAN);
        }
        GeoPoint::new(
            self.origin.lat + (local.y / EARTH_RADIUS_M).to_degrees(),
            self.origin.lon + (local.x / (EARTH_RADIUS_M * self.cos0)).to_degrees(),
        )
    }

    /// Projects parallel lat/lon arrays into parallel x/y arrays.
    pub fn project(&self, lat: &[f64], lon: &[f64]) -> (Vec<f64>, Vec<f64>) {
        lat.iter()
            .zip(lon.iter())
            .map(|(&la, &lo)| {
                let v = self.to_local(GeoPoint::new(la, lo));
                (v.x, v.y)
            })
            .unzip()
    }

    /// Inverse of [`project`](Self::project); returns `(lat, lon)`.
    pub fn unproject(&self, x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
        x.iter()
            .zip(y.iter())
            .map(|(&xi, &yi)| {
                let p = self.to_geo(Vector2::new(xi, yi));
                (p.lat, p.lon)
            })
            .unzip()
    }
}

/// Great-circle distance in meters.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial bearing from `a` to `b` in degrees, `[0, 360)`, 0 = north.
pub fn bearing_deg(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let y = d_lon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Heading of the vehicle at sample `idx`, from its neighbours.
///
/// Uses the samples at `idx - 1` and `idx + 1` (clamped to the trace), so
/// the heading is defined at both ends. `None` if either neighbour is not a
/// finite fix.
pub fn heading_at(lat: &[f64], lon: &[f64], idx: usize) -> Option<f64> {
    let n = lat.len().min(lon.len());
    if idx >= n {
        return None;
    }
    let prev = idx.saturating_sub(1);
    let next = (idx + 1).min(n - 1);
    let a = GeoPoint::new(lat[prev], lon[prev]);
    let b = GeoPoint::new(lat[next], lon[next]);
    if !a.is_finite() || !b.is_finite() {
        return None;
    }
    Some(bearing_deg(a, b))
}
