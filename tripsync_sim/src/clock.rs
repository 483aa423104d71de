//! Virtual playback clock for deterministic replay.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tripsync_env::{EnvError, PlaybackClock};

#[derive(Debug, Clone, Copy)]
struct VirtualState {
    /// Virtual time since the clock was created (nanoseconds)
    time_ns: u64,
    /// Video position at `anchor_ns`
    anchor_video: f64,
    anchor_ns: u64,
    rate: f64,
}

impl VirtualState {
    fn video_time(&self) -> f64 {
        let elapsed = self.time_ns.saturating_sub(self.anchor_ns) as f64 / 1e9;
        self.anchor_video + elapsed * self.rate
    }
}

/// Playback clock whose time only moves when advanced.
///
/// Always playing. Clones share the same virtual time.
#[derive(Debug, Clone)]
pub struct SimClock {
    state: Arc<Mutex<VirtualState>>,
}

impl SimClock {
    /// Creates a clock at virtual time 0, video position `start`, rate 1.
    pub fn new(start: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(VirtualState {
                time_ns: 0,
                anchor_video: start,
                anchor_ns: 0,
                rate: 1.0,
            })),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut VirtualState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        self.with_state(|s| s.time_ns += duration.as_nanos() as u64);
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.with_state(|s| s.time_ns)
    }

    /// Jumps the video to `video_time` without moving virtual time.
    pub fn seek(&self, video_time: f64) -> Result<(), EnvError> {
        if !video_time.is_finite() {
            return Err(EnvError::InvalidTime(video_time));
        }
        self.with_state(|s| {
            s.anchor_video = video_time;
            s.anchor_ns = s.time_ns;
        });
        Ok(())
    }

    /// Changes the playback rate, keeping the current position.
    pub fn set_rate(&self, rate: f64) -> Result<(), EnvError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(EnvError::InvalidRate(rate));
        }
        self.with_state(|s| {
            s.anchor_video = s.video_time();
            s.anchor_ns = s.time_ns;
            s.rate = rate;
        });
        Ok(())
    }
}

impl PlaybackClock for SimClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    fn video_time(&self) -> f64 {
        self.with_state(|s| s.video_time())
    }
}
