//! Playback clock abstraction for the cursor loop.

use crate::error::EnvError;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// The video player as seen by the synchronization engine.
///
/// # Implementations
///
/// - **Production**: `WallClock` - playback position derived from `Instant`
/// - **Replay**: `SimClock` (in `tripsync_sim`) - virtual time advanced manually
pub trait PlaybackClock: Send + Sync {
    /// Monotonic time since the clock was created.
    ///
    /// Only used to pace cursor ticks, never to position data.
    fn now(&self) -> Duration;

    /// Current playback position of the video in seconds.
    fn video_time(&self) -> f64;
}

#[derive(Debug, Clone, Copy)]
struct PlaybackState {
    /// Video position at the last play/pause/seek
    anchor_video: f64,
    /// Monotonic time of the last play/pause/seek
    anchor_wall: Duration,
    playing: bool,
    rate: f64,
}

/// Production clock backed by `Instant`.
///
/// Behaves like a video element: paused on creation, `play()` starts
/// advancing the position at `rate`, `seek()` jumps.
pub struct WallClock {
    start: Instant,
    state: Mutex<PlaybackState>,
}

impl WallClock {
    /// Creates a paused clock positioned at 0.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            state: Mutex::new(PlaybackState {
                anchor_video: 0.0,
                anchor_wall: Duration::ZERO,
                playing: false,
                rate: 1.0,
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut PlaybackState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    fn position_at(state: &PlaybackState, wall: Duration) -> f64 {
        if !state.playing {
            return state.anchor_video;
        }
        let elapsed = wall.saturating_sub(state.anchor_wall).as_secs_f64();
        state.anchor_video + elapsed * state.rate
    }

    /// Starts (or resumes) playback.
    pub fn play(&self) {
        let wall = self.now();
        self.with_state(|s| {
            if !s.playing {
                s.anchor_wall = wall;
                s.playing = true;
            }
        });
    }

    /// Freezes the playback position.
    pub fn pause(&self) {
        let wall = self.now();
        self.with_state(|s| {
            s.anchor_video = Self::position_at(s, wall);
            s.anchor_wall = wall;
            s.playing = false;
        });
    }

    /// Jumps to `video_time` seconds.
    pub fn seek(&self, video_time: f64) -> Result<(), EnvError> {
        if !video_time.is_finite() || video_time < 0.0 {
            return Err(EnvError::InvalidTime(video_time));
        }
        let wall = self.now();
        self.with_state(|s| {
            s.anchor_video = video_time;
            s.anchor_wall = wall;
        });
        Ok(())
    }

    /// Changes the playback rate without moving the current position.
    pub fn set_rate(&self, rate: f64) -> Result<(), EnvError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(EnvError::InvalidRate(rate));
        }
        let wall = self.now();
        self.with_state(|s| {
            s.anchor_video = Self::position_at(s, wall);
            s.anchor_wall = wall;
            s.rate = rate;
        });
        Ok(())
    }

    /// Whether playback is running.
    pub fn is_playing(&self) -> bool {
        self.with_state(|s| s.playing)
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock for WallClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn video_time(&self) -> f64 {
        let wall = self.now();
        self.with_state(|s| Self::position_at(s, wall))
    }
}
