//! TripSync Environment Abstraction Layer
//!
//! The synchronization engine never touches a video element, a wall clock or
//! a settings store directly. This crate names those collaborators so the
//! engine can be driven by a real player in production and by a virtual
//! clock in the replay harness.
//!
//! # Collaborators
//!
//! - Playback clock (`video_time()`, `now()`)
//! - Trip identity (`TripId`)
//!
//! # Example
//!
//! ```ignore
//! use tripsync_env::{PlaybackClock, WallClock};
//!
//! let clock = WallClock::new();
//! clock.play();
//! loop {
//!     session.tick(clock.now(), clock.video_time());
//! }
//! ```

mod clock;
mod error;
mod types;

pub use clock::{PlaybackClock, WallClock};
pub use error::EnvError;
pub use types::TripId;
