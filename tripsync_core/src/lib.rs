//! TripSync Core - Trip Telemetry Synchronization & Signal Processing
//!
//! Aligns independently-timestamped sensor streams with a video playback
//! clock and prepares them for a real-time cursor:
//! 1. **Sync**: one offset per trip shifts every series into video time
//! 2. **Denoising**: constant-velocity Kalman filters and centered moving
//!    averages, GPS filtered in a local meter frame
//! 3. **Cursor**: nearest/interpolated lookups and smoothed axis windows
//!    evaluated at up to 30 Hz
//! 4. **Events**: boolean evidence columns collapsed into time ranges

pub mod compare;
pub mod config;
pub mod cursor;
pub mod error;
pub mod events;
pub mod geo;
pub mod gps;
pub mod kalman;
pub mod moving_average;
pub mod series;
pub mod session;
pub mod sync;
pub mod time_index;

// Re-export key types for convenience
pub use config::{CursorConfig, FilterConfig, FilterKind};
pub use cursor::{AxisPolicy, AxisWindow, CursorEngine, CursorSeries, SeriesTick, TickGate};
pub use error::TripError;
pub use events::{EventRange, EventRangeBuilder, EventRow};
pub use geo::{GeoPoint, GeoProjector};
pub use kalman::ScalarKalmanFilter;
pub use series::{GeoTrace, TimeSeries};
pub use session::{SessionOptions, TickFrame, TripDocument, TripSession};
pub use sync::{MemoryOverrideStore, SledOverrideStore, SyncOverrideStore};
