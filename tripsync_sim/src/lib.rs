//! TripSync Deterministic Replay Harness
//!
//! Replays trips through a [`tripsync_core::TripSession`] under a virtual
//! playback clock, so cursor output, event ranges and filtered GPS tracks
//! can be checked against a known ground truth.
//!
//! # Core Principle
//!
//! All sources of non-determinism are controlled:
//! - **Time**: [`SimClock`] only moves when the replayer advances it
//! - **Randomness**: sensor noise derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  TripDocument  ┌─────────────┐  tick(now, video)  ┌──────────┐
//! │ TripOracle  │───────────────►│ TripSession │◄───────────────────│ Replayer │
//! │ (truth +    │                └──────┬──────┘                    │ SimClock │
//! │  noise)     │◄── RMS / marker ──────┘ TickFrame                 └──────────┘
//! └─────────────┘        error
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use tripsync_sim::{ScenarioRunner, ScenarioId};
//!
//! let result = ScenarioRunner::new(42).with_duration(30.0).run(ScenarioId::SyncOverride);
//! assert!(result.passed);
//! ```

mod clock;
mod error;
mod exporter;
mod oracle;
mod runner;
pub mod scenarios;

pub use clock::SimClock;
pub use error::SimError;
pub use exporter::{ReplayExport, ReplayFrame, ReplayNote};
pub use oracle::{TripOracle, TripProfile, TruthTrack};
pub use runner::{Replayer, ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
