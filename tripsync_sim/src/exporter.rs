//! JSON exporter for replay runs.
//!
//! Exports the ticked cursor frames of one replay so they can be plotted
//! next to the video offline.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tripsync_core::events::EventRange;
use tripsync_core::geo::GeoPoint;
use tripsync_core::session::TickFrame;

/// A single admitted tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayFrame {
    /// Virtual time since the replay started (seconds)
    pub time_sec: f64,

    /// Cursor output at this tick
    #[serde(flatten)]
    pub tick: TickFrame,

    /// True position at this video time, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truth: Option<GeoPoint>,

    /// Horizontal error of the map marker (meters)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_error_m: Option<f64>,
}

/// Replay notes (reloads, overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayNote {
    pub time_sec: f64,
    pub message: String,
}

/// Complete replay export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayExport {
    /// Scenario name, or `trip` for a replayed document
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Trip id
    pub trip: String,

    /// Offset in effect at the end of the replay
    pub offset_seconds: f64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<ReplayFrame>,

    /// Event ranges at the end of the replay
    pub events: Vec<EventRange>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<ReplayNote>,

    /// Final results
    pub passed: bool,

    /// Final RMS error of the filtered GPS trace, if applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_rms_error: Option<f64>,
}

impl ReplayExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64, trip: &str) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            trip: trip.to_string(),
            offset_seconds: 0.0,
            duration_sec: 0.0,
            frames: Vec::new(),
            events: Vec::new(),
            notes: Vec::new(),
            passed: false,
            final_rms_error: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: ReplayFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    pub fn add_note(&mut self, time_sec: f64, message: impl Into<String>) {
        self.notes.push(ReplayNote {
            time_sec,
            message: message.into(),
        });
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, offset_seconds: f64, events: &[EventRange], rms_error: Option<f64>) {
        self.passed = passed;
        self.offset_seconds = offset_seconds;
        self.events = events.to_vec();
        self.final_rms_error = rms_error;
    }

    /// Writes to a JSON file.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
