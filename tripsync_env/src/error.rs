//! Error types for the TripSync environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error, PartialEq)]
pub enum EnvError {
    /// Seek target is not a finite, non-negative time
    #[error("Invalid playback time: {0}")]
    InvalidTime(f64),

    /// Playback rate must be finite and non-negative
    #[error("Invalid playback rate: {0}")]
    InvalidRate(f64),

    /// Trip identifiers cannot be empty
    #[error("Invalid trip id: {0:?}")]
    InvalidTripId(String),
}

impl EnvError {
    /// Creates an invalid trip id error.
    pub fn trip_id(id: impl Into<String>) -> Self {
        Self::InvalidTripId(id.into())
    }
}
