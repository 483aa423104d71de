//! Error types for the replay harness.

use thiserror::Error;
use tripsync_core::TripError;
use tripsync_env::EnvError;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Trip(#[from] TripError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Trip has no replayable data")]
    EmptyTrip,
}
