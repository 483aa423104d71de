//! Common types for the TripSync environment abstraction.

use crate::error::EnvError;
use serde::{Deserialize, Serialize};

/// Identifier of one recorded trip.
///
/// Trip ids are the dataset-relative folder path with `/` replaced by `|`,
/// e.g. `D1|20151110175712-16km-D1-NORMAL1-SECONDARY`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TripId(String);

impl TripId {
    /// Creates a trip id, rejecting empty or whitespace-only strings.
    pub fn new(id: impl Into<String>) -> Result<Self, EnvError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(EnvError::trip_id(id));
        }
        Ok(Self(id))
    }

    /// Builds a trip id from a dataset-relative folder path.
    pub fn from_relative_path(path: &str) -> Result<Self, EnvError> {
        Self::new(path.trim_matches('/').replace('/', "|"))
    }

    /// Driver folder (first path component), e.g. `D1`.
    pub fn driver(&self) -> &str {
        self.0.split('|').next().unwrap_or(&self.0)
    }

    /// Trip folder name (last path component).
    pub fn label(&self) -> &str {
        self.0.rsplit('|').next().unwrap_or(&self.0)
    }

    /// Returns the raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TripId {
    type Error = EnvError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TripId> for String {
    fn from(id: TripId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TripId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_id_rejected() {
        assert_eq!(TripId::new("  "), Err(EnvError::InvalidTripId("  ".to_string())));
    }

    #[test]
    fn test_driver_and_label() {
        let id = TripId::from_relative_path("D1/20151110175712-16km-D1-NORMAL1-SECONDARY").unwrap();
        assert_eq!(id.as_str(), "D1|20151110175712-16km-D1-NORMAL1-SECONDARY");
        assert_eq!(id.driver(), "D1");
        assert_eq!(id.label(), "20151110175712-16km-D1-NORMAL1-SECONDARY");
    }
}
