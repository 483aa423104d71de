//! Replay scenarios for the synchronization engine.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// RPL-001: Low-noise drive, Kalman GPS beats the raw fixes
    CleanDrive,

    /// RPL-002: 10 m GPS noise
    NoisyGps,

    /// RPL-003: GPS gaps and jittered timestamps through the 10 Hz resampler
    Dropouts,

    /// RPL-004: Sync override changed mid-replay
    SyncOverride,

    /// RPL-005: Speeding evidence collapsed into event ranges
    Speeding,

    /// RPL-006: Axis windows over a full replay
    AxisStability,

    /// RPL-007: 240 Hz frame callbacks against the 30 Hz tick gate
    RapidTicks,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::CleanDrive,
            ScenarioId::NoisyGps,
            ScenarioId::Dropouts,
            ScenarioId::SyncOverride,
            ScenarioId::Speeding,
            ScenarioId::AxisStability,
            ScenarioId::RapidTicks,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::CleanDrive => "clean_drive",
            ScenarioId::NoisyGps => "noisy_gps",
            ScenarioId::Dropouts => "dropouts",
            ScenarioId::SyncOverride => "sync_override",
            ScenarioId::Speeding => "speeding",
            ScenarioId::AxisStability => "axis_stability",
            ScenarioId::RapidTicks => "rapid_ticks",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::CleanDrive => "3 m GPS noise, Kalman track must beat the raw fixes",
            ScenarioId::NoisyGps => "10 m GPS noise, Kalman track within 70% of raw error",
            ScenarioId::Dropouts => "20% GPS gaps + 0.3 s jitter, resampled to a clean 10 Hz grid",
            ScenarioId::SyncOverride => "override set mid-replay, events and map marker follow it",
            ScenarioId::Speeding => "speeding ranges match the true over-limit intervals",
            ScenarioId::AxisStability => "axis windows stay finite, ordered and policy-shaped",
            ScenarioId::RapidTicks => "240 Hz frame callbacks coalesced to at most 30 Hz",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clean_drive" | "cleandrive" | "rpl-001" => Ok(ScenarioId::CleanDrive),
            "noisy_gps" | "noisygps" | "rpl-002" => Ok(ScenarioId::NoisyGps),
            "dropouts" | "rpl-003" => Ok(ScenarioId::Dropouts),
            "sync_override" | "syncoverride" | "rpl-004" => Ok(ScenarioId::SyncOverride),
            "speeding" | "rpl-005" => Ok(ScenarioId::Speeding),
            "axis_stability" | "axisstability" | "rpl-006" => Ok(ScenarioId::AxisStability),
            "rapid_ticks" | "rapidticks" | "rpl-007" => Ok(ScenarioId::RapidTicks),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for id in ScenarioId::all() {
            assert_eq!(id.name().parse::<ScenarioId>(), Ok(id));
        }
        assert_eq!("RPL-004".parse::<ScenarioId>(), Ok(ScenarioId::SyncOverride));
        assert!("time_warp".parse::<ScenarioId>().is_err());
    }
}
