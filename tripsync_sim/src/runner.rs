//! Scenario runner - replays synthetic trips through a `TripSession`.

use crate::clock::SimClock;
use crate::error::SimError;
use crate::exporter::{ReplayExport, ReplayFrame};
use crate::oracle::{TripOracle, TripProfile};
use crate::scenarios::ScenarioId;

use std::time::Duration;
use tracing::{debug, info, warn};
use tripsync_core::cursor::AxisPolicy;
use tripsync_core::geo::{haversine_m, GeoPoint};
use tripsync_core::session::{TickFrame, GPS_SPEED_KEY};
use tripsync_core::sync::{with_defaults, DefaultOverrides};
use tripsync_core::{
    FilterConfig, SessionOptions, SledOverrideStore, SyncOverrideStore, TripDocument, TripSession,
};
use tripsync_env::{PlaybackClock, TripId};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Frame callbacks issued by the simulated player
    pub total_ticks: u64,

    /// Final virtual time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Ticks admitted by the session's tick gate
    pub frames: u64,

    /// RMS error of the unfiltered GPS fixes (m)
    pub raw_rms_m: Option<f64>,

    /// RMS error of the filtered GPS trace (m)
    pub filtered_rms_m: Option<f64>,

    /// Largest map marker error seen in a frame (m)
    pub max_marker_error_m: Option<f64>,

    /// Event ranges at the end of the run
    pub event_ranges: usize,

    /// Session reloads after the initial load
    pub reloads: u64,

    /// Tick outputs breaking an axis invariant
    pub axis_violations: u64,
}

impl ScenarioMetrics {
    fn observe_marker(&mut self, frame: &ReplayFrame) {
        if let Some(err) = frame.marker_error_m {
            self.max_marker_error_m = Some(self.max_marker_error_m.map_or(err, |m| m.max(err)));
        }
    }
}

/// Drives a session with player frame callbacks on a virtual clock.
pub struct Replayer {
    clock: SimClock,
    frame_dt: Duration,
    callbacks: u64,
}

impl Replayer {
    /// Creates a replayer issuing `frame_hz` callbacks per virtual second.
    pub fn new(clock: SimClock, frame_hz: u32) -> Self {
        Self {
            clock,
            frame_dt: Duration::from_secs_f64(1.0 / frame_hz.max(1) as f64),
            callbacks: 0,
        }
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Callbacks issued so far.
    pub fn callbacks(&self) -> u64 {
        self.callbacks
    }

    /// Issues callbacks for `secs` of virtual time.
    ///
    /// Every callback offers the current video time to the session; admitted
    /// frames are handed to `on_frame` with the virtual time in seconds.
    /// Returns the number of admitted frames.
    pub fn run_for(
        &mut self,
        session: &mut TripSession,
        secs: f64,
        mut on_frame: impl FnMut(f64, TickFrame),
    ) -> u64 {
        let n = (secs.max(0.0) / self.frame_dt.as_secs_f64()).round() as u64;
        let mut admitted = 0;
        for _ in 0..n {
            let now = self.clock.now();
            if let Some(frame) = session.tick(now, self.clock.video_time()) {
                on_frame(now.as_secs_f64(), frame);
                admitted += 1;
            }
            self.clock.advance_time(self.frame_dt);
            self.callbacks += 1;
        }
        admitted
    }
}

/// Attaches ground truth to an admitted frame.
fn observe(oracle: &TripOracle, offset: f64, time_sec: f64, tick: TickFrame) -> ReplayFrame {
    let truth = oracle.truth().position_at(tick.video_time - offset);
    let marker_error_m = match (tick.gps, truth) {
        (Some(gps), Some(p)) => Some(haversine_m(GeoPoint::new(gps.lat, gps.lon), p)),
        _ => None,
    };
    ReplayFrame {
        time_sec,
        tick,
        truth,
        marker_error_m,
    }
}

/// Runs replay scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Frame callback rate of the simulated player in Hz
    tick_rate_hz: u32,

    /// Maximum duration in seconds
    max_duration_secs: f64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            tick_rate_hz: 60,
            max_duration_secs: 60.0,
        }
    }

    /// Sets the frame callback rate.
    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz.max(1);
        self
    }

    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            self.max_duration_secs = secs;
        }
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.run_with_export(scenario).0
    }

    /// Runs a scenario and keeps every admitted frame.
    pub fn run_with_export(&self, scenario: ScenarioId) -> (ScenarioResult, ReplayExport) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let mut export = ReplayExport::new(scenario.name(), self.seed, "");
        let outcome = match scenario {
            ScenarioId::CleanDrive => self.run_clean_drive(&mut export),
            ScenarioId::NoisyGps => self.run_noisy_gps(&mut export),
            ScenarioId::Dropouts => self.run_dropouts(&mut export),
            ScenarioId::SyncOverride => self.run_sync_override(&mut export),
            ScenarioId::Speeding => self.run_speeding(&mut export),
            ScenarioId::AxisStability => self.run_axis_stability(&mut export),
            ScenarioId::RapidTicks => self.run_rapid_ticks(&mut export),
        };

        let result = outcome.unwrap_or_else(|e| {
            warn!("Scenario {} aborted: {}", scenario.name(), e);
            ScenarioResult {
                scenario,
                seed: self.seed,
                passed: false,
                total_ticks: 0,
                final_time_secs: 0.0,
                failure_reason: Some(e.to_string()),
                metrics: ScenarioMetrics::default(),
            }
        });
        export.passed = result.passed;
        (result, export)
    }

    fn profile(&self) -> TripProfile {
        TripProfile {
            duration_secs: self.max_duration_secs,
            ..Default::default()
        }
    }

    /// Builds the oracle and records one trip from it.
    fn record(&self, scenario: ScenarioId, profile: TripProfile) -> Result<(TripOracle, TripDocument), SimError> {
        let physics_seed = self.seed.wrapping_mul(0x9e3779b97f4a7c15);
        let mut oracle = TripOracle::new(physics_seed, profile);
        let id = TripId::new(format!("SIM|20240101000000-{}", scenario.name()))?;
        let doc = oracle.record(id);
        Ok((oracle, doc))
    }

    fn replayer(&self) -> Replayer {
        Replayer::new(SimClock::new(0.0), self.tick_rate_hz)
    }

    fn finish(
        &self,
        scenario: ScenarioId,
        session: &TripSession,
        replayer: &Replayer,
        export: &mut ReplayExport,
        mut metrics: ScenarioMetrics,
        failures: Vec<String>,
    ) -> ScenarioResult {
        let passed = failures.is_empty();
        metrics.event_ranges = session.events().len();
        export.trip = session.id().to_string();
        export.finalize(passed, session.effective_offset(), session.events(), metrics.filtered_rms_m);

        if passed {
            info!(
                "✓ {} complete: {} frames, {} callbacks",
                scenario.name(),
                metrics.frames,
                replayer.callbacks()
            );
        }

        ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            total_ticks: replayer.callbacks(),
            final_time_secs: replayer.clock().now().as_secs_f64(),
            failure_reason: (!passed).then(|| failures.join("; ")),
            metrics,
        }
    }

    /// Shared body of the GPS accuracy scenarios.
    ///
    /// The filtered trace must stay under `max_ratio` of the raw RMS error
    /// and, when given, under `max_abs_m`.
    fn run_gps_accuracy(
        &self,
        scenario: ScenarioId,
        profile: TripProfile,
        filter: FilterConfig,
        max_ratio: f64,
        max_abs_m: Option<f64>,
        export: &mut ReplayExport,
    ) -> Result<ScenarioResult, SimError> {
        let (oracle, mut doc) = self.record(scenario, profile)?;
        let mut metrics = ScenarioMetrics::default();
        if let Some(gps) = doc.gps.as_mut() {
            metrics.raw_rms_m = oracle.rms_error_m(&gps.trace, 0.0);
            gps.filter = filter;
        }

        let mut session = TripSession::load(doc, None, SessionOptions::default());
        let offset = session.effective_offset();
        let mut replayer = self.replayer();
        metrics.frames = replayer.run_for(&mut session, self.max_duration_secs, |time_sec, tick| {
            let frame = observe(&oracle, offset, time_sec, tick);
            metrics.observe_marker(&frame);
            export.add_frame(frame);
        });
        metrics.filtered_rms_m = oracle.rms_error_m(session.gps(), offset);

        let mut failures = Vec::new();
        match (metrics.raw_rms_m, metrics.filtered_rms_m) {
            (Some(raw), Some(filtered)) => {
                info!("  raw RMS {:.2}m → filtered RMS {:.2}m", raw, filtered);
                if filtered >= raw * max_ratio {
                    failures.push(format!(
                        "filtered RMS {:.2}m not below {:.0}% of raw {:.2}m",
                        filtered,
                        max_ratio * 100.0,
                        raw
                    ));
                }
                if let Some(limit) = max_abs_m.filter(|limit| filtered >= *limit) {
                    failures.push(format!("filtered RMS {:.2}m exceeds {:.1}m", filtered, limit));
                }
            }
            _ => failures.push("no GPS fixes to compare".to_string()),
        }
        Ok(self.finish(scenario, &session, &replayer, export, metrics, failures))
    }

    /// RPL-001: 5 Hz fixes with 3 m noise.
    fn run_clean_drive(&self, export: &mut ReplayExport) -> Result<ScenarioResult, SimError> {
        info!("RPL-001: CleanDrive");
        let profile = TripProfile {
            gps_hz: 5.0,
            gps_noise_m: 3.0,
            ..self.profile()
        };
        self.run_gps_accuracy(
            ScenarioId::CleanDrive,
            profile,
            FilterConfig::kalman(3.0, 3.0),
            0.8,
            Some(3.0),
            export,
        )
    }

    /// RPL-002: 5 Hz fixes with 10 m noise.
    fn run_noisy_gps(&self, export: &mut ReplayExport) -> Result<ScenarioResult, SimError> {
        info!("RPL-002: NoisyGps");
        let profile = TripProfile {
            gps_hz: 5.0,
            gps_noise_m: 10.0,
            ..self.profile()
        };
        self.run_gps_accuracy(
            ScenarioId::NoisyGps,
            profile,
            FilterConfig::kalman(3.0, 10.0),
            0.7,
            None,
            export,
        )
    }

    /// RPL-003: 1 Hz fixes with gaps and timestamp jitter, resampled to 10 Hz.
    fn run_dropouts(&self, export: &mut ReplayExport) -> Result<ScenarioResult, SimError> {
        info!("RPL-003: Dropouts");
        let profile = TripProfile {
            gps_dropout: 0.2,
            gps_jitter_secs: 0.05,
            ..self.profile()
        };
        let (oracle, mut doc) = self.record(ScenarioId::Dropouts, profile)?;
        let mut metrics = ScenarioMetrics::default();
        if let Some(gps) = doc.gps.as_mut() {
            metrics.raw_rms_m = oracle.rms_error_m(&gps.trace, 0.0);
            gps.filter = FilterConfig::kalman(3.0, 3.0).with_resample(true);
        }

        let mut session = TripSession::load(doc, None, SessionOptions::default());
        let offset = session.effective_offset();
        let mut replayer = self.replayer();
        let mut missing_marker = 0u64;
        metrics.frames = replayer.run_for(&mut session, self.max_duration_secs, |time_sec, tick| {
            if tick.gps.is_none() {
                missing_marker += 1;
            }
            let frame = observe(&oracle, offset, time_sec, tick);
            metrics.observe_marker(&frame);
            export.add_frame(frame);
        });
        metrics.filtered_rms_m = oracle.rms_error_m(session.gps(), offset);

        let gps = session.gps();
        let mut failures = Vec::new();
        if gps.len() < 2 {
            failures.push(format!("resampled trace has {} samples", gps.len()));
        }
        if gps.lat.iter().chain(gps.lon.iter()).any(|v| !v.is_finite()) {
            failures.push("resampled trace contains gaps".to_string());
        }
        if let Some(w) = gps.t.windows(2).find(|w| (w[1] - w[0] - 0.1).abs() > 1e-9) {
            failures.push(format!("irregular resample step {:.4}s", w[1] - w[0]));
        }
        if missing_marker > 0 {
            failures.push(format!("{} frames without a map marker", missing_marker));
        }
        match metrics.filtered_rms_m {
            Some(rms) if rms < 6.0 => debug!("  filtered RMS {:.2}m", rms),
            Some(rms) => failures.push(format!("filtered RMS {:.2}m exceeds 6.0m", rms)),
            None => failures.push("no GPS fixes to compare".to_string()),
        }
        Ok(self.finish(ScenarioId::Dropouts, &session, &replayer, export, metrics, failures))
    }

    /// RPL-004: the user corrects the sync offset halfway through.
    ///
    /// With noise-free fixes the map marker must track the truth under both
    /// offsets, and the override must survive in the store.
    fn run_sync_override(&self, export: &mut ReplayExport) -> Result<ScenarioResult, SimError> {
        info!("RPL-004: SyncOverride");
        const SHIFT: f64 = 1.5;
        const MAX_MARKER_ERROR_M: f64 = 1.0;

        let profile = TripProfile {
            gps_noise_m: 0.0,
            ..self.profile()
        };
        let base_offset = profile.offset_seconds;
        let (oracle, doc) = self.record(ScenarioId::SyncOverride, profile)?;
        let store = with_defaults(SledOverrideStore::open_temp()?, DefaultOverrides::builtin());

        let mut session = TripSession::load_with_store(doc, &store, SessionOptions::default());
        let mut metrics = ScenarioMetrics::default();
        let mut failures = Vec::new();
        if session.effective_offset() != base_offset {
            failures.push(format!("initial offset {} != {}", session.effective_offset(), base_offset));
        }

        let mut replayer = self.replayer();
        let half = self.max_duration_secs / 2.0;
        let mut max_error = [0.0f64; 2];

        let offset = session.effective_offset();
        let before = replayer.run_for(&mut session, half, |time_sec, tick| {
            let frame = observe(&oracle, offset, time_sec, tick);
            max_error[0] = max_error[0].max(frame.marker_error_m.unwrap_or(0.0));
            metrics.observe_marker(&frame);
            export.add_frame(frame);
        });

        let events_before = session.events().to_vec();
        let generation_before = session.generation();
        let new_offset = base_offset + SHIFT;
        session.set_override(&store, Some(new_offset))?;
        metrics.reloads += 1;
        export.add_note(replayer.clock().now().as_secs_f64(), format!("override set to {:.2}s", new_offset));
        info!("  ⏱ Override set to {:.2}s at t={:.1}s", new_offset, half);

        if session.generation() != generation_before + 1 {
            failures.push("override did not reload the session".to_string());
        }
        if store.get(session.id()) != Some(new_offset) {
            failures.push("override not persisted".to_string());
        }
        let stale_axes = session
            .cursor()
            .series()
            .iter()
            .filter(|s| session.cursor().axis_window(&s.key).is_some_and(|w| w.min.is_some()))
            .count();
        if stale_axes > 0 {
            failures.push(format!("{} axis windows survived the reload", stale_axes));
        }
        let events_after = session.events();
        let shifted = events_before.len() == events_after.len()
            && events_before
                .iter()
                .zip(events_after.iter())
                .all(|(a, b)| (b.t - a.t - SHIFT).abs() < 1e-9 && a.duration_seconds == b.duration_seconds);
        if !shifted {
            failures.push("event ranges did not follow the override".to_string());
        }

        let offset = session.effective_offset();
        let after = replayer.run_for(&mut session, self.max_duration_secs - half, |time_sec, tick| {
            let frame = observe(&oracle, offset, time_sec, tick);
            max_error[1] = max_error[1].max(frame.marker_error_m.unwrap_or(0.0));
            metrics.observe_marker(&frame);
            export.add_frame(frame);
        });

        metrics.frames = before + after;

        for (phase, err) in ["before", "after"].iter().zip(max_error) {
            if err > MAX_MARKER_ERROR_M {
                failures.push(format!("marker error {:.2}m {} override", err, phase));
            }
        }
        Ok(self.finish(ScenarioId::SyncOverride, &session, &replayer, export, metrics, failures))
    }

    /// RPL-005: speeding evidence rows against the true over-limit intervals.
    fn run_speeding(&self, export: &mut ReplayExport) -> Result<ScenarioResult, SimError> {
        info!("RPL-005: Speeding");
        let profile = self.profile();
        let step = 1.0 / profile.gps_hz;
        let (oracle, doc) = self.record(ScenarioId::Speeding, profile)?;
        let mut session = TripSession::load(doc, None, SessionOptions::default());
        let offset = session.effective_offset();

        let mut metrics = ScenarioMetrics::default();
        let mut replayer = self.replayer();
        metrics.frames = replayer.run_for(&mut session, self.max_duration_secs, |time_sec, tick| {
            export.add_frame(observe(&oracle, offset, time_sec, tick));
        });

        let truth: Vec<(f64, f64)> = oracle
            .speeding_intervals()
            .into_iter()
            .map(|(start, end)| (start + offset, end + offset))
            .collect();
        let ranges = session.events();
        let tolerance = step + 1e-9;
        let mut failures = Vec::new();

        for &(start, end) in truth.iter().filter(|(start, end)| end - start >= 2.0 * step) {
            if !ranges.iter().any(|r| (r.t - start).abs() <= tolerance) {
                failures.push(format!("no range for speeding at {:.1}s-{:.1}s", start, end));
            }
        }
        for range in ranges {
            let end = range.t + range.duration_seconds;
            let overlaps = truth
                .iter()
                .any(|&(start, stop)| range.t < stop + tolerance && end > start - tolerance);
            if !overlaps {
                failures.push(format!("spurious range at {:.1}s", range.t));
            }
            if range.label != "Speeding" {
                failures.push(format!("unexpected label {}", range.label));
            }
        }
        info!("  {} true intervals, {} event ranges", truth.len(), ranges.len());
        Ok(self.finish(ScenarioId::Speeding, &session, &replayer, export, metrics, failures))
    }

    /// RPL-006: mixed filters and policies over a full replay.
    fn run_axis_stability(&self, export: &mut ReplayExport) -> Result<ScenarioResult, SimError> {
        info!("RPL-006: AxisStability");
        let profile = self.profile();
        let speed_limit = profile.speed_limit_kmh;
        let (oracle, doc) = self.record(ScenarioId::AxisStability, profile)?;
        let expected_series = doc.series.len() + 1;
        let mut session = TripSession::load(doc, None, SessionOptions::default());
        session.set_filter("accel_x", FilterConfig::kalman(2.0, 0.05));
        session.set_filter("accel_y", FilterConfig::moving_average(9));
        session.set_gps_filter(FilterConfig::kalman(1.0, 3.0));
        let policies: Vec<(String, AxisPolicy)> =
            session.cursor().series().iter().map(|s| (s.key.clone(), s.policy)).collect();
        let offset = session.effective_offset();

        let mut metrics = ScenarioMetrics::default();
        let mut first_violation: Option<String> = None;
        let mut replayer = self.replayer();
        metrics.frames = replayer.run_for(&mut session, self.max_duration_secs, |time_sec, tick| {
            let mut problems = Vec::new();
            if tick.series.len() != expected_series {
                problems.push(format!("{} of {} series", tick.series.len(), expected_series));
            }
            for s in &tick.series {
                if !s.point.v.is_finite() || !s.axis_min.is_finite() || !s.axis_max.is_finite() {
                    problems.push(format!("{} not finite", s.key));
                    continue;
                }
                if s.axis_min >= s.axis_max {
                    problems.push(format!("{} axis collapsed", s.key));
                }
                let policy = policies.iter().find(|(k, _)| *k == s.key).map(|(_, p)| *p);
                let shaped = match policy {
                    Some(AxisPolicy::SymmetricAroundZero) => s.axis_max == -s.axis_min,
                    Some(AxisPolicy::NonNegative) => s.axis_min == 0.0,
                    Some(AxisPolicy::Fixed { .. }) => s.axis_min == 0.0 && s.axis_max >= speed_limit,
                    _ => true,
                };
                if !shaped {
                    problems.push(format!("{} axis [{}, {}] breaks its policy", s.key, s.axis_min, s.axis_max));
                }
            }
            if !problems.is_empty() {
                metrics.axis_violations += problems.len() as u64;
                first_violation.get_or_insert_with(|| format!("t={:.2}s: {}", tick.video_time, problems.join(", ")));
            }
            export.add_frame(observe(&oracle, offset, time_sec, tick));
        });

        let mut failures = Vec::new();
        if !policies.iter().any(|(k, _)| k == GPS_SPEED_KEY) {
            failures.push("no GPS speed series".to_string());
        }
        if let Some(v) = first_violation {
            failures.push(format!("{} axis violations, first at {}", metrics.axis_violations, v));
        }
        Ok(self.finish(ScenarioId::AxisStability, &session, &replayer, export, metrics, failures))
    }

    /// RPL-007: a 240 Hz player against the 30 Hz gate.
    fn run_rapid_ticks(&self, export: &mut ReplayExport) -> Result<ScenarioResult, SimError> {
        info!("RPL-007: RapidTicks");
        let (oracle, doc) = self.record(ScenarioId::RapidTicks, self.profile())?;
        let mut session = TripSession::load(doc, None, SessionOptions::default());
        let offset = session.effective_offset();
        let gate_hz = SessionOptions::default().cursor.tick_hz;

        let mut metrics = ScenarioMetrics::default();
        let mut replayer = Replayer::new(SimClock::new(0.0), 240);
        let mut times = Vec::new();
        metrics.frames = replayer.run_for(&mut session, self.max_duration_secs, |time_sec, tick| {
            times.push(time_sec);
            export.add_frame(observe(&oracle, offset, time_sec, tick));
        });

        let mut failures = Vec::new();
        let upper = (self.max_duration_secs * gate_hz).ceil() as u64 + 1;
        let lower = (self.max_duration_secs * gate_hz * 2.0 / 3.0).floor() as u64;
        if metrics.frames > upper || metrics.frames < lower {
            failures.push(format!("{} frames admitted, expected {}..={}", metrics.frames, lower, upper));
        }
        let min_gap = 1.0 / gate_hz - 1e-6;
        if let Some(w) = times.windows(2).find(|w| w[1] - w[0] < min_gap) {
            failures.push(format!("frames {:.4}s apart", w[1] - w[0]));
        }
        debug!("  {} callbacks coalesced into {} frames", replayer.callbacks(), metrics.frames);
        Ok(self.finish(ScenarioId::RapidTicks, &session, &replayer, export, metrics, failures))
    }

    /// Replays a caller-supplied trip document from video time 0.
    ///
    /// The replay stops at the end of the trip or after the runner's
    /// duration, whichever comes first.
    pub fn replay_document(&self, doc: TripDocument, store: &dyn SyncOverrideStore) -> Result<ReplayExport, SimError> {
        let mut session = TripSession::load_with_store(doc, store, SessionOptions::default());
        let (_, end) = session.time_span().ok_or(SimError::EmptyTrip)?;
        let secs = end.max(0.0).min(self.max_duration_secs);
        info!("Replaying {} for {:.1}s (offset {:.2}s)", session.id(), secs, session.effective_offset());

        let mut export = ReplayExport::new("trip", self.seed, session.id().as_str());
        let mut replayer = self.replayer();
        let mut non_finite = 0u64;
        replayer.run_for(&mut session, secs, |time_sec, tick| {
            let bad = tick
                .series
                .iter()
                .filter(|s| !s.point.v.is_finite() || !s.axis_min.is_finite() || !s.axis_max.is_finite())
                .count();
            non_finite += bad as u64;
            export.add_frame(ReplayFrame {
                time_sec,
                tick,
                truth: None,
                marker_error_m: None,
            });
        });
        if non_finite > 0 {
            warn!("{} non-finite series outputs", non_finite);
        }
        export.finalize(non_finite == 0, session.effective_offset(), session.events(), None);
        Ok(export)
    }
}
