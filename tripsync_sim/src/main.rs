//! TripSync replay CLI
//!
//! Runs deterministic replay scenarios, or replays a trip document either on
//! a virtual clock or paced by the wall clock.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;
use tripsync_core::sync::{with_defaults, DefaultOverrides};
use tripsync_core::{MemoryOverrideStore, SessionOptions, SledOverrideStore, SyncOverrideStore, TripDocument, TripSession};
use tripsync_env::{PlaybackClock, WallClock};
use tripsync_sim::{ScenarioId, ScenarioResult, ScenarioRunner, SimError};

/// TripSync deterministic replay CLI
#[derive(Parser, Debug)]
#[command(name = "tripsync-sim")]
#[command(about = "Replay trips through the TripSync cursor engine", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (clean_drive, noisy_gps, dropouts, sync_override, speeding, axis_stability, rapid_ticks, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Maximum replay duration in seconds
    #[arg(short, long, default_value = "60")]
    duration: f64,

    /// Frame callback rate of the simulated player (Hz)
    #[arg(long, default_value = "60")]
    tick_rate: u32,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export replay frames to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Replay a trip document instead of a scenario
    #[arg(long)]
    trip: Option<PathBuf>,

    /// Store a sync override (seconds) for the trip before replaying
    #[arg(long, allow_hyphen_values = true)]
    offset: Option<f64>,

    /// Remove the stored sync override for the trip
    #[arg(long, conflicts_with = "offset")]
    clear_offset: bool,

    /// Persistent override store (sled directory); in-memory when absent
    #[arg(long)]
    store: Option<PathBuf>,

    /// Pace the trip replay with the wall clock
    #[arg(long, requires = "trip")]
    realtime: bool,

    /// Playback rate for --realtime
    #[arg(long, default_value = "1.0")]
    rate: f64,
}

fn open_store(path: Option<&PathBuf>) -> Result<Box<dyn SyncOverrideStore>, SimError> {
    Ok(match path {
        Some(path) => Box::new(with_defaults(SledOverrideStore::open(path)?, DefaultOverrides::builtin())),
        None => Box::new(with_defaults(MemoryOverrideStore::new(), DefaultOverrides::builtin())),
    })
}

/// Replays a trip document; returns whether every frame was well formed.
fn run_trip(args: &Args, path: &Path, seed: u64) -> Result<bool, SimError> {
    let doc = TripDocument::from_path(path)?;
    let store = open_store(args.store.as_ref())?;
    if let Some(offset) = args.offset {
        store.set(&doc.id, Some(offset))?;
        info!("Stored override {:.2}s for {}", offset, doc.id);
    } else if args.clear_offset {
        store.set(&doc.id, None)?;
        info!("Cleared override for {}", doc.id);
    }

    if args.realtime {
        return run_realtime(doc, store.as_ref(), args.duration, args.rate);
    }

    let runner = ScenarioRunner::new(seed)
        .with_duration(args.duration)
        .with_tick_rate(args.tick_rate);
    let export = runner.replay_document(doc, store.as_ref())?;
    info!(
        "Replayed {}: {} frames, {} event ranges, offset {:.2}s",
        export.trip,
        export.frames.len(),
        export.events.len(),
        export.offset_seconds
    );
    for range in &export.events {
        info!("  {} at {:.1}s for {:.1}s", range.label, range.t, range.duration_seconds);
    }
    if let Some(export_path) = &args.export {
        export.write_to_file(export_path)?;
        info!("Exported {} frames to {}", export.frames.len(), export_path);
    }
    Ok(export.passed)
}

/// Plays the trip against a wall clock, ticking at 60 Hz behind the 30 Hz gate.
fn run_realtime(doc: TripDocument, store: &dyn SyncOverrideStore, max_secs: f64, rate: f64) -> Result<bool, SimError> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let clock = WallClock::new();
        clock.set_rate(rate)?;
        let mut session = TripSession::load_with_store(doc, store, SessionOptions::default());
        let (_, end) = session.time_span().ok_or(SimError::EmptyTrip)?;
        let end = end.min(max_secs);
        info!("Playing {} in real time until {:.1}s (rate {})", session.id(), end, rate);

        let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / 60.0));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        clock.play();

        let mut callbacks = 0u64;
        let mut frames = 0u64;
        loop {
            interval.tick().await;
            let video_time = clock.video_time();
            if video_time > end {
                break;
            }
            callbacks += 1;
            if let Some(frame) = session.tick(clock.now(), video_time) {
                frames += 1;
                for s in &frame.series {
                    debug!(
                        "  t={:.2}s {} = {:.3} [{:.3}, {:.3}]",
                        frame.video_time, s.key, s.point.v, s.axis_min, s.axis_max
                    );
                }
                if let Some(gps) = frame.gps {
                    debug!("  t={:.2}s marker ({:.6}, {:.6})", frame.video_time, gps.lat, gps.lon);
                }
            }
        }
        info!("✓ {} callbacks, {} frames", callbacks, frames);
        Ok::<bool, SimError>(true)
    })
}

fn log_result(result: &ScenarioResult) {
    if result.passed {
        info!("✓ {} (seed={}) PASSED", result.scenario.name(), result.seed);
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario.name(),
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("TripSync Replay Harness v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    if let Some(path) = &args.trip {
        match run_trip(&args, path, base_seed) {
            Ok(true) => return,
            Ok(false) => {
                error!("✗ Replay of {} produced non-finite output", path.display());
                std::process::exit(1);
            }
            Err(e) => {
                error!("✗ Replay of {} failed: {}", path.display(), e);
                std::process::exit(1);
            }
        }
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
            eprintln!("Available scenarios: {}, all", names.join(", "));
            std::process::exit(1);
        })]
    };

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }
        info!("Running with export to: {}", export_path);

        let runner = ScenarioRunner::new(base_seed)
            .with_duration(args.duration)
            .with_tick_rate(args.tick_rate);
        let (result, export) = runner.run_with_export(scenarios[0]);
        match export.write_to_file(export_path) {
            Ok(()) => info!("Exported {} frames to {}", export.frames.len(), export_path),
            Err(e) => error!("Failed to write export: {:?}", e),
        }
        log_result(&result);
        if !result.passed {
            std::process::exit(1);
        }
        return;
    }

    // Run replays
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed)
            .with_duration(args.duration)
            .with_tick_rate(args.tick_rate);

        for scenario in &scenarios {
            let result = runner.run(*scenario);
            if !args.json {
                log_result(&result);
            }
            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "frames": r.metrics.frames,
                    "time_secs": r.final_time_secs,
                    "raw_rms_m": r.metrics.raw_rms_m,
                    "filtered_rms_m": r.metrics.filtered_rms_m,
                    "event_ranges": r.metrics.event_ranges,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
