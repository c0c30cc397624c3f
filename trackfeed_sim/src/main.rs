//! trackfeed Simulator CLI
//!
//! Run tracking feeds on a virtual clock, or in real time against the
//! tokio clock.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use trackfeed_core::{EmitterConfig, LogSink, Retention, TrackEmitter};
use trackfeed_env::TokioContext;
use trackfeed_sim::scenarios::ScenarioId;
use trackfeed_sim::{duration_from_secs, ScenarioResult, ScenarioRunner, SimError, SimExport};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// trackfeed simulation CLI
#[derive(Parser, Debug)]
#[command(name = "trackfeed-sim")]
#[command(about = "Run simulated live-tracking feeds", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (mock_feed, vehicle, combined, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Feed description file (one JSON object or an array); overrides --scenario
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulation duration in seconds
    #[arg(short, long, default_value = "10")]
    duration: f64,

    /// Keep only the most recent N segments on the map (trajectories are unaffected)
    #[arg(long)]
    keep_segments: Option<usize>,

    /// Run on the wall clock and log every segment instead of simulating
    #[arg(long)]
    realtime: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export trajectories to a file (.geojson for GeoJSON, otherwise JSON)
    #[arg(long)]
    export: Option<String>,
}

/// What to run: presets or feeds loaded from a file.
enum Plan {
    Presets(Vec<ScenarioId>),
    Custom(String, Vec<EmitterConfig>),
}

impl Plan {
    fn feed_sets(&self) -> Vec<(String, Vec<EmitterConfig>)> {
        match self {
            Plan::Presets(ids) => ids.iter().map(|id| (id.name().to_string(), id.feeds())).collect(),
            Plan::Custom(name, feeds) => vec![(name.clone(), feeds.clone())],
        }
    }
}

fn load_plan(args: &Args) -> Result<Plan, SimError> {
    if let Some(path) = &args.config {
        let text = std::fs::read_to_string(path)?;
        let feeds = EmitterConfig::list_from_json(&text)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("custom")
            .to_string();
        return Ok(Plan::Custom(name, feeds));
    }

    if args.scenario == "all" {
        Ok(Plan::Presets(ScenarioId::all()))
    } else {
        let id: ScenarioId = args.scenario.parse().map_err(SimError::UnknownScenario)?;
        Ok(Plan::Presets(vec![id]))
    }
}

/// Runs every feed set on the tokio clock, logging each render.
fn run_realtime(sets: Vec<(String, Vec<EmitterConfig>)>, duration: Duration) -> Result<(), SimError> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(async {
        let context = TokioContext::shared();
        let mut emitters = Vec::new();

        for (set, feeds) in sets {
            for config in feeds {
                let emitter = Arc::new(TrackEmitter::new(context.clone(), config)?);
                let label = format!("{}/{}", set, emitter.name());
                emitter.attach_sink(Arc::new(LogSink::new(label)));
                emitter.spawn();
                emitters.push(emitter);
            }
        }

        tokio::time::sleep(duration).await;

        for emitter in &emitters {
            emitter.stop();
            info!(
                "{}: {} ticks, {} points",
                emitter.name(),
                emitter.tick_count(),
                emitter.snapshot().len()
            );
        }
        Ok::<(), SimError>(())
    })
}

/// Runs one feed set and writes its trajectories to `path`.
fn run_with_export(runner: &ScenarioRunner, name: &str, feeds: Vec<EmitterConfig>, path: &str) -> ScenarioResult {
    let (result, session) = runner.run_feeds(name, feeds);

    let mut export = SimExport::from_session(name, &session);
    export.finalize(result.passed);

    match export.write_to_file(Path::new(path)) {
        Ok(()) => info!("Exported {} feeds to {}", export.feeds.len(), path),
        Err(e) => error!("Failed to write export: {}", e),
    }
    result
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
        info!("trackfeed simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let plan = load_plan(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        if matches!(e, SimError::UnknownScenario(_)) {
            eprintln!("Available scenarios: mock_feed, vehicle, combined, all");
        }
        std::process::exit(1);
    });
    let sets = plan.feed_sets();

    let duration = duration_from_secs(args.duration).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    if args.realtime {
        if let Err(e) = run_realtime(sets, duration) {
            error!("Realtime run failed: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // Determine seed
    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    let retention = args
        .keep_segments
        .map_or(Retention::Unbounded, Retention::LastSegments);
    let runner = ScenarioRunner::new(seed)
        .with_duration(duration)
        .with_retention(retention);

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if sets.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }
        let Some((name, feeds)) = sets.into_iter().next() else {
            std::process::exit(1);
        };

        let result = run_with_export(&runner, &name, feeds, export_path);
        if result.passed {
            info!("✓ {} (seed={}) PASSED - exported to {}", name, seed, export_path);
        } else {
            error!(
                "✗ {} FAILED: {}",
                name,
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
            std::process::exit(1);
        }
        return;
    }

    let mut results: Vec<ScenarioResult> = Vec::new();
    for (name, feeds) in sets {
        let (result, _) = runner.run_feeds(&name, feeds);

        if !args.json {
            if result.passed {
                info!(
                    "✓ {} (seed={}) PASSED - {} ticks, {:.0} m travelled",
                    name, seed, result.total_ticks, result.metrics.path_length_m
                );
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    name,
                    seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
        results.push(result);
    }

    let total = results.len();
    let failed_count = results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed_count,
            "failed": failed_count,
            "results": results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario,
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "time_secs": r.final_time_secs,
                    "segments_rendered": r.metrics.segments_rendered,
                    "path_length_m": r.metrics.path_length_m,
                    "feeds": r.feeds.iter().map(|f| serde_json::json!({
                        "name": f.name,
                        "ticks": f.ticks,
                        "points": f.points,
                    })).collect::<Vec<_>>(),
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
