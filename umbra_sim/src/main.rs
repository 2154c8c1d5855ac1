//! Umbra scenario runner CLI
//!
//! Runs the end-to-end engine scenarios against a fresh sandbox each.

use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;
use umbra_core::EngineConfig;
use umbra_sim::{ScenarioId, ScenarioResult, ScenarioRunner};

/// Umbra shadow engine scenario runner
#[derive(Parser, Debug)]
#[command(name = "umbra-sim")]
#[command(about = "Run end-to-end shadow engine and scheduler scenarios", long_about = None)]
struct Args {
    /// Scenario to run, by name or code (e.g. delayed_tasks, SCH-003, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Simulated SDK level (overrides the config file)
    #[arg(long)]
    sdk: Option<u32>,

    /// Engine configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// List scenarios and exit
    #[arg(long)]
    list: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

fn load_config(args: &Args) -> EngineConfig {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }),
        None => EngineConfig::default(),
    };

    match args.sdk {
        Some(level) => config.with_sdk_level(level),
        None => config,
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

    if args.list {
        for scenario in ScenarioId::all() {
            println!("{:<8} {:<20} {}", scenario.code(), scenario.name(), scenario.description());
        }
        return;
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Run with --list to see available scenarios");
            std::process::exit(1);
        })]
    };

    let config = load_config(&args);
    debug!(?config, "engine configuration");

    if !args.json {
        info!("Umbra scenario runner v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let runner = ScenarioRunner::new(config);
    let mut all_results: Vec<ScenarioResult> = Vec::new();

    for scenario in &scenarios {
        let result = runner.run(*scenario);

        if !args.json {
            if result.passed {
                info!(
                    "✓ {} {} (sdk={}) PASSED [{} tasks, {}ms virtual]",
                    scenario.code(),
                    scenario.name(),
                    result.sdk_level,
                    result.tasks_run,
                    result.virtual_time_ms
                );
            } else {
                error!(
                    "✗ {} {} (sdk={}) FAILED: {}",
                    scenario.code(),
                    scenario.name(),
                    result.sdk_level,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }

        all_results.push(result);
    }

    let total = all_results.len();
    let failed_count = all_results.iter().filter(|r| !r.passed).count();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "code": r.scenario.code(),
                    "sdk": r.sdk_level,
                    "passed": r.passed,
                    "tasks_run": r.tasks_run,
                    "virtual_time_ms": r.virtual_time_ms,
                    "elapsed_ms": r.elapsed.as_millis() as u64,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenarios passed!", total);
        } else {
            error!("❌ {}/{} scenarios failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {}: {}",
                    result.scenario.name(),
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
