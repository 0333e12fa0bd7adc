//! Dashboard demo entry point: CLI wiring and config-driven service construction.

use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tracing_subscriber::EnvFilter;

use homewatt::aggregate::UsageAggregator;
use homewatt::clock::{Clock, ManualClock};
use homewatt::config::ScenarioConfig;
use homewatt::identity::StaticIdentity;
use homewatt::insight::InsightEngine;
use homewatt::registry::DeviceRegistry;
use homewatt::sched::TickScheduler;
use homewatt::store::InMemoryStore;
use homewatt::telemetry::{TelemetryRow, export_csv};

/// Ticks executed when `--ticks` is not given.
const DEFAULT_TICKS: usize = 24;

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    seed_override: Option<u64>,
    ticks: Option<usize>,
    telemetry_out: Option<String>,
}

fn print_help() {
    eprintln!("homewatt — home energy monitoring core demo");
    eprintln!();
    eprintln!("Usage: homewatt [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!("  --preset <name>          Use a built-in preset (demo_home)");
    eprintln!("  --seed <u64>             Override random seed");
    eprintln!("  --ticks <n>              Number of aggregation ticks to run (default: 24)");
    eprintln!("  --telemetry-out <path>   Export per-tick results to CSV");
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the demo_home preset is used.");
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        seed_override: None,
        ticks: None,
        telemetry_out: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --scenario requires a path argument");
                    process::exit(1);
                }
                cli.scenario_path = Some(args[i].clone());
            }
            "--preset" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --preset requires a name argument");
                    process::exit(1);
                }
                cli.preset = Some(args[i].clone());
            }
            "--seed" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --seed requires a u64 argument");
                    process::exit(1);
                }
                if let Ok(s) = args[i].parse::<u64>() {
                    cli.seed_override = Some(s);
                } else {
                    eprintln!("error: --seed value \"{}\" is not a valid u64", args[i]);
                    process::exit(1);
                }
            }
            "--ticks" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --ticks requires a count argument");
                    process::exit(1);
                }
                if let Ok(n) = args[i].parse::<usize>() {
                    cli.ticks = Some(n);
                } else {
                    eprintln!("error: --ticks value \"{}\" is not a valid count", args[i]);
                    process::exit(1);
                }
            }
            "--telemetry-out" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --telemetry-out requires a path argument");
                    process::exit(1);
                }
                cli.telemetry_out = Some(args[i].clone());
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = parse_args();

    // Load config: --scenario takes priority, then --preset, then demo_home
    let mut scenario = if let Some(ref path) = cli.scenario_path {
        match ScenarioConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else if let Some(ref name) = cli.preset {
        match ScenarioConfig::from_preset(name) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        ScenarioConfig::demo_home()
    };

    // Apply seed override
    if let Some(seed) = cli.seed_override {
        scenario.aggregator.seed = seed;
    }

    // Validate
    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    // The demo drives a manual clock one tick interval per iteration so a
    // full day of samples renders instantly and deterministically.
    let clock = Arc::new(ManualClock::starting_at(Utc::now()));
    let identity = if scenario.identity.user.is_empty() {
        StaticIdentity::anonymous()
    } else {
        StaticIdentity::signed_in(scenario.identity.user.clone())
    };

    let mut registry = DeviceRegistry::new(InMemoryStore::new(), Arc::new(identity), clock.clone());
    for entry in &scenario.devices {
        if let Err(e) = registry.register(entry.build(clock.now())) {
            eprintln!("error: cannot seed device \"{}\": {e}", entry.name);
            process::exit(1);
        }
    }

    let mut aggregator = UsageAggregator::new(
        scenario.aggregator.settings(),
        scenario.aggregator.build_load_model(),
        clock.clone(),
    );
    let mut insights = InsightEngine::default();

    let tick_seconds = scenario.aggregator.tick_seconds;
    let scheduler = TickScheduler::new(StdDuration::from_secs(u64::from(tick_seconds)));
    let ticks = cli.ticks.unwrap_or(DEFAULT_TICKS);

    let mut rows = Vec::with_capacity(ticks);
    let mut last_snapshot = None;
    scheduler.run_ticks(ticks, |t| {
        let devices = registry.devices();
        let active = devices.iter().filter(|d| d.is_on).count();
        let snapshot = aggregator.tick(&devices);
        println!("{snapshot}");
        rows.push(TelemetryRow::from_snapshot(t, &snapshot, active));
        last_snapshot = Some(snapshot);
        clock.advance(Duration::seconds(i64::from(tick_seconds)));
    });

    // Evaluate insights against the final snapshot
    if let Some(snapshot) = last_snapshot {
        let devices = registry.devices();
        insights.evaluate(&devices, &snapshot);
        println!("\n--- Insights ---");
        if insights.insights().is_empty() {
            println!("(none)");
        } else {
            for insight in insights.insights() {
                println!(
                    "[{}] {} (save {})",
                    insight.priority, insight.message, insight.estimated_savings
                );
            }
        }
    }

    println!(
        "\n{} devices, {} favorites, {} ticks, {} samples retained",
        registry.len(),
        registry.favorites().len(),
        scheduler.ticks_fired(),
        aggregator.samples().len(),
    );

    // Export CSV if requested
    if let Some(ref path) = cli.telemetry_out {
        if let Err(e) = export_csv(&rows, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Telemetry written to {path}");
    }
}
