//! Opponent economy model - development tools
//!
//! # Usage
//!
//! ```bash
//! # Play a scenario and print the model's answers
//! cargo run -p eco_tools -- run crates/eco_tools/scenarios/dt_timing.ron
//!
//! # Same, as JSON, recording everything fed to the model
//! cargo run -p eco_tools -- run dt_timing.ron --json --record session.bin
//!
//! # Replay a recorded session
//! cargo run -p eco_tools -- replay session.bin
//! ```
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `info`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eco_tools::replay::replay_file;
use eco_tools::scenario::{Scenario, ScenarioReport};

#[derive(Parser)]
#[command(name = "eco-tools")]
#[command(about = "Development tools for the opponent economy model")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a RON scenario through the model
    Run {
        /// Path to the scenario file
        scenario: PathBuf,

        /// Print a JSON report to stdout
        #[arg(long)]
        json: bool,

        /// Save the observation log to this file
        #[arg(long)]
        record: Option<PathBuf>,
    },
    /// Replay a recorded observation log
    Replay {
        /// Path to the log file
        log: PathBuf,

        /// Print a JSON summary to stdout
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scenario,
            json,
            record,
        } => cmd_run(&scenario, json, record),
        Commands::Replay { log, json } => cmd_replay(&log, json),
    }
}

fn cmd_run(path: &std::path::Path, json: bool, record: Option<PathBuf>) {
    let scenario = match Scenario::load(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to load scenario: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(name = %scenario.name, until = scenario.until, "Running scenario");

    let report = match record {
        Some(log_path) => match scenario.run_recorded(&log_path) {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Scenario run failed: {e}");
                std::process::exit(1);
            }
        },
        None => scenario.run(),
    };

    if json {
        print_json(&report);
    } else {
        print_report(&report);
    }
}

fn cmd_replay(path: &std::path::Path, json: bool) {
    let summary = match replay_file(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Replay failed: {e}");
            std::process::exit(1);
        }
    };

    if json {
        print_json(&summary);
    } else {
        tracing::info!(
            version = summary.version,
            observations = summary.observations,
            last_frame = ?summary.last_frame,
            enabled = summary.enabled,
            "Replayed observation log"
        );
        tracing::info!("State hash: {:016x}", summary.state_hash);
        for unit in &summary.implied_units {
            tracing::info!("  implied {:?} at frame {}", unit.unit_type, unit.frame);
        }
    }
}

fn print_report(report: &ScenarioReport) {
    tracing::info!(
        name = %report.name,
        final_frame = report.final_frame,
        enabled = report.enabled,
        "Scenario finished"
    );
    tracing::info!("State hash: {:016x}", report.state_hash);
    for unit in &report.implied_units {
        tracing::info!("  implied {:?} at frame {}", unit.unit_type, unit.frame);
    }
    if !report.supply_buildings.is_empty() {
        tracing::info!("  supply buildings at {:?}", report.supply_buildings);
    }
    for answered in &report.answers {
        tracing::info!(
            "  [{}] {:?} -> {}",
            answered.frame,
            answered.query,
            answered.answer
        );
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!("Failed to serialize report: {e}");
            std::process::exit(1);
        }
    }
}
