//! `miesc`: the AOC command-line front-end (spec §6.4). Bootstraps the
//! registry/bus/coordinator the way `aoc-server`'s `serve` does, then
//! drives one audit, a tool-health probe, or the long-running server.
//!
//! Grounded in the agency's `clap::Parser` bin conventions
//! (`src/bin/api-server.rs`, `worker/src/main.rs`), adapted to a
//! multi-subcommand CLI since those bins are each single-purpose.

mod bootstrap;
mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "miesc", about = "Analysis Orchestration Core command-line front-end")]
struct Cli {
    /// Path to an AOC config file (spec §6.5 layered configuration).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory containing taxonomy_map.json, severity_map.json,
    /// fp_priors.json, compliance_map.json (spec §6.7).
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a full audit at the named profile against a contract target.
    Audit {
        profile: String,
        target: String,
        /// Directory to persist `<audit_id>/` state into (spec §6.6).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Shorthand for `audit quick <target>`.
    Scan { target: String },
    /// Probes every registered tool's availability and reports the result.
    Doctor,
    /// Runs the long-lived server surface.
    Server {
        #[command(subcommand)]
        mode: ServerMode,
    },
}

#[derive(Subcommand)]
enum ServerMode {
    /// REST + event-stream surface (spec §6.2, §6.3).
    Rest,
    /// JSON-RPC surface (spec §6.1), served on the same router as `rest`.
    Rpc,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match aoc_core::AocConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(2);
        }
    };

    let logger = aoc_observability::StructuredLogger::new(aoc_observability::LoggingConfig {
        level: config.log.level.clone(),
        format: match config.log.format.as_str() {
            "pretty" => aoc_observability::LogFormat::Pretty,
            "compact" => aoc_observability::LogFormat::Compact,
            _ => aoc_observability::LogFormat::Json,
        },
    });
    let _ = logger.init();

    let tables = match bootstrap::load_tables(&cli.data_dir, &config.correlation) {
        Ok(tables) => tables,
        Err(err) => {
            eprintln!("failed to load static tables from {:?}: {err}", cli.data_dir);
            return ExitCode::from(2);
        }
    };

    let coordinator = bootstrap::build_coordinator(config.clone(), tables);

    let outcome = match cli.command {
        Command::Audit { profile, target, output } => {
            commands::audit::run(&coordinator, &profile, &target, output).await
        }
        Command::Scan { target } => {
            commands::audit::run(&coordinator, "quick", &target, None).await
        }
        Command::Doctor => commands::doctor::run(&coordinator).await,
        Command::Server { mode: _ } => {
            // Both subcommands serve the same router: the JSON-RPC and
            // REST surfaces are mounted side by side (spec §6.1-§6.2
            // "REST mirrors the JSON-RPC methods one-to-one"), so `rest`
            // and `rpc` select the same listener.
            let coordinator = std::sync::Arc::new(coordinator);
            aoc_server::serve(
                coordinator,
                &config.server.host,
                config.server.port,
                config.server.max_contract_bytes,
                config.server.max_concurrent_audits,
            )
            .await
            .map(|_| 0u8)
        }
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("internal error: {err}");
            ExitCode::from(3)
        }
    }
}
