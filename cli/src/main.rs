//! `viztrtr`: CLI driver for the closed-loop control core.
//!
//! The core crate never talks to a browser, a vision model, or a metrics
//! backend directly; those are supplied by the embedder through the
//! trait objects in `viztrtr_core::adapters`. This binary has none of
//! those available, so it wires the in-memory reference adapters from
//! `viztrtr_core::adapters::mock` and drives the control loop against
//! them. That makes `viztrtr run` a way to exercise the loop end to end
//! and inspect `report.json`/`REPORT.md`, not a production deployment:
//! a real one constructs `IterationController` with adapters that talk to
//! an actual browser, model provider, and metrics backend instead.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use viztrtr_core::adapters::mock::{
    AutoApproveAll, FixedBuild, FixedCapture, FixedMetrics, NoopImplementation, ScriptedVision,
};
use viztrtr_core::orchestrator::Specialist;
use viztrtr_core::{Config, IterationController, Orchestrator, TerminalState};

#[derive(Parser)]
#[command(name = "viztrtr", about = "Autonomous UI-improvement control loop", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a config file, then exit without running anything.
    CheckConfig {
        #[arg(long)]
        config: PathBuf,
    },
    /// Run the iteration loop against a config file until a terminal state is reached.
    Run {
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().expect("valid directive")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::CheckConfig { config } => match load_config(&config).await {
            Ok(_) => ExitCode::from(0),
            Err(code) => code,
        },
        Commands::Run { config } => match load_config(&config).await {
            Ok(config) => run(config).await,
            Err(code) => code,
        },
    }
}

async fn load_config(path: &PathBuf) -> Result<Config, ExitCode> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "failed to read config file");
        ExitCode::from(3)
    })?;
    Config::from_toml_str(&raw).map_err(|e| {
        tracing::error!(error = %e, "invalid configuration");
        ExitCode::from(3)
    })
}

async fn run(config: Config) -> ExitCode {
    let target_score = config.target_score;

    let orchestrator = Orchestrator::new(vec![Specialist::new(
        "generic",
        "catch-all specialist used when no domain-specific implementor is wired",
        |_recommendation| 1,
        NoopImplementation,
    )])
    .with_discovery_timeout(config.timeouts.discovery());

    let controller = IterationController::new(
        config,
        Box::new(FixedCapture::new("viztrtr-output/screenshot.png")),
        Box::new(ScriptedVision::new(std::iter::empty())),
        Box::new(FixedMetrics::new(Default::default())),
        Box::new(FixedBuild::success()),
        Box::new(AutoApproveAll),
        orchestrator,
    );

    match controller.run().await {
        Ok(TerminalState::TargetReached { iteration, composite_score }) => {
            tracing::info!(iteration, composite_score, "target reached");
            ExitCode::from(0)
        }
        Ok(TerminalState::IterationsExhausted { iterations_run }) => {
            tracing::warn!(iterations_run, target_score, "iterations exhausted without reaching target");
            ExitCode::from(1)
        }
        Ok(TerminalState::Plateaued { iteration }) => {
            tracing::warn!(iteration, "scoring plateaued");
            ExitCode::from(2)
        }
        Ok(TerminalState::Cancelled { iteration }) => {
            tracing::warn!(iteration, "run cancelled before reaching a terminal condition");
            ExitCode::from(4)
        }
        Ok(TerminalState::UnrecoverableError { iteration, message }) => {
            tracing::error!(iteration, message, "unrecoverable error");
            ExitCode::from(4)
        }
        Err(e) => {
            tracing::error!(error = %e, "controller returned an error");
            ExitCode::from(4)
        }
    }
}
