//! Mathcast - narrated step-by-step animations for math problems
//!
//! Main entry point for the mathcast CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, generate, purge, resume, status};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Mathcast - narrated step-by-step animations for math problems
#[derive(Parser)]
#[command(name = "mathcast")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// User config directory (default: platform config dir)
    #[arg(long, global = true, env = "MATHCAST_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Turn a math problem into a narrated animation
    Generate(generate::GenerateArgs),

    /// Continue a run from its last checkpoint
    Resume(resume::ResumeArgs),

    /// Show checkpoint progress for a run
    Status(status::StatusArgs),

    /// Delete a run's working directory
    Purge(purge::PurgeArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = mathcast_config::load_config_with_options(None, cli.config_dir.as_deref())
        .context("failed to load configuration")?;
    let config_dir = cli
        .config_dir
        .clone()
        .or_else(mathcast_config::xdg_config_dir);

    // Console (human-readable, stderr) + optional rolling JSON file
    let filter = if cli.verbose {
        "mathcast=debug,mathcast_pipeline=debug,mathcast_generate=debug,mathcast_media=debug,mathcast_llm=debug,mathcast_config=debug,info"
    } else {
        "mathcast=info,mathcast_pipeline=info,mathcast_generate=info,mathcast_media=info,warn"
    };

    let logging = loaded.config.logging();
    let (file_layer, _guard) = if logging.json {
        let log_dir = logging
            .dir
            .clone()
            .or_else(|| config_dir.as_ref().map(|d| d.join("logs")))
            .unwrap_or_else(|| PathBuf::from("logs"));
        let file_appender = tracing_appender::rolling::daily(&log_dir, "mathcast.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        (Some(non_blocking), Some(guard))
    } else {
        (None, None)
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(file_layer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "mathcast=trace,mathcast_pipeline=trace,mathcast_generate=trace,mathcast_media=trace,mathcast_llm=trace,mathcast_config=trace,info",
                ))
        }))
        .init();

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        config_dir,
        loaded,
    };

    match cli.command {
        Commands::Generate(args) => generate::run(args, &ctx).await,
        Commands::Resume(args) => resume::run(args, &ctx).await,
        Commands::Status(args) => status::run(args, &ctx).await,
        Commands::Purge(args) => purge::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
