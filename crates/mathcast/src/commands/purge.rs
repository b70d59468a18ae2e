//! Purge command - deletes a run's working directory.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;

use mathcast_pipeline::PipelineRun;

use super::Context;

/// Arguments for the purge command.
#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Run id to delete
    pub run_id: String,

    /// Root directory for run working directories
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct PurgeOutput<'a> {
    run_id: &'a str,
    removed: bool,
}

/// Run the purge command.
pub async fn run(args: PurgeArgs, ctx: &Context) -> Result<()> {
    let output_root = ctx.output_root(args.output.as_deref());
    let removed = PipelineRun::purge(&output_root, &args.run_id)?;

    if ctx.json_output {
        let output = PurgeOutput {
            run_id: &args.run_id,
            removed,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if removed {
        println!("{} Removed run {}", Style::new().green().apply_to("✓"), args.run_id);
    } else {
        println!(
            "{}",
            Style::new()
                .dim()
                .apply_to(format!("No run {} under {}", args.run_id, output_root.display()))
        );
    }
    Ok(())
}
