//! Status command - shows checkpoint progress for a run.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use console::{Style, style};
use serde::Serialize;

use mathcast_pipeline::{CheckpointStore, PipelineRun, StageId};

use super::Context;

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Run id printed by `mathcast generate`
    pub run_id: String,

    /// Root directory for run working directories
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Status for JSON output.
#[derive(Debug, Serialize)]
struct StatusOutput {
    run_id: String,
    variant: String,
    last_completed_stage: i32,
    completed: Vec<&'static str>,
    remaining: Vec<&'static str>,
    artifact: Option<String>,
}

fn split_stages(stages: &[StageId], last_completed: i32) -> (Vec<StageId>, Vec<StageId>) {
    stages
        .iter()
        .copied()
        .partition(|stage| (stage.index() as i32) <= last_completed)
}

/// Run the status command.
pub async fn run(args: StatusArgs, ctx: &Context) -> Result<()> {
    let output_root = ctx.output_root(args.output.as_deref());
    let run = PipelineRun::open(&output_root, &args.run_id)
        .with_context(|| format!("no run {} under {}", args.run_id, output_root.display()))?;

    let store = CheckpointStore::new(&run.work_dir, run.variant);
    let last = store.last_completed_stage();
    let (completed, remaining) = split_stages(run.variant.stages(), last);

    // A finished run clears its checkpoint; the artifact is the evidence.
    let artifact = run.layout().final_artifact(run.variant);
    let finished = artifact.is_file() && completed.is_empty();

    if ctx.json_output {
        let output = StatusOutput {
            run_id: run.id.clone(),
            variant: run.variant.to_string(),
            last_completed_stage: last,
            completed: completed.iter().map(StageId::name).collect(),
            remaining: if finished {
                Vec::new()
            } else {
                remaining.iter().map(StageId::name).collect()
            },
            artifact: artifact
                .is_file()
                .then(|| artifact.display().to_string()),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let green = Style::new().green();
    let dim = Style::new().dim();

    println!();
    println!("{}", style(format!("Run {}", run.id)).bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();
    println!("  {} {}", dim.apply_to("Variant:"), run.variant);
    println!("  {} {}", dim.apply_to("Created:"), run.created_at.to_rfc3339());
    println!("  {} {}", dim.apply_to("Directory:"), run.work_dir.display());
    println!();

    if finished {
        println!("  {} finished", green.apply_to("●"));
        println!("  {} {}", dim.apply_to("Artifact:"), artifact.display());
    } else {
        for stage in &completed {
            println!("  {} {}", green.apply_to("✓"), stage.name());
        }
        for stage in &remaining {
            println!("  {} {}", dim.apply_to("·"), dim.apply_to(stage.name()));
        }
        if !remaining.is_empty() {
            println!();
            println!(
                "  {}",
                dim.apply_to(format!("Continue with: mathcast resume {}", run.id))
            );
        }
    }
    println!();

    Ok(())
}
