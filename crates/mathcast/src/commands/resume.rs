//! Resume command - continues a run from its checkpoint.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;

use mathcast_pipeline::PipelineRun;

use super::Context;
use super::generate::execute;

/// Arguments for the resume command.
#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Run id printed by `mathcast generate`
    pub run_id: String,

    /// Discard the checkpoint and rerun every stage with the recorded inputs
    #[arg(long)]
    pub force_restart: bool,

    /// Root directory for run working directories
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Run the resume command.
pub async fn run(args: ResumeArgs, ctx: &Context) -> Result<()> {
    let output_root = ctx.output_root(args.output.as_deref());
    let run = PipelineRun::open(&output_root, &args.run_id)
        .with_context(|| format!("cannot reopen run {}", args.run_id))?;
    execute(&run, ctx, args.force_restart).await
}
