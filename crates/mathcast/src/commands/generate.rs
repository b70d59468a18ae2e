//! Generate command - turns a problem into a narrated animation.

use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use clap::{Args, ValueEnum};
use console::Style;
use serde::Serialize;

use mathcast_config::VariantSetting;
use mathcast_pipeline::{ImagePayload, PipelineError, PipelineRun, PipelineVariant};

use super::Context;
use super::progress::StageSpinner;
use super::wiring::build_orchestrator;

/// Final artifact to produce.
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum VariantArg {
    /// Self-contained HTML page with inline audio
    Html,
    /// Rendered scene video with a narration track
    Video,
}

impl From<VariantArg> for PipelineVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Html => PipelineVariant::Html,
            VariantArg::Video => PipelineVariant::Video,
        }
    }
}

pub(crate) fn configured_variant(setting: VariantSetting) -> PipelineVariant {
    match setting {
        VariantSetting::Html => PipelineVariant::Html,
        VariantSetting::Video => PipelineVariant::Video,
    }
}

/// Arguments for the generate command.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Problem text (read from stdin when omitted)
    pub problem: Option<String>,

    /// Photo of the problem
    #[arg(short, long)]
    pub image: Option<PathBuf>,

    /// Output variant (default: [pipeline].variant)
    #[arg(long, value_enum)]
    pub variant: Option<VariantArg>,

    /// Run id to create or continue (default: a new UUID)
    #[arg(long)]
    pub run_id: Option<String>,

    /// Discard any checkpoint and start from the first stage
    #[arg(long)]
    pub force_restart: bool,

    /// Root directory for run working directories
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Result of a finished run for JSON output.
#[derive(Debug, Serialize)]
struct RunOutput<'a> {
    run_id: &'a str,
    variant: PipelineVariant,
    work_dir: String,
    artifact: String,
}

fn read_problem(arg: Option<String>) -> Result<String> {
    let text = match arg {
        Some(text) => text,
        None => {
            let mut stdin = std::io::stdin();
            if stdin.is_terminal() {
                bail!("no problem given; pass it as an argument or pipe it on stdin");
            }
            let mut text = String::new();
            stdin.read_to_string(&mut text)?;
            text
        }
    };
    if text.trim().is_empty() {
        bail!("problem text is empty");
    }
    Ok(text)
}

fn read_image(path: &Path) -> Result<ImagePayload> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read image {}", path.display()))?;
    Ok(ImagePayload::new(bytes, ImagePayload::mime_for_path(path)))
}

/// Run the generate command.
pub async fn run(args: GenerateArgs, ctx: &Context) -> Result<()> {
    let problem = read_problem(args.problem)?;
    let image = args.image.as_deref().map(read_image).transpose()?;
    let variant = args
        .variant
        .map(PipelineVariant::from)
        .unwrap_or_else(|| configured_variant(ctx.config().pipeline().variant));
    let output_root = ctx.output_root(args.output.as_deref());

    let run = PipelineRun::create(&output_root, args.run_id, problem, image, variant)?;
    execute(&run, ctx, args.force_restart).await
}

/// Drive `run` through the orchestrator and report the outcome.
pub(crate) async fn execute(run: &PipelineRun, ctx: &Context, force_restart: bool) -> Result<()> {
    let orchestrator = build_orchestrator(ctx.config(), run.variant)?;
    let dim = Style::new().dim();

    if !ctx.json_output {
        println!(
            "{}",
            dim.apply_to(format!(
                "Run {} ({}) in {}",
                run.id,
                run.variant,
                run.work_dir.display()
            ))
        );
    }

    let spinner = StageSpinner::new(run.variant.stages().len(), ctx.json_output);
    let result = orchestrator
        .run(run, Some(&spinner), force_restart)
        .await;
    spinner.finish();

    match result {
        Ok(artifact) => {
            if ctx.json_output {
                let output = RunOutput {
                    run_id: &run.id,
                    variant: run.variant,
                    work_dir: run.work_dir.display().to_string(),
                    artifact: artifact.display().to_string(),
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                let green = Style::new().green();
                println!("{} {}", green.apply_to("✓"), artifact.display());
            }
            Ok(())
        }
        Err(e) => {
            if !ctx.json_output {
                let dim = Style::new().dim();
                if let PipelineError::EnvironmentUnavailable(_) = e {
                    eprintln!(
                        "{}",
                        dim.apply_to("Install the missing tool or set its command in the config.")
                    );
                }
                eprintln!(
                    "{}",
                    dim.apply_to(format!("Continue later with: mathcast resume {}", run.id))
                );
            }
            Err(e).with_context(|| format!("run {} failed", run.id))
        }
    }
}
