//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use mathcast_config::{Backend, LlmConfig, MathcastConfig};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the merged configuration and load warnings (default)
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./mathcast.toml) instead of user config
        #[arg(long)]
        local: bool,
    },

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Init { local } => cmd_init(ctx, local),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

#[derive(Debug, Serialize)]
struct ShowOutput {
    sources: Vec<String>,
    warnings: Vec<String>,
    config: serde_json::Value,
}

/// The config with every plaintext key removed.
fn redacted(config: &MathcastConfig) -> MathcastConfig {
    let mut config = config.clone();
    if let Some(ref mut llm) = config.llm {
        llm.api_key = None;
    }
    for profile in config.llm_profiles.values_mut() {
        profile.api_key = None;
    }
    config
}

fn key_status(llm: &LlmConfig) -> &'static str {
    let backend = llm.backend.unwrap_or(Backend::Openai);
    if std::env::var(backend.env_var()).is_ok_and(|v| !v.is_empty()) {
        "[key: env]"
    } else if llm.has_plaintext_api_key() {
        "[key: config file]"
    } else if backend == Backend::Ollama {
        "[key: not needed]"
    } else {
        "[key: missing]"
    }
}

fn describe_llm(name: &str, llm: &LlmConfig) {
    println!(
        "  {:<10} {} / {}  {}",
        name,
        llm.backend.unwrap_or(Backend::Openai),
        llm.model.as_deref().unwrap_or("(no model)"),
        key_status(llm)
    );
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = &ctx.loaded;
    let config = ctx.config();

    if ctx.json_output {
        let output = ShowOutput {
            sources: loaded
                .loaded_from()
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            warnings: loaded.warnings.clone(),
            config: serde_json::to_value(redacted(config))?,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("# Mathcast Configuration\n");

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    match config.llm {
        Some(ref llm) => {
            println!("LLM:");
            describe_llm("default", llm);
            let mut profiles: Vec<_> = config.llm_profiles.iter().collect();
            profiles.sort_by(|a, b| a.0.cmp(b.0));
            for (name, profile) in profiles {
                describe_llm(name, profile);
            }
            println!();
        }
        None => println!("No [llm] section configured\n"),
    }

    let pipeline = config.pipeline();
    println!("Pipeline:");
    println!("  output_dir: {}", pipeline.output_dir.display());
    println!("  variant: {:?}", pipeline.variant);
    println!("  self_heal_max_attempts: {}", pipeline.self_heal_max_attempts);
    println!("  default_wait_seconds: {}", pipeline.default_wait_seconds);
    if let Some(ref style) = pipeline.animation_style {
        println!("  animation_style: {}", style);
    }
    println!();

    let tts = config.tts();
    let render = config.render();
    let media = config.media();
    println!("Tools:");
    println!("  tts: {} (voice {})", tts.command, tts.voice);
    println!("  renderer: {} {}", render.manim_command, render.quality_flag);
    println!("  ffmpeg: {}", media.ffmpeg_command);
    println!("  ffprobe: {}", media.ffprobe_command);
    println!();

    if !loaded.warnings.is_empty() {
        println!("Warnings:");
        for w in &loaded.warnings {
            println!("  ⚠ {}", w);
        }
        println!();
    }

    if ctx.verbose {
        println!("---\nRaw config:\n");
        if let Ok(toml_str) = redacted(config).to_toml() {
            println!("{}", toml_str);
        }
    }

    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    println!("Config file search order (later overrides earlier):\n");

    for source in &ctx.loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }

    println!();
    let loaded_count = ctx.loaded.loaded_from().len();
    if loaded_count == 0 {
        println!("No config files found. Run 'mathcast config init' to create one.");
    } else {
        println!("{} config file(s) loaded.", loaded_count);
    }

    Ok(())
}

fn user_config_path(ctx: &Context) -> Result<PathBuf> {
    ctx.config_dir
        .as_ref()
        .map(|d| d.join("config.toml"))
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

const CONFIG_TEMPLATE: &str = r#"# Mathcast Configuration

# Default LLM (API key from OPENAI_API_KEY)
[llm]
backend = "openai"
model = "gpt-4o"
# timeout_secs = 120
# script_timeout_secs = 300

# Model for calls that carry a problem photo (falls back to [llm])
# [llm.vision]
# backend = "openai"
# model = "gpt-4o"

[pipeline]
output_dir = "output"
variant = "html"
self_heal_max_attempts = 5
default_wait_seconds = 2.0
# animation_style = "chalkboard, hand-drawn"

[tts]
command = "edge-tts"
voice = "zh-CN-XiaoxiaoNeural"

[render]
manim_command = "manim"
quality_flag = "-ql"

[media]
ffmpeg_command = "ffmpeg"
ffprobe_command = "ffprobe"
"#;

fn cmd_init(ctx: &Context, local: bool) -> Result<()> {
    let path = if local {
        PathBuf::from("mathcast.toml")
    } else {
        user_config_path(ctx)?
    };

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, CONFIG_TEMPLATE)?;
    println!("✓ Created config file: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  export OPENAI_API_KEY=...      # or set backend/base_url for another provider");
    println!("  mathcast config show           # verify configuration");
    println!("  mathcast generate \"2x + 3 = 7\" # first run");

    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let path = user_config_path(ctx)?;
    println!("{}", path.display());
    Ok(())
}
