//! Builds pipeline collaborators from the merged configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};

use mathcast_config::{Backend, LlmConfig, MathcastConfig};
use mathcast_generate::{
    HtmlScriptGenerator, LlmProblemAnalyzer, LlmRepairer, ModelClient, SceneScriptGenerator,
};
use mathcast_llm::{OpenAiBackend, OpenAiConfig, SharedBackend};
use mathcast_media::{
    DurationProbe, FfmpegComposer, FfmpegConcatenator, HtmlRenderer, ProcessRunner,
    SceneRenderer, TtsNarrator,
};
use mathcast_pipeline::{
    ArtifactKind, Generators, Orchestrator, OrchestratorConfig, PipelineVariant, SelfHealEngine,
};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

fn backend_config(llm: &LlmConfig, timeout: Duration) -> Result<OpenAiConfig> {
    let backend = llm.backend.unwrap_or(Backend::Openai);
    let api_key = llm.resolve_api_key()?;

    let mut config = match backend {
        Backend::Openai => OpenAiConfig::openai(api_key.clone().unwrap_or_default()),
        Backend::Groq => OpenAiConfig::groq(api_key.clone().unwrap_or_default()),
        Backend::Ollama => OpenAiConfig::ollama(),
        Backend::Custom => {
            let Some(ref base_url) = llm.base_url else {
                bail!("backend 'custom' requires llm.base_url");
            };
            OpenAiConfig::openai(api_key.clone().unwrap_or_default())
                .with_base_url(base_url)
                .with_name("custom")
        }
    };
    config.api_key = api_key;

    if let Some(ref base_url) = llm.base_url {
        config = config.with_base_url(base_url);
    }
    if let Some(ref model) = llm.model {
        config = config.with_model(model);
    }
    if let Some(retries) = llm.retry_max {
        config = config.with_max_retries(retries);
    }
    if let Some(backoff) = llm.retry_backoff_ms {
        config = config.with_retry_backoff(Duration::from_millis(backoff));
    }
    Ok(config.with_timeout(timeout))
}

/// A model client for `llm` whose requests time out after `timeout_secs`.
pub fn model_client(llm: &LlmConfig, timeout_secs: u64) -> Result<ModelClient> {
    let model = llm
        .model
        .clone()
        .context("no model configured; set `model` in the [llm] section")?;
    let config = backend_config(llm, Duration::from_secs(timeout_secs))?;
    let backend: SharedBackend = Arc::new(OpenAiBackend::new(config)?);

    let mut client = ModelClient::new(backend, model);
    if let Some(max_tokens) = llm.max_tokens {
        client = client.with_max_tokens(max_tokens);
    }
    if let Some(temperature) = llm.temperature {
        client = client.with_temperature(temperature);
    }
    Ok(client)
}

fn request_timeout(llm: &LlmConfig) -> u64 {
    llm.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
}

/// Script generation produces long completions and gets its own timeout.
fn script_timeout(llm: &LlmConfig) -> u64 {
    llm.script_timeout_secs.unwrap_or_else(|| request_timeout(llm))
}

fn runner(command: &str, timeout_secs: u64) -> ProcessRunner {
    ProcessRunner::new(command, Duration::from_secs(timeout_secs))
}

/// Every collaborator a run of `variant` needs.
pub fn build_generators(config: &MathcastConfig, variant: PipelineVariant) -> Result<Generators> {
    let text_llm = config.text_llm()?;
    let vision_llm = config.vision_llm()?;
    let pipeline = config.pipeline();
    let tts = config.tts();
    let render = config.render();
    let media = config.media();

    let text = model_client(text_llm, request_timeout(text_llm))?;
    let vision = model_client(vision_llm, request_timeout(vision_llm))?;
    let script = model_client(text_llm, script_timeout(text_llm))?;

    let analyzer = Arc::new(LlmProblemAnalyzer::new(text).with_vision(vision));

    let probe = DurationProbe::new(
        runner(&media.ffprobe_command, media.probe_timeout_secs),
        pipeline.default_wait_seconds,
    );
    let narrator = Arc::new(TtsNarrator::new(
        runner(&tts.command, tts.timeout_secs),
        tts.voice.clone(),
        probe,
    ));
    let engine = SelfHealEngine::new(pipeline.self_heal_max_attempts);

    let generators = match variant {
        PipelineVariant::Html => {
            let vision_script = model_client(vision_llm, script_timeout(vision_llm))?;
            let generator = HtmlScriptGenerator::new(script.clone())
                .with_vision(vision_script)
                .with_style(pipeline.animation_style.clone());
            let repairer = Arc::new(LlmRepairer::new(script, ArtifactKind::HtmlAnimation));
            let renderer = HtmlRenderer::new(engine, repairer)
                .with_audio_prefix(pipeline.audio_prefix.clone())
                .with_default_seconds(pipeline.default_wait_seconds);
            Generators::new(analyzer, Arc::new(generator), narrator, Arc::new(renderer))
        }
        PipelineVariant::Video => {
            let generator = SceneScriptGenerator::new(script.clone())
                .with_scene_class(render.scene_class.clone())
                .with_style(pipeline.animation_style.clone());
            let repairer = Arc::new(
                LlmRepairer::new(script, ArtifactKind::SceneCode)
                    .with_scene_class(render.scene_class.clone()),
            );
            let renderer = SceneRenderer::new(
                runner(&render.manim_command, render.timeout_secs),
                engine,
                repairer,
            )
            .with_scene_class(render.scene_class.clone())
            .with_quality_flag(render.quality_flag.clone())
            .with_default_seconds(pipeline.default_wait_seconds);
            Generators::new(analyzer, Arc::new(generator), narrator, Arc::new(renderer))
                .with_video_tools(
                    Arc::new(FfmpegConcatenator::new(runner(
                        &media.ffmpeg_command,
                        media.concat_timeout_secs,
                    ))),
                    Arc::new(FfmpegComposer::new(runner(
                        &media.ffmpeg_command,
                        media.mux_timeout_secs,
                    ))),
                )
        }
    };

    tracing::debug!(
        variant = %variant,
        model = text_llm.model.as_deref().unwrap_or_default(),
        voice = %tts.voice,
        "Pipeline collaborators built"
    );
    Ok(generators)
}

/// Orchestrator for `variant` wired from `config`.
pub fn build_orchestrator(config: &MathcastConfig, variant: PipelineVariant) -> Result<Orchestrator> {
    let generators = build_generators(config, variant)?;
    let orchestrator_config = OrchestratorConfig {
        audio_prefix: config.pipeline().audio_prefix,
    };
    Ok(Orchestrator::new(orchestrator_config, generators))
}
