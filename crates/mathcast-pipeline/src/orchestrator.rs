//! Stage sequencing with checkpoint resume.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::checkpoint::{CheckpointStore, StagePayload};
use crate::contracts::{
    ArtifactRenderer, AudioConcatenator, NarrationSynthesizer, ProblemAnalyzer, ProgressSink,
    ScriptGenerator, VideoComposer,
};
use crate::error::{PipelineError, Result};
use crate::model::{DurationList, PipelineVariant, ScriptArtifact, Step};
use crate::run::{PipelineRun, RunLayout, remove_dir_if_exists, step_audio_files};
use crate::stage::StageId;

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Filename prefix for per-step narration audio.
    pub audio_prefix: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            audio_prefix: "step".to_string(),
        }
    }
}

/// The collaborators each stage delegates to.
#[derive(Clone)]
pub struct Generators {
    pub analyzer: Arc<dyn ProblemAnalyzer>,
    pub script: Arc<dyn ScriptGenerator>,
    pub narrator: Arc<dyn NarrationSynthesizer>,
    pub renderer: Arc<dyn ArtifactRenderer>,
    /// Required by the video variant only.
    pub concatenator: Option<Arc<dyn AudioConcatenator>>,
    /// Required by the video variant only.
    pub composer: Option<Arc<dyn VideoComposer>>,
}

impl Generators {
    pub fn new(
        analyzer: Arc<dyn ProblemAnalyzer>,
        script: Arc<dyn ScriptGenerator>,
        narrator: Arc<dyn NarrationSynthesizer>,
        renderer: Arc<dyn ArtifactRenderer>,
    ) -> Self {
        Self {
            analyzer,
            script,
            narrator,
            renderer,
            concatenator: None,
            composer: None,
        }
    }

    /// Add the audio and mux tools the video variant needs.
    pub fn with_video_tools(
        mut self,
        concatenator: Arc<dyn AudioConcatenator>,
        composer: Arc<dyn VideoComposer>,
    ) -> Self {
        self.concatenator = Some(concatenator);
        self.composer = Some(composer);
        self
    }
}

/// Working values threaded between stages.
#[derive(Debug, Default)]
struct RunState {
    steps: Option<Vec<Step>>,
    script: Option<ScriptArtifact>,
    durations: Option<DurationList>,
}

impl RunState {
    fn steps(&self) -> Result<&[Step]> {
        self.steps
            .as_deref()
            .ok_or_else(|| missing_input("steps"))
    }

    fn script(&self) -> Result<&ScriptArtifact> {
        self.script.as_ref().ok_or_else(|| missing_input("script"))
    }

    fn durations(&self) -> Result<&DurationList> {
        self.durations
            .as_ref()
            .ok_or_else(|| missing_input("durations"))
    }
}

/// Recreate `dir` empty.
fn reset_dir(dir: &Path) -> Result<()> {
    remove_dir_if_exists(dir)?;
    std::fs::create_dir_all(dir)?;
    Ok(())
}

fn missing_input(what: &str) -> PipelineError {
    PipelineError::InconsistentState(format!("{} not available for the current stage", what))
}

/// Runs the fixed stage list for one [`PipelineRun`], resuming from its
/// checkpoint.
///
/// Stages run strictly in order within a run. Independent runs may be driven
/// concurrently as long as they use distinct working directories.
pub struct Orchestrator {
    config: OrchestratorConfig,
    generators: Generators,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, generators: Generators) -> Self {
        Self { config, generators }
    }

    /// Execute every stage not yet checkpointed and return the final
    /// artifact path.
    ///
    /// With `force_restart` the checkpoint is discarded first. A stage error
    /// aborts the run unchanged and leaves the checkpoint at the last
    /// completed stage.
    pub async fn run(
        &self,
        run: &PipelineRun,
        progress: Option<&dyn ProgressSink>,
        force_restart: bool,
    ) -> Result<PathBuf> {
        if run.problem_text.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "problem text is empty".to_string(),
            ));
        }
        let variant = run.variant;
        if variant == PipelineVariant::Video
            && (self.generators.concatenator.is_none() || self.generators.composer.is_none())
        {
            return Err(PipelineError::InvalidInput(
                "the video pipeline needs an audio concatenator and a video composer".to_string(),
            ));
        }

        let stages = variant.stages();
        let layout = run.layout();
        let store = CheckpointStore::new(&run.work_dir, variant);
        let mut state = RunState::default();
        let mut resume_at = 0usize;

        if force_restart {
            store.clear()?;
            tracing::info!(run_id = %run.id, "Checkpoint cleared, restarting");
        } else {
            let checkpoint = store.load();
            if !checkpoint.is_empty() {
                resume_at = checkpoint.last_stage as usize + 1;
                state.steps = checkpoint.steps;
                state.script = checkpoint.script;
                state.durations = checkpoint.durations;
                tracing::info!(
                    run_id = %run.id,
                    last_completed_stage = checkpoint.last_stage,
                    "Resuming from checkpoint"
                );
            }
        }

        let final_path = layout.final_artifact(variant);
        if resume_at >= stages.len() {
            if final_path.is_file() {
                store.clear()?;
                return Ok(final_path);
            }
            return Err(PipelineError::InconsistentState(format!(
                "checkpoint marks all stages complete but {} is missing",
                final_path.display()
            )));
        }

        for stage in &stages[..resume_at] {
            if let Some(output) = layout.stage_output(*stage, variant)
                && !output.is_file()
            {
                return Err(PipelineError::InconsistentState(format!(
                    "checkpoint marks {} complete but {} is missing",
                    stage,
                    output.display()
                )));
            }
        }

        std::fs::create_dir_all(&run.work_dir)?;

        for stage in &stages[resume_at..] {
            let stage = *stage;
            if let Some(sink) = progress {
                sink.stage_started(stage.index(), stage.name());
            }
            tracing::info!(run_id = %run.id, stage = stage.index(), name = stage.name(), "Stage started");
            let started = Instant::now();

            let payload = self.execute_stage(stage, run, &layout, &mut state).await?;
            store.save_stage(stage, &payload)?;

            tracing::info!(
                run_id = %run.id,
                stage = stage.index(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Stage completed"
            );
        }

        store.clear()?;
        tracing::info!(run_id = %run.id, output = %final_path.display(), "Pipeline finished");
        Ok(final_path)
    }

    async fn execute_stage(
        &self,
        stage: StageId,
        run: &PipelineRun,
        layout: &RunLayout,
        state: &mut RunState,
    ) -> Result<StagePayload> {
        let variant = run.variant;
        match stage {
            StageId::Analyze => {
                let steps = self
                    .generators
                    .analyzer
                    .analyze(&run.problem_text, run.image.as_ref())
                    .await?;
                if steps.is_empty() {
                    return Err(PipelineError::EmptyAnalysis);
                }
                tracing::debug!(steps = steps.len(), "Problem analyzed");
                state.steps = Some(steps.clone());
                Ok(StagePayload::Steps(steps))
            }
            StageId::GenerateScript => {
                let steps = state.steps()?;
                let script = self
                    .generators
                    .script
                    .generate(steps, run.image.as_ref())
                    .await?;
                if script.duration_slots != steps.len() {
                    tracing::warn!(
                        slots = script.duration_slots,
                        steps = steps.len(),
                        "Pause marker count differs from step count"
                    );
                }
                tracing::debug!(bytes = script.body.len(), "Script generated");
                state.script = Some(script.clone());
                Ok(StagePayload::Script(script))
            }
            StageId::Narrate => {
                let steps = state.steps()?;
                let audio_dir = layout.audio_dir();
                reset_dir(&audio_dir)?;
                let durations = self
                    .generators
                    .narrator
                    .synthesize(steps, &audio_dir, &self.config.audio_prefix)
                    .await?;
                if durations.len() < steps.len() {
                    tracing::warn!(
                        durations = durations.len(),
                        steps = steps.len(),
                        "Fewer durations than steps, defaults will fill the gap"
                    );
                }
                state.durations = Some(durations.clone());
                Ok(StagePayload::Durations(durations))
            }
            StageId::Render => {
                let output = layout
                    .stage_output(StageId::Render, variant)
                    .unwrap_or_else(|| layout.final_artifact(variant));
                self.generators
                    .renderer
                    .render(state.script()?, state.durations()?, &layout.audio_dir(), &output)
                    .await?;
                Ok(StagePayload::None)
            }
            StageId::ConcatAudio => {
                let concatenator = self
                    .generators
                    .concatenator
                    .as_ref()
                    .ok_or_else(|| missing_input("audio concatenator"))?;
                let inputs = step_audio_files(
                    &layout.audio_dir(),
                    &self.config.audio_prefix,
                    state.steps()?.len(),
                );
                concatenator.concat(&inputs, &layout.full_audio()).await?;
                Ok(StagePayload::None)
            }
            StageId::Compose => {
                let composer = self
                    .generators
                    .composer
                    .as_ref()
                    .ok_or_else(|| missing_input("video composer"))?;
                composer
                    .compose(&layout.scene_video(), &layout.full_audio(), &layout.final_video())
                    .await?;
                Ok(StagePayload::None)
            }
        }
    }
}
