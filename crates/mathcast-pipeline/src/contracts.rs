//! Collaborator traits consumed by the orchestrator.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{DurationList, ImagePayload, ScriptArtifact, Step};

/// Problem text (and optional photo) to ordered steps.
#[async_trait]
pub trait ProblemAnalyzer: Send + Sync {
    /// Fails with `InvalidInput` when `problem_text` is blank.
    async fn analyze(&self, problem_text: &str, image: Option<&ImagePayload>) -> Result<Vec<Step>>;
}

/// Steps to a renderable script artifact.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    /// Fails with `InvalidInput` on unusable steps and `MalformedOutput`
    /// when the produced artifact lacks its structural markers.
    async fn generate(
        &self,
        steps: &[Step],
        image: Option<&ImagePayload>,
    ) -> Result<ScriptArtifact>;
}

/// Steps to narration audio files plus their durations.
#[async_trait]
pub trait NarrationSynthesizer: Send + Sync {
    /// Writes `{prefix}_{n}.mp3` for step `n` (1-based) into `out_dir`.
    async fn synthesize(&self, steps: &[Step], out_dir: &Path, prefix: &str)
    -> Result<DurationList>;
}

/// Script artifact plus durations to the rendered output file.
#[async_trait]
pub trait ArtifactRenderer: Send + Sync {
    async fn render(
        &self,
        artifact: &ScriptArtifact,
        durations: &DurationList,
        audio_dir: &Path,
        output: &Path,
    ) -> Result<()>;
}

/// Ordered audio files to one track.
#[async_trait]
pub trait AudioConcatenator: Send + Sync {
    /// Fails with `FileNotFound` if any input is missing.
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<()>;
}

/// Visual track plus audio track to the final video.
#[async_trait]
pub trait VideoComposer: Send + Sync {
    async fn compose(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;
}

/// Notified immediately before each executed stage.
pub trait ProgressSink: Send + Sync {
    fn stage_started(&self, stage_index: usize, stage_name: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, &str) + Send + Sync,
{
    fn stage_started(&self, stage_index: usize, stage_name: &str) {
        self(stage_index, stage_name)
    }
}
