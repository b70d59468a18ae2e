//! Audio concatenation and final muxing through ffmpeg.

use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use mathcast_pipeline::{
    AudioConcatenator, CompositionError, PipelineError, Result, VideoComposer,
};

use crate::process::ProcessRunner;

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// One `file '<path>'` line per input for the concat demuxer.
fn concat_list(inputs: &[PathBuf]) -> Result<String> {
    let mut list = String::new();
    for input in inputs {
        let absolute = std::fs::canonicalize(input)?;
        let quoted = absolute.to_string_lossy().replace('\'', r"'\''");
        list.push_str(&format!("file '{}'\n", quoted));
    }
    Ok(list)
}

/// Joins narration files into one track with the concat demuxer.
#[derive(Debug, Clone)]
pub struct FfmpegConcatenator {
    runner: ProcessRunner,
}

impl FfmpegConcatenator {
    pub fn new(runner: ProcessRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl AudioConcatenator for FfmpegConcatenator {
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        if inputs.is_empty() {
            return Err(PipelineError::InvalidInput(
                "at least one audio file is required".to_string(),
            ));
        }
        if let Some(missing) = inputs.iter().find(|p| !p.is_file()) {
            return Err(PipelineError::FileNotFound(missing.clone()));
        }
        ensure_parent(output).await?;

        if let [single] = inputs {
            tokio::fs::copy(single, output).await?;
            tracing::debug!(output = %output.display(), "Single audio input copied");
            return Ok(());
        }

        let list_dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut list_file = tempfile::Builder::new()
            .prefix(".concat")
            .suffix(".txt")
            .tempfile_in(list_dir)?;
        list_file.write_all(concat_list(inputs)?.as_bytes())?;
        list_file.flush()?;

        let args = [
            OsStr::new("-y"),
            OsStr::new("-f"),
            OsStr::new("concat"),
            OsStr::new("-safe"),
            OsStr::new("0"),
            OsStr::new("-i"),
            list_file.path().as_os_str(),
            OsStr::new("-c"),
            OsStr::new("copy"),
            output.as_os_str(),
        ];
        self.runner.run(args, None).await?;

        tracing::info!(inputs = inputs.len(), output = %output.display(), "Audio concatenated");
        Ok(())
    }
}

/// Muxes the rendered video with the narration track.
#[derive(Debug, Clone)]
pub struct FfmpegComposer {
    runner: ProcessRunner,
}

impl FfmpegComposer {
    pub fn new(runner: ProcessRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl VideoComposer for FfmpegComposer {
    async fn compose(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        for input in [video, audio] {
            if !input.is_file() {
                return Err(CompositionError::MissingInput(input.to_path_buf()).into());
            }
        }
        ensure_parent(output).await?;

        let args = [
            OsStr::new("-y"),
            OsStr::new("-i"),
            video.as_os_str(),
            OsStr::new("-i"),
            audio.as_os_str(),
            OsStr::new("-c:v"),
            OsStr::new("copy"),
            OsStr::new("-c:a"),
            OsStr::new("aac"),
            OsStr::new("-shortest"),
            output.as_os_str(),
        ];
        let result = self.runner.output(args, None).await?;
        if !result.success() {
            return Err(CompositionError::MuxFailed {
                code: result.code(),
                detail: result.detail(),
            }
            .into());
        }

        tracing::info!(output = %output.display(), "Final video composed");
        Ok(())
    }
}
