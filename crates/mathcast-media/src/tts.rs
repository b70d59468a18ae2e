//! Narration synthesis through the `edge-tts` CLI, plus duration probing.

use std::ffi::OsStr;
use std::path::Path;

use async_trait::async_trait;

use mathcast_pipeline::{DurationList, NarrationSynthesizer, Result, Step, audio_file_name};

use crate::process::ProcessRunner;

/// Measures audio length with ffprobe.
///
/// Probing never fails the pipeline: a missing tool, a timeout or
/// unparsable output all yield the default duration.
#[derive(Debug, Clone)]
pub struct DurationProbe {
    runner: ProcessRunner,
    default_seconds: f64,
}

impl DurationProbe {
    pub fn new(runner: ProcessRunner, default_seconds: f64) -> Self {
        Self {
            runner,
            default_seconds,
        }
    }

    pub fn default_seconds(&self) -> f64 {
        self.default_seconds
    }

    pub async fn probe_duration(&self, path: &Path) -> f64 {
        let args = [
            OsStr::new("-v"),
            OsStr::new("error"),
            OsStr::new("-show_entries"),
            OsStr::new("format=duration"),
            OsStr::new("-of"),
            OsStr::new("default=noprint_wrappers=1:nokey=1"),
            path.as_os_str(),
        ];
        match self.runner.run(args, None).await {
            Ok(output) => match parse_duration(&output.stdout) {
                Some(seconds) => seconds,
                None => {
                    tracing::warn!(
                        path = %path.display(),
                        output = %output.stdout.trim(),
                        "Unparsable probe output, using default duration"
                    );
                    self.default_seconds
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Duration probe failed, using default duration");
                self.default_seconds
            }
        }
    }
}

fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .and_then(|l| l.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

/// Writes one narration file per step with a single voice for the batch.
///
/// Steps with blank narration get the probe's default duration and no file.
#[derive(Debug, Clone)]
pub struct TtsNarrator {
    runner: ProcessRunner,
    voice: String,
    probe: DurationProbe,
}

impl TtsNarrator {
    pub fn new(runner: ProcessRunner, voice: impl Into<String>, probe: DurationProbe) -> Self {
        Self {
            runner,
            voice: voice.into(),
            probe,
        }
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }
}

#[async_trait]
impl NarrationSynthesizer for TtsNarrator {
    async fn synthesize(
        &self,
        steps: &[Step],
        out_dir: &Path,
        prefix: &str,
    ) -> Result<DurationList> {
        tokio::fs::create_dir_all(out_dir).await?;
        tracing::info!(voice = %self.voice, steps = steps.len(), "Synthesizing narration");

        let mut durations = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let text = step.voiceover_text.trim();
            if text.is_empty() {
                durations.push(self.probe.default_seconds());
                continue;
            }

            let path = out_dir.join(audio_file_name(prefix, index + 1));
            let args = [
                OsStr::new("--voice"),
                OsStr::new(&self.voice),
                OsStr::new("--text"),
                OsStr::new(text),
                OsStr::new("--write-media"),
                path.as_os_str(),
            ];
            self.runner.run(args, None).await?;

            let seconds = self.probe.probe_duration(&path).await;
            tracing::debug!(step = index + 1, seconds, "Narration written");
            durations.push(seconds);
        }

        Ok(DurationList::new(durations))
    }
}
