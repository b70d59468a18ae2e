//! Bounded external process execution.
//!
//! Every tool the pipeline shells out to (TTS, renderer, ffmpeg, ffprobe)
//! goes through [`ProcessRunner`], which enforces a timeout and maps spawn
//! and exit failures onto [`PipelineError`].

use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::process::Command;

use mathcast_pipeline::{PipelineError, Result};

/// Failure detail passed on to errors is capped to this many characters,
/// keeping the tail where tools print the actual error.
const MAX_DETAIL_CHARS: usize = 4000;

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// stderr when present, otherwise stdout, trimmed to the tail.
    pub fn detail(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        tail(text.trim(), MAX_DETAIL_CHARS)
    }
}

fn tail(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let skip = count - max;
    format!("...{}", text.chars().skip(skip).collect::<String>())
}

/// Runs one external tool with a fixed timeout.
///
/// The command line may carry leading arguments, e.g. `python -m manim`.
/// Children are killed when the wait is abandoned.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    base_args: Vec<String>,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(command_line: &str, timeout: Duration) -> Self {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            base_args: parts.collect(),
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Short tool name used in errors and logs.
    pub fn tool_name(&self) -> String {
        Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.program)
            .to_string()
    }

    /// Run to completion and return the output whatever the exit status.
    ///
    /// A missing program is `EnvironmentUnavailable`; exceeding the timeout
    /// is `ExternalToolFailure`.
    pub async fn output<I, S>(&self, args: I, cwd: Option<&Path>) -> Result<ProcessOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        if self.program.is_empty() {
            return Err(PipelineError::EnvironmentUnavailable(
                "no command configured".to_string(),
            ));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let started = Instant::now();
        let child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PipelineError::EnvironmentUnavailable(format!(
                "`{}` not found; install it or point the config at it",
                self.program
            )),
            _ => PipelineError::Io(e),
        })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(tool = %self.tool_name(), timeout_secs = self.timeout.as_secs(), "Process timed out");
                return Err(PipelineError::tool_failure(
                    self.tool_name(),
                    format!("timed out after {}s", self.timeout.as_secs_f64()),
                ));
            }
        };

        tracing::debug!(
            tool = %self.tool_name(),
            code = ?output.status.code(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Process finished"
        );

        Ok(ProcessOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run and require a zero exit status.
    pub async fn run<I, S>(&self, args: I, cwd: Option<&Path>) -> Result<ProcessOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.output(args, cwd).await?;
        if !output.success() {
            return Err(PipelineError::tool_failure(
                self.tool_name(),
                format!("exit {:?}: {}", output.code(), output.detail()),
            ));
        }
        Ok(output)
    }
}
