//! Error types for the pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by stages and the orchestrator.
///
/// The orchestrator never converts a stage error into another variant, so
/// callers see exactly what the failing collaborator raised.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Caller-supplied data failed a precondition.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A generator produced output that failed structural validation.
    #[error("Malformed output: {0}")]
    MalformedOutput(String),

    /// Problem analysis produced no steps.
    #[error("Problem analysis produced no steps")]
    EmptyAnalysis,

    /// A required external tool is not installed.
    #[error("Environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    /// An external process exited non-zero or timed out.
    #[error("{tool} failed: {detail}")]
    ExternalToolFailure { tool: String, detail: String },

    /// The repair loop ran out of attempts.
    #[error("Self-heal exhausted after {attempts} attempt(s): {last_error}")]
    SelfHealExhausted { attempts: u32, last_error: String },

    /// The checkpoint claims progress the working directory does not reflect.
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    /// An input file does not exist.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Video/audio composition failed.
    #[error(transparent)]
    Composition(#[from] CompositionError),

    /// Model call failed.
    #[error(transparent)]
    Llm(#[from] mathcast_llm::LlmError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why composing the final video failed.
#[derive(Debug, Error)]
pub enum CompositionError {
    /// The visual or audio track is missing.
    #[error("Composition input missing: {}", .0.display())]
    MissingInput(PathBuf),

    /// The mux tool exited non-zero.
    #[error("Mux failed (exit code {code:?}): {detail}")]
    MuxFailed { code: Option<i32>, detail: String },
}

impl PipelineError {
    /// Shorthand for an external tool failure.
    pub fn tool_failure(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ExternalToolFailure {
            tool: tool.into(),
            detail: detail.into(),
        }
    }
}
