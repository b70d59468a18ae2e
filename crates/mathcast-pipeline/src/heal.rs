//! Bounded validate → execute → repair loop for generated code.
//!
//! The engine is memoryless beyond one step: each repair sees the previous
//! candidate and the latest error only.

use async_trait::async_trait;

use crate::error::{PipelineError, Result};
use crate::fence::strip_code_fences;

/// How an `execute` call failed.
#[derive(Debug)]
pub enum ExecuteFailure {
    /// A required tool is missing. Repairing the artifact cannot help.
    Environment(String),
    /// The artifact itself is at fault; the detail is fed to the repairer.
    Defect(String),
    /// Any other error, propagated unchanged.
    Fatal(PipelineError),
}

impl From<PipelineError> for ExecuteFailure {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::EnvironmentUnavailable(detail) => ExecuteFailure::Environment(detail),
            PipelineError::ExternalToolFailure { tool, detail } => {
                ExecuteFailure::Defect(format!("{} failed:\n{}", tool, detail))
            }
            other => ExecuteFailure::Fatal(other),
        }
    }
}

/// An artifact kind the engine can check and run.
#[async_trait]
pub trait HealTarget: Send + Sync {
    /// Static checks; an empty list means the candidate may be executed.
    fn validate(&self, candidate: &str) -> Vec<String>;

    /// Produce the final output from the candidate.
    async fn execute(&self, candidate: &str) -> std::result::Result<(), ExecuteFailure>;
}

/// Produces a corrected candidate from a failing one.
#[async_trait]
pub trait Repairer: Send + Sync {
    async fn repair(&self, candidate: &str, error: &str) -> Result<String>;
}

/// Successful heal result.
#[derive(Debug, Clone, PartialEq)]
pub struct HealOutcome {
    /// The candidate that was executed successfully.
    pub artifact: String,
    /// Attempts used, starting at 1.
    pub attempts: u32,
}

enum AttemptFailure {
    Validation(String),
    Execution(String),
}

impl AttemptFailure {
    fn detail(&self) -> &str {
        match self {
            AttemptFailure::Validation(d) | AttemptFailure::Execution(d) => d,
        }
    }
}

/// The repair loop. `max_attempts` counts executions of the full
/// validate/execute cycle; `repair` runs at most `max_attempts - 1` times.
#[derive(Debug, Clone, Copy)]
pub struct SelfHealEngine {
    max_attempts: u32,
}

impl SelfHealEngine {
    /// Zero is treated as one attempt.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run the loop starting from `initial`.
    ///
    /// When attempts run out on a validation failure the last candidate is
    /// executed anyway, since validation may be stricter than the renderer.
    pub async fn run(
        &self,
        initial: &str,
        target: &dyn HealTarget,
        repairer: &dyn Repairer,
    ) -> Result<HealOutcome> {
        let mut candidate = strip_code_fences(initial);
        let mut attempt: u32 = 1;

        loop {
            let errors = target.validate(&candidate);
            let failure = if errors.is_empty() {
                match target.execute(&candidate).await {
                    Ok(()) => {
                        tracing::info!(attempts = attempt, "Artifact accepted");
                        return Ok(HealOutcome {
                            artifact: candidate,
                            attempts: attempt,
                        });
                    }
                    Err(ExecuteFailure::Environment(detail)) => {
                        return Err(PipelineError::EnvironmentUnavailable(detail));
                    }
                    Err(ExecuteFailure::Fatal(err)) => return Err(err),
                    Err(ExecuteFailure::Defect(detail)) => AttemptFailure::Execution(detail),
                }
            } else {
                AttemptFailure::Validation(errors.join("\n"))
            };

            if attempt >= self.max_attempts {
                return self.finish_exhausted(candidate, attempt, failure, target).await;
            }

            tracing::warn!(
                attempt = attempt,
                max_attempts = self.max_attempts,
                error = %failure.detail(),
                "Artifact rejected, requesting repair"
            );
            let repaired = repairer.repair(&candidate, failure.detail()).await?;
            candidate = strip_code_fences(&repaired);
            attempt += 1;
        }
    }

    async fn finish_exhausted(
        &self,
        candidate: String,
        attempts: u32,
        failure: AttemptFailure,
        target: &dyn HealTarget,
    ) -> Result<HealOutcome> {
        match failure {
            AttemptFailure::Execution(last_error) => {
                Err(PipelineError::SelfHealExhausted { attempts, last_error })
            }
            AttemptFailure::Validation(validation_error) => {
                tracing::warn!(
                    attempts = attempts,
                    error = %validation_error,
                    "Attempts exhausted on validation, executing last candidate anyway"
                );
                match target.execute(&candidate).await {
                    Ok(()) => Ok(HealOutcome {
                        artifact: candidate,
                        attempts,
                    }),
                    Err(ExecuteFailure::Environment(detail)) => {
                        Err(PipelineError::EnvironmentUnavailable(detail))
                    }
                    Err(ExecuteFailure::Fatal(err)) => Err(err),
                    Err(ExecuteFailure::Defect(last_error)) => {
                        Err(PipelineError::SelfHealExhausted { attempts, last_error })
                    }
                }
            }
        }
    }
}
