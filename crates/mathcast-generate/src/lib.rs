//! LLM-backed content generators for the mathcast pipeline.
//!
//! Implements the analyzer, script-generator and repair traits from
//! `mathcast-pipeline` on top of any [`mathcast_llm::LlmBackend`].
//!
//! ```text
//! problem ──▶ LlmProblemAnalyzer ──▶ Steps
//! Steps   ──▶ SceneScriptGenerator ──▶ scene code   (video)
//!         ──▶ HtmlScriptGenerator  ──▶ html fragment (html)
//!                 plan (1 call) + animate body (1 call per step)
//! failing artifact + error ──▶ LlmRepairer ──▶ candidate
//! ```

pub mod analyzer;
pub mod client;
pub mod html;
pub mod prompts;
pub mod repair;
pub mod scene;

pub use analyzer::LlmProblemAnalyzer;
pub use client::ModelClient;
pub use html::{AnimationPlan, HtmlScriptGenerator, StepPlan, assemble_fragment};
pub use repair::LlmRepairer;
pub use scene::SceneScriptGenerator;

use mathcast_pipeline::{PipelineError, Result, Step};

/// Reject step lists no generator can work from.
pub(crate) fn require_usable_steps(steps: &[Step]) -> Result<()> {
    if steps.is_empty() {
        return Err(PipelineError::InvalidInput("no steps to generate from".to_string()));
    }
    if let Some((index, _)) = steps.iter().enumerate().find(|(_, s)| !s.is_usable()) {
        return Err(PipelineError::InvalidInput(format!(
            "step at position {} is missing a description or narration",
            index
        )));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use test_support::step;

    #[test]
    fn test_require_usable_steps() {
        assert!(require_usable_steps(&test_support::steps(2)).is_ok());
        assert!(matches!(
            require_usable_steps(&[]),
            Err(PipelineError::InvalidInput(_))
        ));
        let err = require_usable_steps(&[step(1, "ok", "ok"), step(2, "ok", "  ")]).unwrap_err();
        assert!(err.to_string().contains("position 1"));
    }
}
