//! Problem analysis: text (and optional photo) to ordered steps.

use async_trait::async_trait;
use serde::Deserialize;

use mathcast_pipeline::{ImagePayload, PipelineError, ProblemAnalyzer, Result, Step};

use crate::client::ModelClient;
use crate::prompts::AnalysisPrompt;

#[derive(Debug, Deserialize)]
struct AnalysisOutput {
    #[serde(default)]
    steps: Vec<Step>,
}

/// Breaks a problem into solution steps with one structured model call.
///
/// Calls carrying an image go to the vision client when one is set.
#[derive(Debug, Clone)]
pub struct LlmProblemAnalyzer {
    text: ModelClient,
    vision: Option<ModelClient>,
}

impl LlmProblemAnalyzer {
    pub fn new(text: ModelClient) -> Self {
        Self { text, vision: None }
    }

    pub fn with_vision(mut self, vision: ModelClient) -> Self {
        self.vision = Some(vision);
        self
    }

    fn client_for(&self, image: Option<&ImagePayload>) -> &ModelClient {
        match (image, &self.vision) {
            (Some(_), Some(vision)) => vision,
            _ => &self.text,
        }
    }
}

/// Order by the model's ids, then renumber 1..=n.
fn normalize_steps(mut steps: Vec<Step>) -> Vec<Step> {
    steps.sort_by_key(|s| s.step_id);
    for (i, step) in steps.iter_mut().enumerate() {
        step.step_id = i as u32 + 1;
    }
    steps
}

#[async_trait]
impl ProblemAnalyzer for LlmProblemAnalyzer {
    async fn analyze(&self, problem_text: &str, image: Option<&ImagePayload>) -> Result<Vec<Step>> {
        if problem_text.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "problem text is empty".to_string(),
            ));
        }

        let client = self.client_for(image);
        tracing::debug!(model = client.model(), image = image.is_some(), "Analyzing problem");

        let prompt = AnalysisPrompt::build(problem_text, image.is_some());
        let output: AnalysisOutput = client
            .invoke_structured("problem analysis", &prompt, image)
            .await?;

        let steps = normalize_steps(output.steps);
        tracing::info!(steps = steps.len(), "Problem analysis complete");
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mathcast_llm::MockBackend;
    use std::sync::Arc;

    const TWO_STEPS_OUT_OF_ORDER: &str = r#"{"steps": [
        {"step_id": 7, "description": "check", "voiceover_text": "check it"},
        {"step_id": 3, "description": "solve", "math_formula": "$x=3$", "visual_focus": "x", "voiceover_text": "x is three"}
    ]}"#;

    #[tokio::test]
    async fn test_steps_sorted_and_renumbered() {
        let mock = Arc::new(MockBackend::with_text(TWO_STEPS_OUT_OF_ORDER));
        let analyzer = LlmProblemAnalyzer::new(ModelClient::new(mock, "m"));

        let steps = analyzer.analyze("2x + 3 = 9", None).await.unwrap();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_id, 1);
        assert_eq!(steps[0].description, "solve");
        assert_eq!(steps[0].math_formula, "$x=3$");
        assert_eq!(steps[1].step_id, 2);
        assert_eq!(steps[1].visual_focus, "");
    }

    #[tokio::test]
    async fn test_blank_problem_rejected_without_call() {
        let mock = Arc::new(MockBackend::with_text(TWO_STEPS_OUT_OF_ORDER));
        let analyzer = LlmProblemAnalyzer::new(ModelClient::new(mock.clone(), "m"));

        let err = analyzer.analyze(" \t\n", None).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_step_list_is_returned() {
        let mock = Arc::new(MockBackend::with_text(r#"{"steps": []}"#));
        let analyzer = LlmProblemAnalyzer::new(ModelClient::new(mock, "m"));
        assert!(analyzer.analyze("1+1", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_image_uses_vision_client() {
        let text = Arc::new(MockBackend::new(vec![]));
        let vision = Arc::new(MockBackend::with_text(TWO_STEPS_OUT_OF_ORDER));
        let analyzer = LlmProblemAnalyzer::new(ModelClient::new(text.clone(), "text"))
            .with_vision(ModelClient::new(vision.clone(), "eyes"));
        let image = ImagePayload::new(vec![1, 2, 3], "image/jpeg");

        analyzer.analyze("see photo", Some(&image)).await.unwrap();

        assert_eq!(text.request_count(), 0);
        let request = &vision.requests()[0];
        assert_eq!(request.model, "eyes");
        assert!(request.messages[0].has_image());
        assert!(request.messages[0].text().contains("attached image"));
    }

    #[tokio::test]
    async fn test_missing_required_field_is_malformed() {
        let mock = Arc::new(MockBackend::with_text(
            r#"{"steps": [{"step_id": 1, "description": "no narration"}]}"#,
        ));
        let analyzer = LlmProblemAnalyzer::new(ModelClient::new(mock, "m"));
        let err = analyzer.analyze("1+1", None).await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedOutput(_)));
    }
}
