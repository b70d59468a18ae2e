//! Two-phase HTML animation generation.
//!
//! Phase one asks for a plan covering every step (shared CSS, an optional
//! SVG base figure, one animation description per step). Phase two asks for
//! the `animate(container)` body of each step separately, so a long problem
//! never needs one huge completion. The pieces are then assembled into a
//! fragment that registers `window.stepAnimations`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mathcast_pipeline::{
    ArtifactKind, HTML_PLACEHOLDER, ImagePayload, PipelineError, Result, ScriptArtifact,
    ScriptGenerator, Step, strip_code_fences,
};

use crate::client::ModelClient;
use crate::prompts::{PlanPrompt, StepCodePrompt, abbreviate, steps_json};
use crate::require_usable_steps;

const CSS_SUMMARY_CHARS: usize = 200;
const PREVIOUS_STEP_CHARS: usize = 80;

/// Animation plan for one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepPlan {
    #[serde(default)]
    pub step_id: u32,
    #[serde(default)]
    pub animation_description: String,
    #[serde(default)]
    pub image_prompt: String,
}

/// Phase-one output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationPlan {
    #[serde(default)]
    pub shared_css: String,
    #[serde(default)]
    pub shared_svg: String,
    #[serde(default)]
    pub step_plans: Vec<StepPlan>,
}

impl AnimationPlan {
    /// Pad with generic plans or truncate so there is one plan per step.
    fn fit_to(&mut self, steps: &[Step]) {
        if self.step_plans.len() > steps.len() {
            self.step_plans.truncate(steps.len());
        }
        for step in &steps[self.step_plans.len()..] {
            self.step_plans.push(StepPlan {
                step_id: step.step_id,
                animation_description: format!(
                    "Show the content of step {}: {}",
                    step.step_id, step.description
                ),
                image_prompt: String::new(),
            });
        }
    }

    fn css_summary(&self) -> String {
        if self.shared_css.trim().is_empty() {
            "none".to_string()
        } else {
            abbreviate(&self.shared_css, CSS_SUMMARY_CHARS)
        }
    }
}

#[derive(Debug, Deserialize)]
struct StepCode {
    animate_body: String,
}

/// Generates the HTML animation fragment.
///
/// The plan call may carry the problem photo and then goes to the vision
/// client when one is configured. Per-step calls are text only.
#[derive(Debug, Clone)]
pub struct HtmlScriptGenerator {
    text: ModelClient,
    vision: Option<ModelClient>,
    style: Option<String>,
}

impl HtmlScriptGenerator {
    pub fn new(text: ModelClient) -> Self {
        Self {
            text,
            vision: None,
            style: None,
        }
    }

    pub fn with_vision(mut self, vision: ModelClient) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_style(mut self, style: Option<String>) -> Self {
        self.style = style;
        self
    }

    async fn plan(&self, steps: &[Step], image: Option<&ImagePayload>) -> Result<AnimationPlan> {
        let client = match (image, &self.vision) {
            (Some(_), Some(vision)) => vision,
            _ => &self.text,
        };
        let prompt = PlanPrompt::build(&steps_json(steps)?, image.is_some(), self.style.as_deref());
        let mut plan: AnimationPlan = client
            .invoke_structured("animation plan", &prompt, image)
            .await?;

        if plan.step_plans.len() != steps.len() {
            tracing::warn!(
                plans = plan.step_plans.len(),
                steps = steps.len(),
                "Plan count differs from step count, fitting"
            );
        }
        plan.fit_to(steps);
        Ok(plan)
    }

    async fn step_body(
        &self,
        step: &Step,
        plan: &AnimationPlan,
        index: usize,
        steps: &[Step],
    ) -> Result<String> {
        let previous: Vec<String> = steps[..index]
            .iter()
            .zip(&plan.step_plans)
            .map(|(s, p)| {
                format!(
                    "Step {}: {}",
                    s.step_id,
                    abbreviate(&p.animation_description, PREVIOUS_STEP_CHARS)
                )
            })
            .collect();
        let prompt = StepCodePrompt::build(
            step,
            &plan.step_plans[index].animation_description,
            &plan.css_summary(),
            !plan.shared_svg.trim().is_empty(),
            &previous,
        );
        let code: StepCode = self
            .text
            .invoke_structured("step animation", &prompt, None)
            .await?;
        Ok(code.animate_body)
    }
}

/// Build the fragment: shared style, the container with the base figure,
/// and the `window.stepAnimations` registry with one pending duration per
/// step.
pub fn assemble_fragment(plan: &AnimationPlan, bodies: &[String]) -> String {
    let mut out = String::new();

    if !plan.shared_css.trim().is_empty() {
        out.push_str("<style>\n");
        out.push_str(plan.shared_css.trim());
        out.push_str("\n</style>\n");
    }

    out.push_str(
        "<div id=\"animation-container\" style=\"width:800px;height:600px;background:#f6f8fa;position:relative;overflow:hidden;margin:0 auto;\">\n",
    );
    if !plan.shared_svg.trim().is_empty() {
        out.push_str(plan.shared_svg.trim());
        out.push('\n');
    }
    out.push_str("</div>\n");

    let entries: Vec<String> = bodies
        .iter()
        .map(|body| {
            format!(
                "  {{\n    duration: {},\n    animate: function(container) {{\n      {}\n    }}\n  }}",
                HTML_PLACEHOLDER,
                strip_code_fences(body)
            )
        })
        .collect();

    out.push_str("<script>\nwindow.stepAnimations = [\n");
    out.push_str(&entries.join(",\n"));
    out.push_str("\n];\n</script>");
    out
}

#[async_trait]
impl ScriptGenerator for HtmlScriptGenerator {
    async fn generate(
        &self,
        steps: &[Step],
        image: Option<&ImagePayload>,
    ) -> Result<ScriptArtifact> {
        require_usable_steps(steps)?;

        tracing::info!(steps = steps.len(), image = image.is_some(), "Planning HTML animation");
        let plan = self.plan(steps, image).await?;

        let mut bodies = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            tracing::debug!(step = index + 1, of = steps.len(), "Generating step animation");
            let body = self.step_body(step, &plan, index, steps).await?;
            bodies.push(body);
        }

        let fragment = assemble_fragment(&plan, &bodies);
        let prompts = plan.step_plans.iter().map(|p| p.image_prompt.clone()).collect();
        let artifact = ScriptArtifact::new(ArtifactKind::HtmlAnimation, fragment, prompts, steps.len());

        let missing = artifact.missing_markers("");
        if !missing.is_empty() {
            return Err(PipelineError::MalformedOutput(format!(
                "animation fragment is missing {}",
                missing.join(", ")
            )));
        }

        tracing::info!(bytes = artifact.body.len(), "HTML animation assembled");
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::steps;
    use mathcast_llm::MockBackend;
    use serde_json::json;
    use std::sync::Arc;

    fn plan_reply(plans: usize) -> String {
        let step_plans: Vec<_> = (1..=plans)
            .map(|i| json!({"step_id": i, "animation_description": format!("plan {i}"), "image_prompt": format!("img {i}")}))
            .collect();
        json!({"shared_css": ".formula { color: red; }", "shared_svg": "<svg id=\"base\"></svg>", "step_plans": step_plans})
            .to_string()
    }

    fn body_reply(code: &str) -> String {
        json!({ "animate_body": code }).to_string()
    }

    #[test]
    fn test_assemble_fragment() {
        let plan = AnimationPlan {
            shared_css: ".a{}".to_string(),
            shared_svg: String::new(),
            step_plans: vec![],
        };
        let html = assemble_fragment(
            &plan,
            &["container.innerHTML = 'x';".to_string(), "```js\nfoo();\n```".to_string()],
        );

        assert!(html.starts_with("<style>\n.a{}\n</style>"));
        assert!(html.contains("id=\"animation-container\""));
        assert!(html.contains("window.stepAnimations = ["));
        assert_eq!(html.matches("duration: STEP_PLACEHOLDER").count(), 2);
        assert!(html.contains("      foo();\n"));
        assert!(!html.contains("```"));
        assert_eq!(html.matches("<script>").count(), html.matches("</script>").count());
    }

    #[tokio::test]
    async fn test_two_phase_generation() {
        let mock = Arc::new(MockBackend::from_texts([
            plan_reply(2),
            body_reply("container.innerHTML += '<p>x²</p>';"),
            body_reply("container.querySelector('#base').style.stroke = 'red';"),
        ]));
        let generator = HtmlScriptGenerator::new(ModelClient::new(mock.clone(), "m"));

        let artifact = generator.generate(&steps(2), None).await.unwrap();

        assert_eq!(artifact.kind, ArtifactKind::HtmlAnimation);
        assert_eq!(artifact.duration_slots, 2);
        assert_eq!(artifact.image_prompts, vec!["img 1", "img 2"]);
        assert!(artifact.body.contains("<svg id=\"base\"></svg>"));
        assert!(artifact.body.contains("x²"));

        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        let second_step_prompt = requests[2].messages[0].text();
        assert!(second_step_prompt.contains("Step 1: plan 1"));
        assert!(second_step_prompt.contains("SVG base figure is already"));
    }

    #[tokio::test]
    async fn test_short_plan_is_padded() {
        let mock = Arc::new(MockBackend::from_texts([
            plan_reply(1),
            body_reply("a();"),
            body_reply("b();"),
            body_reply("c();"),
        ]));
        let generator = HtmlScriptGenerator::new(ModelClient::new(mock.clone(), "m"));

        let artifact = generator.generate(&steps(3), None).await.unwrap();

        assert_eq!(artifact.image_prompts, vec!["img 1", "", ""]);
        assert_eq!(artifact.duration_slots, 3);
        let third_prompt = mock.requests()[3].messages[0].text();
        assert!(third_prompt.contains("Show the content of step 3: step 3"));
    }

    #[tokio::test]
    async fn test_long_plan_is_truncated() {
        let mock = Arc::new(MockBackend::from_texts([plan_reply(4), body_reply("a();")]));
        let generator = HtmlScriptGenerator::new(ModelClient::new(mock, "m"));

        let artifact = generator.generate(&steps(1), None).await.unwrap();
        assert_eq!(artifact.image_prompts, vec!["img 1"]);
    }

    #[tokio::test]
    async fn test_plan_uses_vision_with_image() {
        let text = Arc::new(MockBackend::from_texts([body_reply("a();")]));
        let vision = Arc::new(MockBackend::from_texts([plan_reply(1)]));
        let generator = HtmlScriptGenerator::new(ModelClient::new(text.clone(), "text"))
            .with_vision(ModelClient::new(vision.clone(), "vision"));
        let image = ImagePayload::new(vec![9], "image/png");

        generator.generate(&steps(1), Some(&image)).await.unwrap();

        assert!(vision.requests()[0].messages[0].has_image());
        assert!(!text.requests()[0].messages[0].has_image());
    }

    #[tokio::test]
    async fn test_step_failure_propagates() {
        let mock = Arc::new(MockBackend::from_texts([plan_reply(2), body_reply("a();")]).then_fail("overloaded"));
        let generator = HtmlScriptGenerator::new(ModelClient::new(mock, "m"));

        let err = generator.generate(&steps(2), None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Llm(_)));
    }
}
