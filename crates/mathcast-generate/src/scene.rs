//! Manim scene code generation for the video variant.

use async_trait::async_trait;
use serde::Deserialize;

use mathcast_pipeline::{
    ArtifactKind, ImagePayload, PipelineError, Result, ScriptArtifact, ScriptGenerator, Step,
};

use crate::client::ModelClient;
use crate::prompts::{ScenePrompt, steps_json};
use crate::require_usable_steps;

pub const DEFAULT_SCENE_CLASS: &str = "SolutionScene";

#[derive(Debug, Deserialize)]
struct SceneOutput {
    scene_code: String,
    #[serde(default)]
    image_prompts: Vec<String>,
}

/// Generates one scene script in a single structured call.
#[derive(Debug, Clone)]
pub struct SceneScriptGenerator {
    client: ModelClient,
    scene_class: String,
    style: Option<String>,
}

impl SceneScriptGenerator {
    pub fn new(client: ModelClient) -> Self {
        Self {
            client,
            scene_class: DEFAULT_SCENE_CLASS.to_string(),
            style: None,
        }
    }

    pub fn with_scene_class(mut self, scene_class: impl Into<String>) -> Self {
        self.scene_class = scene_class.into();
        self
    }

    pub fn with_style(mut self, style: Option<String>) -> Self {
        self.style = style;
        self
    }
}

#[async_trait]
impl ScriptGenerator for SceneScriptGenerator {
    async fn generate(
        &self,
        steps: &[Step],
        _image: Option<&ImagePayload>,
    ) -> Result<ScriptArtifact> {
        require_usable_steps(steps)?;

        let prompt = ScenePrompt::build(&steps_json(steps)?, &self.scene_class, self.style.as_deref());
        let output: SceneOutput = self
            .client
            .invoke_structured("scene script", &prompt, None)
            .await?;

        let artifact = ScriptArtifact::new(
            ArtifactKind::SceneCode,
            &output.scene_code,
            output.image_prompts,
            steps.len(),
        );
        let missing = artifact.missing_markers(&self.scene_class);
        if !missing.is_empty() {
            return Err(PipelineError::MalformedOutput(format!(
                "scene code is missing {}",
                missing.join(", ")
            )));
        }

        tracing::info!(
            bytes = artifact.body.len(),
            slots = artifact.duration_slots,
            "Scene script generated"
        );
        Ok(artifact)
    }
}
