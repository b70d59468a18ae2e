//! Model-driven repair of failing artifacts.

use async_trait::async_trait;

use mathcast_pipeline::{ArtifactKind, Repairer, Result};

use crate::client::ModelClient;
use crate::prompts::RepairPrompt;
use crate::scene::DEFAULT_SCENE_CLASS;

/// Sends the failing candidate and the latest error back to the model and
/// returns its plain-text answer. Fence stripping is left to the heal loop.
#[derive(Debug, Clone)]
pub struct LlmRepairer {
    client: ModelClient,
    kind: ArtifactKind,
    scene_class: String,
}

impl LlmRepairer {
    pub fn new(client: ModelClient, kind: ArtifactKind) -> Self {
        Self {
            client,
            kind,
            scene_class: DEFAULT_SCENE_CLASS.to_string(),
        }
    }

    pub fn with_scene_class(mut self, scene_class: impl Into<String>) -> Self {
        self.scene_class = scene_class.into();
        self
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }
}

#[async_trait]
impl Repairer for LlmRepairer {
    async fn repair(&self, candidate: &str, error: &str) -> Result<String> {
        tracing::debug!(kind = ?self.kind, error_len = error.len(), "Requesting repair");
        let prompt = RepairPrompt::build(self.kind, candidate, error, &self.scene_class);
        self.client.invoke_plain(&prompt).await
    }
}
