//! HTML animation renderer.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use mathcast_pipeline::{
    ArtifactKind, ArtifactRenderer, DurationList, ExecuteFailure, HealTarget, PipelineError,
    Repairer, Result, ScriptArtifact, SelfHealEngine, inject_durations,
};

use crate::page::assemble_html_page;

/// Structural problems in an animation fragment.
pub fn validate_fragment(fragment: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if !fragment.contains("stepAnimations") {
        errors.push("missing the window.stepAnimations array".to_string());
    }
    if !fragment.contains("animation-container") {
        errors.push("missing the element with id 'animation-container'".to_string());
    }
    for tag in ["script", "style"] {
        let opened = fragment.matches(&format!("<{}", tag)).count();
        let closed = fragment.matches(&format!("</{}", tag)).count();
        if opened != closed {
            errors.push(format!(
                "<{}> tags are not balanced ({} opened, {} closed)",
                tag, opened, closed
            ));
        }
    }
    errors
}

struct HtmlTarget<'a> {
    durations: &'a DurationList,
    default_seconds: f64,
    audio_dir: &'a Path,
    audio_prefix: &'a str,
    output: &'a Path,
}

#[async_trait]
impl HealTarget for HtmlTarget<'_> {
    fn validate(&self, candidate: &str) -> Vec<String> {
        validate_fragment(candidate)
    }

    async fn execute(&self, candidate: &str) -> std::result::Result<(), ExecuteFailure> {
        let fragment = inject_durations(
            ArtifactKind::HtmlAnimation,
            candidate,
            self.durations.as_slice(),
            self.default_seconds,
        );
        let page = assemble_html_page(
            &fragment,
            self.audio_dir,
            self.audio_prefix,
            self.durations.len(),
        )?;
        if let Some(parent) = self.output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(PipelineError::from)?;
        }
        tokio::fs::write(self.output, page)
            .await
            .map_err(PipelineError::from)?;
        Ok(())
    }
}

/// Writes the self-contained HTML page, repairing the fragment when it
/// fails validation.
pub struct HtmlRenderer {
    engine: SelfHealEngine,
    repairer: Arc<dyn Repairer>,
    audio_prefix: String,
    default_seconds: f64,
}

impl HtmlRenderer {
    pub fn new(engine: SelfHealEngine, repairer: Arc<dyn Repairer>) -> Self {
        Self {
            engine,
            repairer,
            audio_prefix: "step".to_string(),
            default_seconds: 2.0,
        }
    }

    pub fn with_audio_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.audio_prefix = prefix.into();
        self
    }

    pub fn with_default_seconds(mut self, seconds: f64) -> Self {
        self.default_seconds = seconds;
        self
    }
}

#[async_trait]
impl ArtifactRenderer for HtmlRenderer {
    async fn render(
        &self,
        artifact: &ScriptArtifact,
        durations: &DurationList,
        audio_dir: &Path,
        output: &Path,
    ) -> Result<()> {
        if artifact.kind != ArtifactKind::HtmlAnimation {
            return Err(PipelineError::InvalidInput(format!(
                "HTML renderer cannot render {:?}",
                artifact.kind
            )));
        }
        let target = HtmlTarget {
            durations,
            default_seconds: self.default_seconds,
            audio_dir,
            audio_prefix: &self.audio_prefix,
            output,
        };
        let outcome = self
            .engine
            .run(&artifact.body, &target, self.repairer.as_ref())
            .await?;
        tracing::info!(
            attempts = outcome.attempts,
            output = %output.display(),
            "HTML animation written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const GOOD: &str = "<div id=\"animation-container\"></div>\n<script>\nwindow.stepAnimations = [{duration: STEP_PLACEHOLDER}, {duration: 'STEP_PLACEHOLDER'}];\n</script>";

    /// Returns canned replies in order and records what it was asked.
    struct CannedRepairer {
        replies: Mutex<Vec<String>>,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl CannedRepairer {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Repairer for CannedRepairer {
        async fn repair(&self, candidate: &str, error: &str) -> Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push((candidate.to_string(), error.to_string()));
            Ok(self.replies.lock().unwrap().remove(0))
        }
    }

    fn artifact(body: &str) -> ScriptArtifact {
        ScriptArtifact::new(ArtifactKind::HtmlAnimation, body, vec![], 2)
    }

    #[test]
    fn test_validate_fragment() {
        assert!(validate_fragment(GOOD).is_empty());

        let errors = validate_fragment("<style>.a{}<script>x</script>");
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("stepAnimations")));
        assert!(errors.iter().any(|e| e.contains("animation-container")));
        assert!(errors.iter().any(|e| e.contains("<style>")));
    }

    #[tokio::test]
    async fn test_renders_page_with_injected_durations() {
        let dir = TempDir::new().unwrap();
        let audio = dir.path().join("audio");
        std::fs::create_dir_all(&audio).unwrap();
        std::fs::write(audio.join("step_1.mp3"), b"abc").unwrap();
        let output = dir.path().join("out/animation.html");
        let repairer = CannedRepairer::new(&[]);

        HtmlRenderer::new(SelfHealEngine::new(3), repairer.clone())
            .render(&artifact(GOOD), &DurationList::new(vec![4.5]), &audio, &output)
            .await
            .unwrap();

        let page = std::fs::read_to_string(&output).unwrap();
        assert!(page.contains("{duration: 4.5}, {duration: 2.0}"));
        assert!(!page.contains("STEP_PLACEHOLDER"));
        assert!(page.contains("audio-step-0"));
        assert!(repairer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_fragment_is_repaired_and_reinjected() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("animation.html");
        let broken = "<div id=\"animation-container\"></div><script>var x = 1;";
        let repairer = CannedRepairer::new(&[&format!("```html\n{}\n```", GOOD)]);

        HtmlRenderer::new(SelfHealEngine::new(3), repairer.clone())
            .with_default_seconds(1.0)
            .render(&artifact(broken), &DurationList::new(vec![3.0]), dir.path(), &output)
            .await
            .unwrap();

        let seen = repairer.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, broken);
        assert!(seen[0].1.contains("stepAnimations"));

        let page = std::fs::read_to_string(&output).unwrap();
        assert!(page.contains("{duration: 3.0}, {duration: 1.0}"));
    }

    #[tokio::test]
    async fn test_exhausted_validation_still_writes_page() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("animation.html");
        let still_broken = "<div id=\"animation-container\"></div>";
        let repairer = CannedRepairer::new(&[still_broken]);

        HtmlRenderer::new(SelfHealEngine::new(2), repairer.clone())
            .render(&artifact(still_broken), &DurationList::default(), dir.path(), &output)
            .await
            .unwrap();

        assert_eq!(repairer.seen.lock().unwrap().len(), 1);
        assert!(output.is_file());
    }

    #[tokio::test]
    async fn test_rejects_scene_code() {
        let dir = TempDir::new().unwrap();
        let scene = ScriptArtifact::new(ArtifactKind::SceneCode, "class S: pass", vec![], 1);
        let err = HtmlRenderer::new(SelfHealEngine::new(1), CannedRepairer::new(&[]))
            .render(&scene, &DurationList::default(), dir.path(), &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }
}
