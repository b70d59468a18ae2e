//! Manim scene renderer.
//!
//! Each candidate is written to `scene.py` in a scratch directory and
//! rendered there; the `<SceneClass>.mp4` the renderer leaves under `media/`
//! is copied to the output path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use walkdir::WalkDir;

use mathcast_pipeline::{
    ArtifactKind, ArtifactRenderer, DurationList, ExecuteFailure, HealTarget, PipelineError,
    Repairer, Result, ScriptArtifact, SelfHealEngine, inject_durations,
};

use crate::process::ProcessRunner;

const SCENE_FILE: &str = "scene.py";
const PARTIAL_MOVIE_DIR: &str = "partial_movie_files";

/// Structural problems in scene code.
pub fn validate_scene(code: &str, scene_class: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if !code.contains(&format!("class {}", scene_class)) {
        errors.push(format!("missing the `{}` scene class", scene_class));
    }
    if !code.contains("def construct") {
        errors.push("missing the `construct` method".to_string());
    }
    errors
}

/// The finished `{scene_class}.mp4` under `dir`. Per-animation clips in
/// `partial_movie_files` are never returned.
fn find_video(dir: &Path, scene_class: &str) -> Option<PathBuf> {
    let file_name = format!("{}.mp4", scene_class);
    let mut videos: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.file_name() != PARTIAL_MOVIE_DIR)
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name().to_str() == Some(file_name.as_str()))
        .map(|e| e.into_path())
        .collect();
    videos.sort();
    videos.into_iter().next()
}

struct SceneTarget<'a> {
    renderer: &'a SceneRenderer,
    durations: &'a DurationList,
    output: &'a Path,
}

impl SceneTarget<'_> {
    async fn render_once(&self, code: &str) -> Result<()> {
        let scratch = tempfile::Builder::new().prefix("mathcast-scene").tempdir()?;
        let scene_path = scratch.path().join(SCENE_FILE);
        tokio::fs::write(&scene_path, code).await?;

        let args = [
            SCENE_FILE,
            self.renderer.scene_class.as_str(),
            self.renderer.quality_flag.as_str(),
        ];
        self.renderer.runner.run(args, Some(scratch.path())).await?;

        let video = find_video(&scratch.path().join("media"), &self.renderer.scene_class)
            .ok_or_else(|| {
                PipelineError::tool_failure(
                    self.renderer.runner.tool_name(),
                    format!(
                        "render finished but produced no {}.mp4 file",
                        self.renderer.scene_class
                    ),
                )
            })?;
        if let Some(parent) = self.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&video, self.output).await?;
        Ok(())
    }
}

#[async_trait]
impl HealTarget for SceneTarget<'_> {
    fn validate(&self, candidate: &str) -> Vec<String> {
        validate_scene(candidate, &self.renderer.scene_class)
    }

    async fn execute(&self, candidate: &str) -> std::result::Result<(), ExecuteFailure> {
        let code = inject_durations(
            ArtifactKind::SceneCode,
            candidate,
            self.durations.as_slice(),
            self.renderer.default_seconds,
        );
        self.render_once(&code).await.map_err(ExecuteFailure::from)
    }
}

/// Renders scene code to video, repairing it on validation or render
/// failures.
pub struct SceneRenderer {
    runner: ProcessRunner,
    engine: SelfHealEngine,
    repairer: Arc<dyn Repairer>,
    scene_class: String,
    quality_flag: String,
    default_seconds: f64,
}

impl SceneRenderer {
    pub fn new(runner: ProcessRunner, engine: SelfHealEngine, repairer: Arc<dyn Repairer>) -> Self {
        Self {
            runner,
            engine,
            repairer,
            scene_class: "SolutionScene".to_string(),
            quality_flag: "-ql".to_string(),
            default_seconds: 2.0,
        }
    }

    pub fn with_scene_class(mut self, scene_class: impl Into<String>) -> Self {
        self.scene_class = scene_class.into();
        self
    }

    pub fn with_quality_flag(mut self, flag: impl Into<String>) -> Self {
        self.quality_flag = flag.into();
        self
    }

    pub fn with_default_seconds(mut self, seconds: f64) -> Self {
        self.default_seconds = seconds;
        self
    }
}

#[async_trait]
impl ArtifactRenderer for SceneRenderer {
    async fn render(
        &self,
        artifact: &ScriptArtifact,
        durations: &DurationList,
        _audio_dir: &Path,
        output: &Path,
    ) -> Result<()> {
        if artifact.kind != ArtifactKind::SceneCode {
            return Err(PipelineError::InvalidInput(format!(
                "scene renderer cannot render {:?}",
                artifact.kind
            )));
        }
        let target = SceneTarget {
            renderer: self,
            durations,
            output,
        };
        let outcome = self
            .engine
            .run(&artifact.body, &target, self.repairer.as_ref())
            .await?;
        tracing::info!(
            attempts = outcome.attempts,
            output = %output.display(),
            "Scene rendered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    const SCENE: &str = "class SolutionScene(Scene):\n    def construct(self):\n        self.wait()\n        self.wait()\n";

    struct CannedRepairer {
        replies: Mutex<Vec<String>>,
        errors: Mutex<Vec<String>>,
    }

    impl CannedRepairer {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                errors: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Repairer for CannedRepairer {
        async fn repair(&self, _candidate: &str, error: &str) -> Result<String> {
            self.errors.lock().unwrap().push(error.to_string());
            Ok(self.replies.lock().unwrap().remove(0))
        }
    }

    /// A stand-in renderer: fails on code containing "broken", otherwise
    /// copies the scene file to where the real tool leaves its video.
    #[cfg(unix)]
    fn fake_manim(dir: &Path) -> ProcessRunner {
        let script = dir.join("fake_manim.sh");
        std::fs::write(
            &script,
            "if grep -q broken \"$1\"; then echo \"NameError: broken\" >&2; exit 1; fi\n\
             mkdir -p media/videos/scene/480p15\n\
             cp \"$1\" media/videos/scene/480p15/SolutionScene.mp4\n",
        )
        .unwrap();
        ProcessRunner::new(&format!("sh {}", script.display()), Duration::from_secs(10))
    }

    fn artifact(body: &str) -> ScriptArtifact {
        ScriptArtifact::new(ArtifactKind::SceneCode, body, vec![], 2)
    }

    #[test]
    fn test_validate_scene() {
        assert!(validate_scene(SCENE, "SolutionScene").is_empty());
        assert_eq!(validate_scene("print(1)", "SolutionScene").len(), 2);
        assert_eq!(validate_scene(SCENE, "Other").len(), 1);
    }

    #[test]
    fn test_find_video() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("videos/scene/720p30");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("SolutionScene.mp4"), b"v").unwrap();
        std::fs::write(nested.join("partial.txt"), b"x").unwrap();

        assert_eq!(
            find_video(dir.path(), "SolutionScene"),
            Some(nested.join("SolutionScene.mp4"))
        );
        assert_eq!(find_video(dir.path(), "OtherScene"), None);
        assert_eq!(find_video(&dir.path().join("absent"), "SolutionScene"), None);
    }

    #[test]
    fn test_find_video_skips_partial_clips() {
        let dir = TempDir::new().unwrap();
        let quality = dir.path().join("videos/scene/480p15");
        let partials = quality.join("partial_movie_files/ZetaScene");
        std::fs::create_dir_all(&partials).unwrap();
        std::fs::write(partials.join("ZetaScene.mp4"), b"clip").unwrap();
        std::fs::write(partials.join("0001.mp4"), b"clip").unwrap();

        assert_eq!(find_video(dir.path(), "ZetaScene"), None);

        std::fs::write(quality.join("ZetaScene.mp4"), b"full").unwrap();
        assert_eq!(find_video(dir.path(), "ZetaScene"), Some(quality.join("ZetaScene.mp4")));
    }

    #[tokio::test]
    async fn test_missing_renderer_is_environment() {
        let dir = TempDir::new().unwrap();
        let repairer = CannedRepairer::new(&[]);
        let renderer = SceneRenderer::new(
            ProcessRunner::new("mathcast-no-such-manim", Duration::from_secs(5)),
            SelfHealEngine::new(3),
            repairer.clone(),
        );

        let err = renderer
            .render(&artifact(SCENE), &DurationList::default(), dir.path(), &dir.path().join("scene.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::EnvironmentUnavailable(_)));
        assert!(repairer.errors.lock().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_render_injects_durations() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("run/scene.mp4");
        let renderer = SceneRenderer::new(fake_manim(dir.path()), SelfHealEngine::new(3), CannedRepairer::new(&[]));

        renderer
            .render(&artifact(SCENE), &DurationList::new(vec![4.5]), dir.path(), &output)
            .await
            .unwrap();

        let rendered = std::fs::read_to_string(&output).unwrap();
        assert!(rendered.contains("self.wait(4.5)\n        self.wait(2.0)"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_render_failure_is_repaired() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("scene.mp4");
        let broken = format!("{}        broken()\n", SCENE);
        let repairer = CannedRepairer::new(&[SCENE]);
        let renderer = SceneRenderer::new(fake_manim(dir.path()), SelfHealEngine::new(3), repairer.clone())
            .with_default_seconds(1.0);

        renderer
            .render(&artifact(&broken), &DurationList::new(vec![3.0, 5.0]), dir.path(), &output)
            .await
            .unwrap();

        let errors = repairer.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("NameError: broken"));
        let rendered = std::fs::read_to_string(&output).unwrap();
        assert!(rendered.contains("self.wait(3.0)"));
        assert!(rendered.contains("self.wait(5.0)"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_render_failures_exhaust() {
        let dir = TempDir::new().unwrap();
        let broken = format!("{}        broken()\n", SCENE);
        let repairer = CannedRepairer::new(&[&broken]);
        let renderer = SceneRenderer::new(fake_manim(dir.path()), SelfHealEngine::new(2), repairer.clone());

        let err = renderer
            .render(&artifact(&broken), &DurationList::default(), dir.path(), &dir.path().join("scene.mp4"))
            .await
            .unwrap_err();

        match err {
            PipelineError::SelfHealExhausted { attempts, last_error } => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("NameError"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(repairer.errors.lock().unwrap().len(), 1);
    }
}
