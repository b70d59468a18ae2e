//! Pipeline runs and their working-directory layout.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checkpoint::CHECKPOINT_DIR;
use crate::error::{PipelineError, Result};
use crate::model::{ImagePayload, PipelineVariant};
use crate::stage::StageId;

const RUN_FILE: &str = "run.json";
const SOURCE_IMAGE_FILE: &str = "source_image";
const AUDIO_EXTENSION: &str = "mp3";

/// On-disk record of a run's inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunRecord {
    run_id: String,
    problem_text: String,
    variant: PipelineVariant,
    #[serde(default)]
    image_mime_type: Option<String>,
    created_at: DateTime<Utc>,
}

/// One end-to-end execution and the directory that owns its files.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub id: String,
    pub work_dir: PathBuf,
    pub problem_text: String,
    pub image: Option<ImagePayload>,
    pub variant: PipelineVariant,
    pub created_at: DateTime<Utc>,
}

impl PipelineRun {
    /// An in-memory run rooted at `work_dir`. Nothing is written.
    pub fn new(
        id: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        problem_text: impl Into<String>,
        image: Option<ImagePayload>,
        variant: PipelineVariant,
    ) -> Self {
        Self {
            id: id.into(),
            work_dir: work_dir.into(),
            problem_text: problem_text.into(),
            image,
            variant,
            created_at: Utc::now(),
        }
    }

    /// Create `<output_root>/<run_id>` and record the run's inputs there.
    ///
    /// A fresh UUID is used when `run_id` is `None`. Re-creating an existing
    /// run with the same inputs keeps its checkpoint; when the problem text,
    /// image or variant changed, the previous checkpoint, narration and
    /// outputs are discarded.
    pub fn create(
        output_root: &Path,
        run_id: Option<String>,
        problem_text: impl Into<String>,
        image: Option<ImagePayload>,
        variant: PipelineVariant,
    ) -> Result<Self> {
        let id = match run_id {
            Some(id) => {
                validate_run_id(&id)?;
                id
            }
            None => uuid::Uuid::new_v4().to_string(),
        };
        let run = Self::new(id.clone(), output_root.join(&id), problem_text, image, variant);
        if run.replaces_other_inputs(output_root) {
            tracing::warn!(run_id = %run.id, "Run inputs changed, discarding previous progress");
            run.discard_progress()?;
        }
        run.persist()?;
        tracing::info!(run_id = %run.id, dir = %run.work_dir.display(), variant = %variant, "Run created");
        Ok(run)
    }

    /// Reopen a run previously written by [`PipelineRun::create`].
    pub fn open(output_root: &Path, run_id: &str) -> Result<Self> {
        validate_run_id(run_id)?;
        let work_dir = output_root.join(run_id);
        let record_path = work_dir.join(RUN_FILE);
        if !record_path.is_file() {
            return Err(PipelineError::FileNotFound(record_path));
        }
        let record: RunRecord = serde_json::from_slice(&fs::read(&record_path)?)?;

        let image = match record.image_mime_type {
            Some(mime_type) => {
                let image_path = work_dir.join(SOURCE_IMAGE_FILE);
                let bytes = fs::read(&image_path).map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => PipelineError::FileNotFound(image_path.clone()),
                    _ => PipelineError::Io(e),
                })?;
                Some(ImagePayload::new(bytes, mime_type))
            }
            None => None,
        };

        Ok(Self {
            id: record.run_id,
            work_dir,
            problem_text: record.problem_text,
            image,
            variant: record.variant,
            created_at: record.created_at,
        })
    }

    /// Delete a run's working directory. Returns whether anything existed.
    pub fn purge(output_root: &Path, run_id: &str) -> Result<bool> {
        validate_run_id(run_id)?;
        let work_dir = output_root.join(run_id);
        match fs::remove_dir_all(&work_dir) {
            Ok(()) => {
                tracing::info!(run_id = %run_id, "Run purged");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the run directory already records different inputs. An
    /// unreadable record counts as different.
    fn replaces_other_inputs(&self, output_root: &Path) -> bool {
        match Self::open(output_root, &self.id) {
            Ok(previous) => {
                previous.problem_text != self.problem_text
                    || previous.image != self.image
                    || previous.variant != self.variant
            }
            Err(PipelineError::FileNotFound(_)) if !self.work_dir.join(RUN_FILE).exists() => false,
            Err(_) => true,
        }
    }

    fn discard_progress(&self) -> Result<()> {
        let layout = self.layout();
        remove_dir_if_exists(&layout.checkpoint_dir())?;
        remove_dir_if_exists(&layout.audio_dir())?;
        for output in [
            layout.animation_html(),
            layout.scene_video(),
            layout.full_audio(),
            layout.final_video(),
        ] {
            match fs::remove_file(&output) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        fs::create_dir_all(&self.work_dir)?;
        let record = RunRecord {
            run_id: self.id.clone(),
            problem_text: self.problem_text.clone(),
            variant: self.variant,
            image_mime_type: self.image.as_ref().map(|i| i.mime_type.clone()),
            created_at: self.created_at,
        };
        if let Some(ref image) = self.image {
            fs::write(self.work_dir.join(SOURCE_IMAGE_FILE), &image.bytes)?;
        }
        fs::write(
            self.work_dir.join(RUN_FILE),
            serde_json::to_vec_pretty(&record)?,
        )?;
        Ok(())
    }

    pub fn layout(&self) -> RunLayout {
        RunLayout::new(&self.work_dir)
    }
}

/// Run ids become directory names, so they must be a single plain segment.
fn validate_run_id(id: &str) -> Result<()> {
    let ok = !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(PipelineError::InvalidInput(format!(
            "run id '{}' must be a plain name of letters, digits, '-', '_' or '.'",
            id
        )))
    }
}

/// Well-known paths inside a run's working directory.
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.root.join(CHECKPOINT_DIR)
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("audio")
    }

    pub fn animation_html(&self) -> PathBuf {
        self.root.join("animation.html")
    }

    pub fn scene_video(&self) -> PathBuf {
        self.root.join("scene.mp4")
    }

    pub fn full_audio(&self) -> PathBuf {
        self.root.join("full_audio.mp3")
    }

    pub fn final_video(&self) -> PathBuf {
        self.root.join("final.mp4")
    }

    /// File a stage leaves on disk, for stages whose result is a file.
    pub fn stage_output(&self, stage: StageId, variant: PipelineVariant) -> Option<PathBuf> {
        match (stage, variant) {
            (StageId::Render, PipelineVariant::Html) => Some(self.animation_html()),
            (StageId::Render, PipelineVariant::Video) => Some(self.scene_video()),
            (StageId::ConcatAudio, _) => Some(self.full_audio()),
            (StageId::Compose, _) => Some(self.final_video()),
            _ => None,
        }
    }

    /// The file a completed run returns.
    pub fn final_artifact(&self, variant: PipelineVariant) -> PathBuf {
        match variant {
            PipelineVariant::Html => self.animation_html(),
            PipelineVariant::Video => self.final_video(),
        }
    }

    /// Narration file for 1-based step `number`.
    pub fn audio_file(&self, prefix: &str, number: usize) -> PathBuf {
        self.audio_dir().join(audio_file_name(prefix, number))
    }
}

/// `{prefix}_{number}.mp3`
pub fn audio_file_name(prefix: &str, number: usize) -> String {
    format!("{}_{}.{}", prefix, number, AUDIO_EXTENSION)
}

/// Remove `dir` and its contents; a missing directory is fine.
pub(crate) fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Narration files for steps `1..=step_count` that exist in `dir`, in step
/// order. Steps without a file are skipped.
pub fn step_audio_files(dir: &Path, prefix: &str, step_count: usize) -> Vec<PathBuf> {
    (1..=step_count)
        .map(|number| dir.join(audio_file_name(prefix, number)))
        .filter(|path| path.is_file())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_open() {
        let root = TempDir::new().unwrap();
        let image = ImagePayload::new(vec![1, 2, 3], "image/png");
        let run = PipelineRun::create(
            root.path(),
            Some("run-1".to_string()),
            "Solve 2x + 3 = 9",
            Some(image.clone()),
            PipelineVariant::Video,
        )
        .unwrap();
        assert!(run.work_dir.join(RUN_FILE).is_file());

        let reopened = PipelineRun::open(root.path(), "run-1").unwrap();
        assert_eq!(reopened.id, "run-1");
        assert_eq!(reopened.problem_text, "Solve 2x + 3 = 9");
        assert_eq!(reopened.variant, PipelineVariant::Video);
        assert_eq!(reopened.image, Some(image));
    }

    fn seed_progress(run: &PipelineRun) {
        let layout = run.layout();
        fs::create_dir_all(layout.checkpoint_dir()).unwrap();
        fs::write(layout.checkpoint_dir().join("manifest.json"), b"{}").unwrap();
        fs::create_dir_all(layout.audio_dir()).unwrap();
        fs::write(layout.audio_file("step", 1), b"mp3").unwrap();
        fs::write(layout.animation_html(), b"<html></html>").unwrap();
    }

    #[test]
    fn test_recreate_with_same_inputs_keeps_progress() {
        let root = TempDir::new().unwrap();
        let id = Some("same".to_string());
        let run = PipelineRun::create(
            root.path(),
            id.clone(),
            "x + 1 = 2",
            None,
            PipelineVariant::Html,
        )
        .unwrap();
        seed_progress(&run);

        PipelineRun::create(
            root.path(),
            id,
            "x + 1 = 2",
            None,
            PipelineVariant::Html,
        )
        .unwrap();

        assert!(run.layout().checkpoint_dir().join("manifest.json").is_file());
        assert!(run.layout().audio_file("step", 1).is_file());
        assert!(run.layout().animation_html().is_file());
    }

    #[test]
    fn test_recreate_with_new_inputs_discards_progress() {
        let root = TempDir::new().unwrap();
        let id = Some("changed".to_string());
        let run = PipelineRun::create(
            root.path(),
            id.clone(),
            "x + 1 = 2",
            None,
            PipelineVariant::Html,
        )
        .unwrap();
        seed_progress(&run);

        let replaced = PipelineRun::create(
            root.path(),
            id.clone(),
            "y - 4 = 0",
            None,
            PipelineVariant::Html,
        )
        .unwrap();

        assert!(!run.layout().checkpoint_dir().exists());
        assert!(!run.layout().audio_dir().exists());
        assert!(!run.layout().animation_html().exists());
        let reopened = PipelineRun::open(root.path(), "changed").unwrap();
        assert_eq!(reopened.problem_text, replaced.problem_text);

        seed_progress(&run);
        let image = ImagePayload::new(vec![9], "image/jpeg");
        PipelineRun::create(
            root.path(),
            id,
            "y - 4 = 0",
            Some(image),
            PipelineVariant::Html,
        )
        .unwrap();
        assert!(!run.layout().checkpoint_dir().exists());
    }

    #[test]
    fn test_recreate_with_other_variant_discards_progress() {
        let root = TempDir::new().unwrap();
        let id = Some("variant".to_string());
        let run = PipelineRun::create(
            root.path(),
            id.clone(),
            "x = 3",
            None,
            PipelineVariant::Html,
        )
        .unwrap();
        seed_progress(&run);

        PipelineRun::create(
            root.path(),
            id,
            "x = 3",
            None,
            PipelineVariant::Video,
        )
        .unwrap();

        assert!(!run.layout().checkpoint_dir().exists());
    }

    #[test]
    fn test_generated_run_id_is_uuid() {
        let root = TempDir::new().unwrap();
        let run =
            PipelineRun::create(root.path(), None, "1+1", None, PipelineVariant::Html).unwrap();
        assert!(uuid::Uuid::parse_str(&run.id).is_ok());
        assert!(run.work_dir.starts_with(root.path()));
    }

    #[test]
    fn test_open_missing_run() {
        let root = TempDir::new().unwrap();
        let err = PipelineRun::open(root.path(), "nope").unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound(_)));
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let root = TempDir::new().unwrap();
        for bad in ["", "..", "a/b", "../escape", "a b"] {
            let err = PipelineRun::create(
                root.path(),
                Some(bad.to_string()),
                "x",
                None,
                PipelineVariant::Html,
            )
            .unwrap_err();
            assert!(matches!(err, PipelineError::InvalidInput(_)), "id {bad:?}");
        }
    }

    #[test]
    fn test_purge() {
        let root = TempDir::new().unwrap();
        PipelineRun::create(
            root.path(),
            Some("gone".to_string()),
            "x",
            None,
            PipelineVariant::Html,
        )
        .unwrap();

        assert!(PipelineRun::purge(root.path(), "gone").unwrap());
        assert!(!root.path().join("gone").exists());
        assert!(!PipelineRun::purge(root.path(), "gone").unwrap());
    }

    #[test]
    fn test_step_audio_files_follow_step_order() {
        let dir = TempDir::new().unwrap();
        for name in ["step_10.mp3", "step_2.mp3", "step_1.mp3", "other_3.mp3", "step_x.mp3"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let files = step_audio_files(dir.path(), "step", 10);
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["step_1.mp3", "step_2.mp3", "step_10.mp3"]);
    }

    #[test]
    fn test_step_audio_files_ignore_higher_steps() {
        let dir = TempDir::new().unwrap();
        for name in ["step_1.mp3", "step_2.mp3", "step_3.mp3"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let files = step_audio_files(dir.path(), "step", 1);
        assert_eq!(files, vec![dir.path().join("step_1.mp3")]);
    }

    #[test]
    fn test_step_audio_files_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(step_audio_files(&dir.path().join("absent"), "step", 3).is_empty());
    }

    #[test]
    fn test_layout_outputs() {
        let layout = RunLayout::new(Path::new("/runs/a"));
        assert_eq!(
            layout.final_artifact(PipelineVariant::Html),
            Path::new("/runs/a/animation.html")
        );
        assert_eq!(
            layout.stage_output(StageId::Render, PipelineVariant::Video),
            Some(PathBuf::from("/runs/a/scene.mp4"))
        );
        assert_eq!(layout.stage_output(StageId::Narrate, PipelineVariant::Video), None);
        assert_eq!(
            layout.audio_file("step", 3),
            Path::new("/runs/a/audio/step_3.mp3")
        );
    }
}
