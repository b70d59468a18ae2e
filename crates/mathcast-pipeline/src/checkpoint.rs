//! Durable per-run stage checkpoints.
//!
//! Layout inside a run's working directory:
//!
//! ```text
//! .checkpoint/
//!   manifest.json            {schema_version, variant, last_completed_stage, updated_at}
//!   stage_0_steps.json       Vec<Step>
//!   stage_1_script.json      ScriptArtifact
//!   stage_2_durations.json   DurationList
//! ```
//!
//! A stage counts as complete only once the manifest says so. Payloads are
//! written before the manifest, each through a temp file and rename, so an
//! interrupted save never exposes a stage whose payload is not durable.
//! Reads never fail: any damage makes the whole checkpoint read as absent.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{PipelineError, Result};
use crate::model::{DurationList, PipelineVariant, ScriptArtifact, Step, check_steps};
use crate::stage::StageId;

/// Checkpoint directory name inside a run's working directory.
pub const CHECKPOINT_DIR: &str = ".checkpoint";

const MANIFEST_FILE: &str = "manifest.json";

const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Sentinel for "no stage completed".
pub const NO_STAGE: i32 = -1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    schema_version: u32,
    variant: PipelineVariant,
    last_completed_stage: i32,
    updated_at: DateTime<Utc>,
}

/// Why a checkpoint could not be trusted. Never leaves this module.
#[derive(Debug, Error)]
enum CheckpointCorrupt {
    #[error("manifest unreadable: {0}")]
    Manifest(String),

    #[error("manifest belongs to a different run shape: {0}")]
    Mismatch(String),

    #[error("payload for stage {stage} missing at {}", path.display())]
    MissingPayload { stage: usize, path: PathBuf },

    #[error("payload for stage {stage} invalid: {reason}")]
    InvalidPayload { stage: usize, reason: String },
}

/// Output of a completed stage, as persisted.
#[derive(Debug, Clone)]
pub enum StagePayload {
    Steps(Vec<Step>),
    Script(ScriptArtifact),
    Durations(DurationList),
    /// Stages whose durable result is a file on disk.
    None,
}

impl StagePayload {
    fn matches(&self, stage: StageId) -> bool {
        matches!(
            (self, stage),
            (StagePayload::Steps(_), StageId::Analyze)
                | (StagePayload::Script(_), StageId::GenerateScript)
                | (StagePayload::Durations(_), StageId::Narrate)
                | (
                    StagePayload::None,
                    StageId::Render | StageId::ConcatAudio | StageId::Compose
                )
        )
    }
}

/// A loaded checkpoint. Payloads are present for every payload stage up to
/// `last_stage`.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub last_stage: i32,
    pub steps: Option<Vec<Step>>,
    pub script: Option<ScriptArtifact>,
    pub durations: Option<DurationList>,
}

impl Checkpoint {
    /// The "no checkpoint" value.
    pub fn empty() -> Self {
        Self {
            last_stage: NO_STAGE,
            steps: None,
            script: None,
            durations: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.last_stage == NO_STAGE
    }
}

/// Checkpoint persistence for one run's working directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    variant: PipelineVariant,
}

impl CheckpointStore {
    pub fn new(work_dir: &Path, variant: PipelineVariant) -> Self {
        Self {
            dir: work_dir.join(CHECKPOINT_DIR),
            variant,
        }
    }

    /// The checkpoint directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    fn payload_path(&self, stage: StageId) -> Option<PathBuf> {
        stage.payload_file().map(|f| self.dir.join(f))
    }

    /// Highest completed stage index, or -1. Never fails.
    pub fn last_completed_stage(&self) -> i32 {
        match self.read_manifest() {
            Ok(Some(manifest)) => manifest.last_completed_stage,
            Ok(None) => NO_STAGE,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Ignoring unreadable checkpoint manifest");
                NO_STAGE
            }
        }
    }

    /// Load the manifest and every payload it vouches for.
    ///
    /// Any missing, unreadable or invalid piece yields [`Checkpoint::empty`].
    pub fn load(&self) -> Checkpoint {
        match self.try_load() {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::warn!(
                    dir = %self.dir.display(),
                    error = %e,
                    "Checkpoint corrupt, starting from scratch"
                );
                Checkpoint::empty()
            }
        }
    }

    fn try_load(&self) -> std::result::Result<Checkpoint, CheckpointCorrupt> {
        let Some(manifest) = self.read_manifest()? else {
            return Ok(Checkpoint::empty());
        };
        let last = manifest.last_completed_stage;
        if last == NO_STAGE {
            return Ok(Checkpoint::empty());
        }

        let mut checkpoint = Checkpoint {
            last_stage: last,
            ..Checkpoint::empty()
        };

        if last >= StageId::Analyze.index() as i32 {
            let steps: Vec<Step> = self.read_payload(StageId::Analyze)?;
            check_steps(&steps).map_err(|reason| CheckpointCorrupt::InvalidPayload {
                stage: StageId::Analyze.index(),
                reason,
            })?;
            checkpoint.steps = Some(steps);
        }

        if last >= StageId::GenerateScript.index() as i32 {
            let script: ScriptArtifact = self.read_payload(StageId::GenerateScript)?;
            script
                .check_schema()
                .map_err(|reason| CheckpointCorrupt::InvalidPayload {
                    stage: StageId::GenerateScript.index(),
                    reason,
                })?;
            if script.kind != self.variant.artifact_kind() {
                return Err(CheckpointCorrupt::InvalidPayload {
                    stage: StageId::GenerateScript.index(),
                    reason: format!("artifact kind {:?} does not match variant", script.kind),
                });
            }
            checkpoint.script = Some(script);
        }

        if last >= StageId::Narrate.index() as i32 {
            let durations: DurationList = self.read_payload(StageId::Narrate)?;
            if !durations.is_valid() {
                return Err(CheckpointCorrupt::InvalidPayload {
                    stage: StageId::Narrate.index(),
                    reason: "durations must be finite and non-negative".to_string(),
                });
            }
            checkpoint.durations = Some(durations);
        }

        Ok(checkpoint)
    }

    fn read_manifest(&self) -> std::result::Result<Option<Manifest>, CheckpointCorrupt> {
        let path = self.manifest_path();
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CheckpointCorrupt::Manifest(e.to_string())),
        };
        let manifest: Manifest = serde_json::from_slice(&contents)
            .map_err(|e| CheckpointCorrupt::Manifest(e.to_string()))?;

        if manifest.schema_version != MANIFEST_SCHEMA_VERSION {
            return Err(CheckpointCorrupt::Mismatch(format!(
                "schema version {}",
                manifest.schema_version
            )));
        }
        if manifest.variant != self.variant {
            return Err(CheckpointCorrupt::Mismatch(format!(
                "variant {} (expected {})",
                manifest.variant, self.variant
            )));
        }
        let final_index = self.variant.final_stage_index() as i32;
        if manifest.last_completed_stage < NO_STAGE || manifest.last_completed_stage > final_index {
            return Err(CheckpointCorrupt::Mismatch(format!(
                "stage {} out of range",
                manifest.last_completed_stage
            )));
        }
        Ok(Some(manifest))
    }

    fn read_payload<T: DeserializeOwned>(
        &self,
        stage: StageId,
    ) -> std::result::Result<T, CheckpointCorrupt> {
        let path = self
            .payload_path(stage)
            .ok_or_else(|| CheckpointCorrupt::InvalidPayload {
                stage: stage.index(),
                reason: "stage has no payload".to_string(),
            })?;
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CheckpointCorrupt::MissingPayload {
                    stage: stage.index(),
                    path,
                });
            }
            Err(e) => {
                return Err(CheckpointCorrupt::InvalidPayload {
                    stage: stage.index(),
                    reason: e.to_string(),
                });
            }
        };
        serde_json::from_slice(&contents).map_err(|e| CheckpointCorrupt::InvalidPayload {
            stage: stage.index(),
            reason: e.to_string(),
        })
    }

    /// Persist a stage's output and mark it complete.
    ///
    /// The payload (if the stage has one) is made durable first; only then
    /// is the manifest advanced to `stage`.
    pub fn save_stage(&self, stage: StageId, payload: &StagePayload) -> Result<()> {
        if !payload.matches(stage) {
            return Err(PipelineError::InvalidInput(format!(
                "payload does not belong to stage {}",
                stage
            )));
        }
        if !self.variant.stages().contains(&stage) {
            return Err(PipelineError::InvalidInput(format!(
                "stage {} is not part of the {} pipeline",
                stage, self.variant
            )));
        }
        for earlier in self.variant.stages().iter().filter(|s| **s < stage) {
            if let Some(path) = self.payload_path(*earlier)
                && !path.is_file()
            {
                return Err(PipelineError::InconsistentState(format!(
                    "cannot complete stage {} before stage {} is checkpointed",
                    stage, earlier
                )));
            }
        }

        fs::create_dir_all(&self.dir)?;
        self.write_payload(stage, payload)?;

        let manifest = Manifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            variant: self.variant,
            last_completed_stage: stage.index() as i32,
            updated_at: Utc::now(),
        };
        atomic_write(&self.manifest_path(), &serde_json::to_vec_pretty(&manifest)?)?;

        tracing::debug!(dir = %self.dir.display(), stage = stage.index(), "Checkpoint advanced");
        Ok(())
    }

    /// Write a stage payload without touching the manifest.
    pub(crate) fn write_payload(&self, stage: StageId, payload: &StagePayload) -> Result<()> {
        let Some(path) = self.payload_path(stage) else {
            return Ok(());
        };
        let bytes = match payload {
            StagePayload::Steps(steps) => serde_json::to_vec_pretty(steps)?,
            StagePayload::Script(script) => serde_json::to_vec_pretty(script)?,
            StagePayload::Durations(durations) => serde_json::to_vec_pretty(durations)?,
            StagePayload::None => return Ok(()),
        };
        fs::create_dir_all(&self.dir)?;
        atomic_write(&path, &bytes)?;
        Ok(())
    }

    /// Remove the checkpoint. Absence is not an error.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write through a sibling temp file and rename over the target.
fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("checkpoint");
    let tmp = path.with_file_name(format!(".{}.tmp.{}", name, uuid::Uuid::new_v4()));

    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
