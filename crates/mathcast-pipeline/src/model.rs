//! Stage data contracts: steps, script artifacts, durations, run inputs.

use serde::{Deserialize, Serialize};

use crate::fence::strip_code_fences;
use crate::stage::StageId;
use crate::timing;

/// Current schema version of [`ScriptArtifact`].
pub const SCRIPT_SCHEMA_VERSION: u32 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Variant
// ─────────────────────────────────────────────────────────────────────────────

/// Which final artifact a run produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineVariant {
    /// Self-contained HTML page with inline audio.
    #[default]
    Html,
    /// Rendered scene video muxed with the narration track.
    Video,
}

impl PipelineVariant {
    /// The ordered stages this variant runs.
    pub fn stages(&self) -> &'static [StageId] {
        match self {
            PipelineVariant::Html => &[
                StageId::Analyze,
                StageId::GenerateScript,
                StageId::Narrate,
                StageId::Render,
            ],
            PipelineVariant::Video => &[
                StageId::Analyze,
                StageId::GenerateScript,
                StageId::Narrate,
                StageId::Render,
                StageId::ConcatAudio,
                StageId::Compose,
            ],
        }
    }

    /// Index of the last stage.
    pub fn final_stage_index(&self) -> usize {
        self.stages().len() - 1
    }

    /// The script artifact kind this variant renders.
    pub fn artifact_kind(&self) -> ArtifactKind {
        match self {
            PipelineVariant::Html => ArtifactKind::HtmlAnimation,
            PipelineVariant::Video => ArtifactKind::SceneCode,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineVariant::Html => "html",
            PipelineVariant::Video => "video",
        }
    }
}

impl std::fmt::Display for PipelineVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PipelineVariant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(PipelineVariant::Html),
            "video" => Ok(PipelineVariant::Video),
            other => Err(format!("unknown pipeline variant '{}'", other)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Step
// ─────────────────────────────────────────────────────────────────────────────

/// One unit of the analyzed solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based position in the solution.
    pub step_id: u32,
    pub description: String,
    #[serde(default)]
    pub math_formula: String,
    #[serde(default)]
    pub visual_focus: String,
    /// Text read aloud during this step.
    pub voiceover_text: String,
}

impl Step {
    /// Whether downstream stages can use this step.
    pub fn is_usable(&self) -> bool {
        !self.description.trim().is_empty() && !self.voiceover_text.trim().is_empty()
    }
}

/// Check that steps are non-empty, numbered 1..=n in order, and usable.
pub fn check_steps(steps: &[Step]) -> std::result::Result<(), String> {
    if steps.is_empty() {
        return Err("no steps".to_string());
    }
    for (i, step) in steps.iter().enumerate() {
        let expected = i as u32 + 1;
        if step.step_id != expected {
            return Err(format!(
                "step at position {} has id {} (expected {})",
                i, step.step_id, expected
            ));
        }
        if !step.is_usable() {
            return Err(format!(
                "step {} is missing a description or narration",
                step.step_id
            ));
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Script Artifact
// ─────────────────────────────────────────────────────────────────────────────

/// What kind of program a [`ScriptArtifact`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Python scene code for the video renderer.
    SceneCode,
    /// HTML/JS fragment registering per-step animations.
    HtmlAnimation,
}

/// Generated renderable program plus per-step illustration prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptArtifact {
    pub schema_version: u32,
    pub kind: ArtifactKind,
    /// Program text with pause markers still pending.
    pub body: String,
    /// Exactly one prompt per step; blank when the generator had none.
    pub image_prompts: Vec<String>,
    /// Number of pause markers found when the artifact was built.
    pub duration_slots: usize,
}

impl ScriptArtifact {
    /// Build an artifact for `step_count` steps.
    ///
    /// The body is stripped of code fences, pause markers are counted and
    /// the prompt list is padded with blanks or truncated to `step_count`.
    pub fn new(
        kind: ArtifactKind,
        body: impl AsRef<str>,
        mut image_prompts: Vec<String>,
        step_count: usize,
    ) -> Self {
        let body = strip_code_fences(body.as_ref());
        image_prompts.resize(step_count, String::new());
        let duration_slots = timing::count_slots(kind, &body);

        Self {
            schema_version: SCRIPT_SCHEMA_VERSION,
            kind,
            body,
            image_prompts,
            duration_slots,
        }
    }

    /// Structural markers the body lacks.
    ///
    /// `scene_class` names the entry point required in scene code; it is
    /// ignored for HTML animations.
    pub fn missing_markers(&self, scene_class: &str) -> Vec<String> {
        let mut missing = Vec::new();
        match self.kind {
            ArtifactKind::SceneCode => {
                let entry = format!("class {}", scene_class);
                if !self.body.contains(&entry) {
                    missing.push(format!("scene entry point `{}`", entry));
                }
                if !self.body.contains("def construct") {
                    missing.push("`def construct` method".to_string());
                }
            }
            ArtifactKind::HtmlAnimation => {
                if !self.body.contains("stepAnimations") {
                    missing.push("`stepAnimations` registry".to_string());
                }
                if !self.body.contains("animation-container") {
                    missing.push("`animation-container` element".to_string());
                }
            }
        }
        if self.duration_slots == 0 {
            missing.push(format!("pause marker ({})", timing::marker_label(self.kind)));
        }
        missing
    }

    /// Schema-level checks applied when loading a persisted artifact.
    pub fn check_schema(&self) -> std::result::Result<(), String> {
        if self.schema_version != SCRIPT_SCHEMA_VERSION {
            return Err(format!(
                "unsupported script schema version {} (expected {})",
                self.schema_version, SCRIPT_SCHEMA_VERSION
            ));
        }
        if self.body.trim().is_empty() {
            return Err("script body is empty".to_string());
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Durations
// ─────────────────────────────────────────────────────────────────────────────

/// Narration length in seconds, one entry per step.
///
/// May be shorter than the step list; callers fill gaps with a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurationList(Vec<f64>);

impl DurationList {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Duration for position `index`, or `default` past the end.
    pub fn get_or(&self, index: usize, default: f64) -> f64 {
        self.0.get(index).copied().unwrap_or(default)
    }

    /// Every value is finite and non-negative.
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|d| d.is_finite() && *d >= 0.0)
    }
}

impl From<Vec<f64>> for DurationList {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Image
// ─────────────────────────────────────────────────────────────────────────────

/// A problem photo supplied with the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Guess the MIME type from a file extension.
    pub fn mime_for_path(path: &std::path::Path) -> &'static str {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            _ => "image/jpeg",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: u32) -> Step {
        Step {
            step_id: id,
            description: format!("step {id}"),
            math_formula: String::new(),
            visual_focus: String::new(),
            voiceover_text: format!("narration {id}"),
        }
    }

    #[test]
    fn test_check_steps() {
        assert!(check_steps(&[step(1), step(2)]).is_ok());
        assert!(check_steps(&[]).is_err());
        assert!(check_steps(&[step(1), step(3)]).is_err());

        let mut blank = step(1);
        blank.voiceover_text = "  ".to_string();
        assert!(check_steps(&[blank]).is_err());
    }

    #[test]
    fn test_artifact_pads_and_truncates_prompts() {
        let padded = ScriptArtifact::new(
            ArtifactKind::SceneCode,
            "self.wait()",
            vec!["a".to_string()],
            3,
        );
        assert_eq!(padded.image_prompts, vec!["a", "", ""]);

        let truncated = ScriptArtifact::new(
            ArtifactKind::SceneCode,
            "self.wait()",
            vec!["a".into(), "b".into(), "c".into()],
            2,
        );
        assert_eq!(truncated.image_prompts, vec!["a", "b"]);
    }

    #[test]
    fn test_artifact_strips_fences_and_counts_slots() {
        let artifact = ScriptArtifact::new(
            ArtifactKind::HtmlAnimation,
            "```html\n<div id=\"animation-container\"></div><script>window.stepAnimations = [{duration: STEP_PLACEHOLDER}, {duration: \"STEP_PLACEHOLDER\"}];</script>\n```",
            vec![],
            2,
        );
        assert!(artifact.body.starts_with("<div"));
        assert_eq!(artifact.duration_slots, 2);
        assert!(artifact.missing_markers("SolutionScene").is_empty());
    }

    #[test]
    fn test_missing_scene_markers() {
        let artifact = ScriptArtifact::new(ArtifactKind::SceneCode, "print('hi')", vec![], 1);
        let missing = artifact.missing_markers("SolutionScene");
        assert_eq!(missing.len(), 3);
        assert!(missing[0].contains("class SolutionScene"));
    }

    #[test]
    fn test_schema_check() {
        let mut artifact = ScriptArtifact::new(ArtifactKind::SceneCode, "self.wait()", vec![], 1);
        assert!(artifact.check_schema().is_ok());
        artifact.schema_version = 99;
        assert!(artifact.check_schema().is_err());
    }

    #[test]
    fn test_duration_list() {
        let durations = DurationList::new(vec![1.5, 2.0]);
        assert_eq!(durations.get_or(1, 9.0), 2.0);
        assert_eq!(durations.get_or(5, 9.0), 9.0);
        assert!(durations.is_valid());
        assert!(!DurationList::new(vec![f64::NAN]).is_valid());
        assert!(!DurationList::new(vec![-1.0]).is_valid());
        assert_eq!(serde_json::to_string(&durations).unwrap(), "[1.5,2.0]");
    }

    #[test]
    fn test_variant_stages() {
        assert_eq!(PipelineVariant::Html.final_stage_index(), 3);
        assert_eq!(PipelineVariant::Video.final_stage_index(), 5);
        assert_eq!("VIDEO".parse::<PipelineVariant>().unwrap(), PipelineVariant::Video);
        assert!("gif".parse::<PipelineVariant>().is_err());
    }
}
