//! Stage identifiers and their checkpoint payload mapping.

use serde::{Deserialize, Serialize};

/// One stage of the pipeline. The discriminant is the stage index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Analyze = 0,
    GenerateScript = 1,
    Narrate = 2,
    Render = 3,
    ConcatAudio = 4,
    Compose = 5,
}

impl StageId {
    pub const ALL: [StageId; 6] = [
        StageId::Analyze,
        StageId::GenerateScript,
        StageId::Narrate,
        StageId::Render,
        StageId::ConcatAudio,
        StageId::Compose,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Human-readable name passed to progress sinks.
    pub fn name(&self) -> &'static str {
        match self {
            StageId::Analyze => "Analyze",
            StageId::GenerateScript => "Generate Script",
            StageId::Narrate => "Synthesize Narration",
            StageId::Render => "Render",
            StageId::ConcatAudio => "Concatenate Audio",
            StageId::Compose => "Compose",
        }
    }

    /// Checkpoint payload file name, for stages that persist one.
    pub fn payload_file(&self) -> Option<&'static str> {
        match self {
            StageId::Analyze => Some("stage_0_steps.json"),
            StageId::GenerateScript => Some("stage_1_script.json"),
            StageId::Narrate => Some("stage_2_durations.json"),
            StageId::Render | StageId::ConcatAudio | StageId::Compose => None,
        }
    }

    pub fn has_payload(&self) -> bool {
        self.payload_file().is_some()
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.index())
    }
}
