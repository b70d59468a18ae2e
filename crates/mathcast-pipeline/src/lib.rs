//! Checkpointed, self-healing generation pipeline.
//!
//! Turns a math problem into a narrated animation through a fixed list of
//! stages. Each completed stage is checkpointed inside the run's working
//! directory so a failed run resumes where it stopped.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                │
//! │  Analyze → Generate Script → Narrate → Render                │
//! │                                  (video) → Concat → Compose  │
//! └──────────────────────────────────────────────────────────────┘
//!        │ save/load                         │ render
//!        ▼                                   ▼
//! ┌─────────────────┐              ┌──────────────────────┐
//! │ CheckpointStore │              │ SelfHealEngine       │
//! │ .checkpoint/    │              │ validate → execute   │
//! └─────────────────┘              │   → repair → retry   │
//!                                  └──────────────────────┘
//! ```
//!
//! Collaborators (analyzer, generators, narration, renderers, media tools)
//! are injected through the traits in [`contracts`].

pub mod checkpoint;
pub mod contracts;
pub mod error;
pub mod fence;
pub mod heal;
pub mod model;
pub mod orchestrator;
pub mod run;
pub mod stage;
pub mod timing;

pub use checkpoint::{Checkpoint, CheckpointStore, NO_STAGE, StagePayload};
pub use contracts::{
    ArtifactRenderer, AudioConcatenator, NarrationSynthesizer, ProblemAnalyzer, ProgressSink,
    ScriptGenerator, VideoComposer,
};
pub use error::{CompositionError, PipelineError, Result};
pub use fence::strip_code_fences;
pub use heal::{ExecuteFailure, HealOutcome, HealTarget, Repairer, SelfHealEngine};
pub use model::{
    ArtifactKind, DurationList, ImagePayload, PipelineVariant, SCRIPT_SCHEMA_VERSION,
    ScriptArtifact, Step, check_steps,
};
pub use orchestrator::{Generators, Orchestrator, OrchestratorConfig};
pub use run::{PipelineRun, RunLayout, audio_file_name, step_audio_files};
pub use stage::StageId;
pub use timing::{HTML_PLACEHOLDER, count_slots, format_seconds, inject_durations};
