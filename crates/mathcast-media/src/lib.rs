//! External-tool collaborators for the mathcast pipeline.
//!
//! Everything here shells out through [`ProcessRunner`]:
//!
//! - [`TtsNarrator`] writes per-step narration and measures it with [`DurationProbe`]
//! - [`HtmlRenderer`] writes the self-contained player page
//! - [`SceneRenderer`] renders scene code to video
//! - [`FfmpegConcatenator`] and [`FfmpegComposer`] build the final video
//!
//! Both renderers drive a [`mathcast_pipeline::SelfHealEngine`] so broken
//! scripts are sent back for repair before the stage gives up.

pub mod ffmpeg;
pub mod html;
pub mod page;
pub mod process;
pub mod scene;
pub mod tts;

pub use ffmpeg::{FfmpegComposer, FfmpegConcatenator};
pub use html::{HtmlRenderer, validate_fragment};
pub use page::assemble_html_page;
pub use process::{ProcessOutput, ProcessRunner};
pub use scene::{SceneRenderer, validate_scene};
pub use tts::{DurationProbe, TtsNarrator};
