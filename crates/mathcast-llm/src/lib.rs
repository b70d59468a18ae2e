//! LLM client abstraction for the mathcast pipeline.
//!
//! Every model call in the pipeline goes through the [`LlmBackend`] trait.
//! The only network implementation speaks the OpenAI chat-completions wire
//! format, which covers OpenAI itself, Groq, Ollama and most self-hosted
//! gateways. [`MockBackend`] replays canned responses for tests.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  LlmBackend trait                       │
//! │  - complete() -> CompletionResponse     │
//! └─────────────────────────────────────────┘
//!                    │
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//!   ┌──────────────┐    ┌─────────────┐
//!   │ OpenAiBackend│    │ MockBackend │
//!   └──────────────┘    └─────────────┘
//! ```

pub mod backend;
pub mod error;
pub mod openai;
pub mod types;

pub use backend::{LlmBackend, MockBackend, SharedBackend, with_retry};
pub use error::{LlmError, Result};
pub use openai::{OpenAiBackend, OpenAiConfig};
pub use types::{
    CompletionRequest, CompletionResponse, ContentPart, Message, Role, StopReason, Usage,
};
