//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [llm]                    # default LLM
//! [llm.vision]             # named LLM profiles
//! [pipeline]               # orchestrator and self-heal settings
//! [tts]                    # narration synthesis
//! [render]                 # scene renderer
//! [media]                  # ffmpeg / ffprobe
//! [logging]                # log file output
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Name of the LLM profile used for calls that carry an image.
pub const VISION_PROFILE: &str = "vision";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// Maps to the full TOML config file. All sections are optional so that
/// partial configs (e.g., project-local overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MathcastConfig {
    /// Default LLM configuration (the bare `[llm]` section).
    pub llm: Option<LlmConfig>,

    /// Named LLM configurations (`[llm.vision]`, etc.).
    #[serde(default, rename = "llm_profiles")]
    pub llm_profiles: HashMap<String, LlmConfig>,

    /// Pipeline orchestration configuration.
    pub pipeline: Option<PipelineSection>,

    /// Narration synthesis configuration.
    pub tts: Option<TtsConfig>,

    /// Scene renderer configuration.
    pub render: Option<RenderConfig>,

    /// FFmpeg / FFprobe configuration.
    pub media: Option<MediaConfig>,

    /// Log output configuration.
    pub logging: Option<LoggingConfig>,
}

impl MathcastConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        // Parse into raw TOML value first to handle the llm table split
        let raw: RawConfig = toml::from_str(toml_str)?;
        Ok(raw.into())
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        let raw: RawConfig = self.clone().into();
        Ok(toml::to_string_pretty(&raw)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: MathcastConfig) {
        if other.llm.is_some() {
            self.llm = other.llm;
        }

        for (name, config) in other.llm_profiles {
            self.llm_profiles.insert(name, config);
        }

        if other.pipeline.is_some() {
            self.pipeline = other.pipeline;
        }

        if other.tts.is_some() {
            self.tts = other.tts;
        }

        if other.render.is_some() {
            self.render = other.render;
        }

        if other.media.is_some() {
            self.media = other.media;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// The default text LLM.
    pub fn text_llm(&self) -> crate::Result<&LlmConfig> {
        self.llm.as_ref().ok_or(crate::ConfigError::NoDefaultLlm)
    }

    /// The LLM used for image-bearing calls.
    ///
    /// Uses `[llm.vision]` when present, otherwise the default `[llm]`.
    pub fn vision_llm(&self) -> crate::Result<&LlmConfig> {
        match self.llm_profiles.get(VISION_PROFILE) {
            Some(profile) => Ok(profile),
            None => self.text_llm(),
        }
    }

    /// Effective pipeline section (defaults when absent).
    pub fn pipeline(&self) -> PipelineSection {
        self.pipeline.clone().unwrap_or_default()
    }

    /// Effective narration section.
    pub fn tts(&self) -> TtsConfig {
        self.tts.clone().unwrap_or_default()
    }

    /// Effective renderer section.
    pub fn render(&self) -> RenderConfig {
        self.render.clone().unwrap_or_default()
    }

    /// Effective media tools section.
    pub fn media(&self) -> MediaConfig {
        self.media.clone().unwrap_or_default()
    }

    /// Effective logging section.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(ref pipeline) = self.pipeline {
            if pipeline.self_heal_max_attempts == 0 {
                return Err(crate::ConfigError::InvalidValue {
                    field: "pipeline.self_heal_max_attempts".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            if !pipeline.default_wait_seconds.is_finite() || pipeline.default_wait_seconds < 0.0 {
                return Err(crate::ConfigError::InvalidValue {
                    field: "pipeline.default_wait_seconds".to_string(),
                    reason: "must be a non-negative number".to_string(),
                });
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw TOML structure (for serde)
// ─────────────────────────────────────────────────────────────────────────────

/// Internal raw config matching the actual TOML layout.
///
/// In TOML, `[llm]` and `[llm.vision]` coexist as a table with both
/// direct keys and sub-tables. This struct handles that mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawConfig {
    llm: Option<RawLlmSection>,
    pipeline: Option<PipelineSection>,
    tts: Option<TtsConfig>,
    render: Option<RenderConfig>,
    media: Option<MediaConfig>,
    logging: Option<LoggingConfig>,
}

/// The `[llm]` section which can contain both direct fields and named sub-tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawLlmSection {
    backend: Option<Backend>,
    model: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    script_timeout_secs: Option<u64>,
    retry_max: Option<u32>,
    retry_backoff_ms: Option<u64>,

    /// Named profiles are captured via flatten.
    #[serde(flatten)]
    profiles: HashMap<String, LlmConfig>,
}

impl From<RawConfig> for MathcastConfig {
    fn from(raw: RawConfig) -> Self {
        let (llm, llm_profiles) = match raw.llm {
            Some(section) => {
                let default = if section.backend.is_some() || section.model.is_some() {
                    Some(LlmConfig {
                        backend: section.backend,
                        model: section.model,
                        base_url: section.base_url,
                        api_key: section.api_key,
                        temperature: section.temperature,
                        max_tokens: section.max_tokens,
                        timeout_secs: section.timeout_secs,
                        script_timeout_secs: section.script_timeout_secs,
                        retry_max: section.retry_max,
                        retry_backoff_ms: section.retry_backoff_ms,
                    })
                } else {
                    None
                };
                (default, section.profiles)
            }
            None => (None, HashMap::new()),
        };

        MathcastConfig {
            llm,
            llm_profiles,
            pipeline: raw.pipeline,
            tts: raw.tts,
            render: raw.render,
            media: raw.media,
            logging: raw.logging,
        }
    }
}

impl From<MathcastConfig> for RawConfig {
    fn from(config: MathcastConfig) -> Self {
        let llm = if config.llm.is_some() || !config.llm_profiles.is_empty() {
            let default = config.llm.unwrap_or_default();
            Some(RawLlmSection {
                backend: default.backend,
                model: default.model,
                base_url: default.base_url,
                api_key: default.api_key,
                temperature: default.temperature,
                max_tokens: default.max_tokens,
                timeout_secs: default.timeout_secs,
                script_timeout_secs: default.script_timeout_secs,
                retry_max: default.retry_max,
                retry_backoff_ms: default.retry_backoff_ms,
                profiles: config.llm_profiles,
            })
        } else {
            None
        };

        RawConfig {
            llm,
            pipeline: config.pipeline,
            tts: config.tts,
            render: config.render,
            media: config.media,
            logging: config.logging,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for an LLM backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend provider.
    pub backend: Option<Backend>,
    /// Model identifier.
    pub model: Option<String>,
    /// Custom API base URL (for proxies, custom endpoints).
    pub base_url: Option<String>,
    /// API key (prefer the env var; warns if set here).
    pub api_key: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Maximum tokens per completion.
    pub max_tokens: Option<u32>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Timeout for long script-generation requests, in seconds.
    pub script_timeout_secs: Option<u64>,
    /// Maximum retry attempts for failed requests.
    pub retry_max: Option<u32>,
    /// Backoff delay between retries in milliseconds.
    pub retry_backoff_ms: Option<u64>,
}

impl LlmConfig {
    /// Returns true if an API key is stored directly in the config file.
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Get the environment variable name for this backend's API key.
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.env_var())
    }

    /// Resolve the API key: backend env var first, then the config file.
    ///
    /// Ollama runs locally and never requires a key.
    pub fn resolve_api_key(&self) -> crate::Result<Option<String>> {
        let backend = self.backend.unwrap_or(Backend::Openai);
        if let Ok(key) = std::env::var(backend.env_var())
            && !key.is_empty()
        {
            return Ok(Some(key));
        }
        if let Some(ref key) = self.api_key {
            return Ok(Some(key.clone()));
        }
        if backend == Backend::Ollama {
            return Ok(None);
        }
        Err(crate::ConfigError::ApiKeyNotFound {
            backend: backend.to_string(),
            env_var: backend.env_var().to_string(),
        })
    }
}

/// Supported LLM backend providers (all OpenAI-compatible).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Openai,
    Groq,
    Ollama,
    Custom,
}

impl Backend {
    /// Environment variable name for this backend's API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            Backend::Openai => "OPENAI_API_KEY",
            Backend::Groq => "GROQ_API_KEY",
            Backend::Ollama => "OLLAMA_API_KEY",
            Backend::Custom => "LLM_API_KEY",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::Openai => "OpenAI",
            Backend::Groq => "Groq",
            Backend::Ollama => "Ollama",
            Backend::Custom => "Custom",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Which final artifact the pipeline produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantSetting {
    /// Self-contained HTML animation with inline audio.
    #[default]
    Html,
    /// Rendered scene video muxed with the narration track.
    Video,
}

/// Pipeline orchestration configuration.
///
/// ```toml
/// [pipeline]
/// output_dir = "output"
/// variant = "html"
/// self_heal_max_attempts = 5
/// default_wait_seconds = 2.0
/// audio_prefix = "step"
/// animation_style = "chalkboard, hand-drawn"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Root directory under which each run gets its own working directory.
    pub output_dir: PathBuf,
    /// Default pipeline variant.
    pub variant: VariantSetting,
    /// Maximum self-heal attempts around the render stage.
    pub self_heal_max_attempts: u32,
    /// Duration used for pause slots without a narration duration.
    pub default_wait_seconds: f64,
    /// Filename prefix for per-step narration audio.
    pub audio_prefix: String,
    /// Optional style description appended to generation prompts.
    pub animation_style: Option<String>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            variant: VariantSetting::Html,
            self_heal_max_attempts: 5,
            default_wait_seconds: 2.0,
            audio_prefix: "step".to_string(),
            animation_style: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Narration Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Narration (text-to-speech) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// TTS command line tool.
    pub command: String,
    /// Voice used for every step of a run.
    pub voice: String,
    /// Per-step synthesis timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            command: "edge-tts".to_string(),
            voice: "zh-CN-XiaoxiaoNeural".to_string(),
            timeout_secs: 120,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Renderer Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Scene renderer (Manim) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Renderer executable.
    pub manim_command: String,
    /// Scene class the generated code must define.
    pub scene_class: String,
    /// Quality flag passed to the renderer.
    pub quality_flag: String,
    /// Render timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            manim_command: "manim".to_string(),
            scene_class: "SolutionScene".to_string(),
            quality_flag: "-ql".to_string(),
            timeout_secs: 300,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Media Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// FFmpeg / FFprobe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub ffmpeg_command: String,
    pub ffprobe_command: String,
    /// Audio concatenation timeout in seconds.
    pub concat_timeout_secs: u64,
    /// Video/audio mux timeout in seconds.
    pub mux_timeout_secs: u64,
    /// Duration probe timeout in seconds.
    pub probe_timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_command: "ffmpeg".to_string(),
            ffprobe_command: "ffprobe".to_string(),
            concat_timeout_secs: 300,
            mux_timeout_secs: 600,
            probe_timeout_secs: 30,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rolling log files. Defaults to `<config dir>/logs`.
    pub dir: Option<PathBuf>,
    /// Whether to write the JSON log file at all.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            json: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
