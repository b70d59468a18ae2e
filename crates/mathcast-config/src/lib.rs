//! Configuration system for the mathcast explainer pipeline.
//!
//! Provides TOML-based configuration with:
//! - A default LLM (`[llm]`) plus named profiles (`[llm.vision]`, ...)
//! - Pipeline, narration, renderer and media tool sections
//! - Config file layering (user config dir + project-local overrides)
//! - API key resolution (env var → config file)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, save_config,
    xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
