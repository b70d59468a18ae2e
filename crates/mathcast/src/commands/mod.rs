//! CLI command handlers.

use std::path::{Path, PathBuf};

use mathcast_config::{LoadedConfig, MathcastConfig};

pub mod config;
pub mod generate;
pub mod progress;
pub mod purge;
pub mod resume;
pub mod status;
pub mod wiring;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// User config directory in effect, if one could be determined.
    pub config_dir: Option<PathBuf>,
    /// Merged configuration and where it came from.
    pub loaded: LoadedConfig,
}

impl Context {
    pub fn config(&self) -> &MathcastConfig {
        &self.loaded.config
    }

    /// Root under which runs live: `--output` when given, else `[pipeline].output_dir`.
    pub fn output_root(&self, override_dir: Option<&Path>) -> PathBuf {
        override_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config().pipeline().output_dir)
    }
}
