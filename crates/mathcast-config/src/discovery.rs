//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/mathcast/config.toml` (user config)
//! 2. `./mathcast.toml` (project-local)
//! 3. CLI flags (applied by the binary)

use std::path::{Path, PathBuf};

use crate::{ConfigError, MathcastConfig, Result};

/// Project-local config filename.
const PROJECT_CONFIG_FILE: &str = "mathcast.toml";

/// Config filename inside the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

const APP_NAME: &str = "mathcast";

/// Overrides the user config directory when set and non-empty.
const CONFIG_DIR_ENV: &str = "MATHCAST_CONFIG_DIR";

/// One config layer that discovery looked at.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// Whether the file existed and parsed.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: MathcastConfig,
    /// Sources that were checked, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading (unreadable layers, plaintext keys).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of the layers that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Discover and merge all config layers.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Discover and merge config layers with an explicit user config directory.
///
/// `config_dir` overrides both `MATHCAST_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = MathcastConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    check_plaintext_keys(&config, &mut warnings);
    config.validate()?;

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load a single config file (no discovery).
pub fn load_config_file(path: &Path) -> Result<MathcastConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    MathcastConfig::from_toml(&contents)
}

/// Write a config file, creating parent directories as needed.
pub fn save_config(config: &MathcastConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })
}

/// Path of the user config file.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// User config directory: `MATHCAST_CONFIG_DIR`, then the platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Merge one file into `config`. A missing file is skipped and a broken one
/// becomes a warning.
fn load_layer(config: &mut MathcastConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

fn check_plaintext_keys(config: &MathcastConfig, warnings: &mut Vec<String>) {
    if let Some(ref llm) = config.llm
        && llm.has_plaintext_api_key()
    {
        warnings.push(
            "Default [llm] config contains a plaintext API key. \
             Consider using an environment variable instead."
                .to_string(),
        );
    }

    let mut names: Vec<&String> = config.llm_profiles.keys().collect();
    names.sort();
    for name in names {
        if config.llm_profiles[name].has_plaintext_api_key() {
            warnings.push(format!(
                "[llm.{}] contains a plaintext API key. \
                 Consider using an environment variable instead.",
                name
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::{Backend, VariantSetting};

    fn load_isolated(project: &Path) -> LoadedConfig {
        let empty_user_dir = TempDir::new().unwrap();
        load_config_with_options(Some(project), Some(empty_user_dir.path())).unwrap()
    }

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[llm]
backend = "groq"
model = "test-model"
"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.llm.as_ref().unwrap().backend, Some(Backend::Groq));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_no_files() {
        let dir = TempDir::new().unwrap();
        let loaded = load_isolated(dir.path());
        assert!(loaded.config.llm.is_none());
        assert!(loaded.loaded_from().is_empty());
    }

    #[test]
    fn test_project_layer_overrides_user_layer() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();

        fs::write(
            user_dir.path().join("config.toml"),
            r#"
[llm]
backend = "openai"
model = "gpt-4o"

[llm.vision]
backend = "openai"
model = "gpt-4o"

[pipeline]
variant = "html"
"#,
        )
        .unwrap();
        fs::write(
            project_dir.path().join("mathcast.toml"),
            r#"
[llm]
backend = "groq"
model = "project-model"

[pipeline]
variant = "video"
"#,
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path())).unwrap();
        let config = &loaded.config;

        let llm = config.llm.as_ref().unwrap();
        assert_eq!(llm.backend, Some(Backend::Groq));
        assert_eq!(llm.model.as_deref(), Some("project-model"));
        assert_eq!(config.pipeline().variant, VariantSetting::Video);
        assert!(config.llm_profiles.contains_key("vision"));
        assert_eq!(loaded.loaded_from().len(), 2);
    }

    #[test]
    fn test_plaintext_key_warning() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("mathcast.toml"),
            r#"
[llm]
backend = "openai"
model = "gpt-4o"
api_key = "sk-secret"

[llm.vision]
backend = "openai"
model = "gpt-4o"
api_key = "sk-other"
"#,
        )
        .unwrap();

        let loaded = load_isolated(dir.path());
        assert_eq!(loaded.warnings.len(), 2);
        assert!(loaded.warnings[0].contains("plaintext"));
        assert!(loaded.warnings[1].contains("[llm.vision]"));
    }

    #[test]
    fn test_malformed_config_warns_but_continues() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("mathcast.toml"), "not valid toml {{{{").unwrap();

        let loaded = load_isolated(dir.path());
        assert!(!loaded.warnings.is_empty());
        assert!(loaded.warnings[0].contains("Failed to load"));
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        let dir = TempDir::new().unwrap();
        let empty_user_dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("mathcast.toml"),
            "[pipeline]\nself_heal_max_attempts = 0\n",
        )
        .unwrap();

        let err = load_config_with_options(Some(dir.path()), Some(empty_user_dir.path()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = MathcastConfig::from_toml(
            r#"
[llm]
backend = "ollama"
model = "qwen2.5"
"#,
        )
        .unwrap();

        save_config(&config, &path).unwrap();
        let reloaded = load_config_file(&path).unwrap();
        assert_eq!(reloaded.llm.unwrap().backend, Some(Backend::Ollama));
    }
}
