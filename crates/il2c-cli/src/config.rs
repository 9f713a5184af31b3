//! Configuration file parsing for il2c.toml.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use il2c_stack::TranslateOptions;

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Translation settings
    #[serde(default)]
    pub translate: TranslateConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Translation configuration.
#[derive(Debug, Default, Deserialize)]
pub struct TranslateConfig {
    /// Stop at the first method that fails
    #[serde(default)]
    pub fail_fast: bool,
}

impl TranslateConfig {
    /// Options for a module pass, with command-line overrides applied
    pub fn options(&self, fail_fast: bool) -> TranslateOptions {
        TranslateOptions {
            fail_fast: self.fail_fast || fail_fast,
        }
    }
}

/// Output configuration.
#[derive(Debug, Default, Deserialize)]
pub struct OutputConfig {
    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,
}

/// How translated methods are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Indented statement dump
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Load configuration from a file or search for default config files.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config_path = path.map(PathBuf::from).or_else(find_config_file);

    match config_path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
            tracing::debug!(path = %path.display(), "loaded config");
            Ok(config)
        }
        Some(path) => anyhow::bail!("Config file not found: {}", path.display()),
        None => Ok(Config::default()),
    }
}

/// Search for configuration file in the current directory and parent directories.
fn find_config_file() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_ancestors(&cwd)
}

fn find_config_in_ancestors(start: &Path) -> Option<PathBuf> {
    const CONFIG_NAMES: &[&str] = &["il2c.toml", ".il2crc.toml"];

    let mut dir = Some(start);
    while let Some(current) = dir {
        for name in CONFIG_NAMES {
            let path = current.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        dir = current.parent();
    }

    None
}
