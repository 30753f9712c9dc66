/// Application configuration - one struct per component, loaded once at startup
///
/// Layering (later wins):
/// 1. Built-in defaults
/// 2. Optional config file (format picked from the extension); without an
///    explicit path the per-user `config.toml` is used when it exists
/// 3. Environment variables `RESILIENT_REPORTER__<SECTION>__<KEY>`
use crate::{ErrorHandlingConfig, FileSystemConfig, GenerationConfig, RecoveryConfig};
use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "RESILIENT_REPORTER";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub error_handling: ErrorHandlingConfig,
    pub file_system: FileSystemConfig,
    pub recovery: RecoveryConfig,
    pub generation: GenerationConfig,
}

impl AppConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            builder = builder.add_source(File::from(path));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: AppConfig = settings.try_deserialize()?;

        tracing::debug!(
            file = ?path,
            max_retries = loaded.error_handling.max_retries,
            max_concurrency = loaded.generation.max_concurrency,
            "Configuration loaded"
        );

        Ok(loaded.normalized())
    }

    /// Per-user config file, e.g. `~/.config/resilient-reporter/config.toml` on Linux
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "resilient-reporter").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path`, or from `default_path()` if that file exists
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(Some(path)),
            None => {
                let fallback = Self::default_path().filter(|p| p.exists());
                Self::load(fallback.as_deref())
            }
        }
    }

    /// Clamp values that would make a component unusable
    fn normalized(mut self) -> Self {
        self.generation.max_concurrency = self.generation.max_concurrency.max(1);
        self.error_handling.max_history = self.error_handling.max_history.max(1);
        self
    }
}
