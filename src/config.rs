//! Configuration management for the validation engine
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (params.toml)
//! - Environment variables (PARAMS__*)
//!
//! ## Example config file (params.toml):
//! ```toml
//! [evaluation]
//! max_depth = 16
//! max_array_length = 500
//!
//! [registry]
//! definitions = ["config/schemas", "config/orders.toml"]
//!
//! [response]
//! format = "json"
//! status = 422
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::evaluator::{EvaluationOptions, DEFAULT_MAX_DEPTH};
use crate::report::{ResponseFormat, UNPROCESSABLE_ENTITY};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Evaluation guards
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Where schema declarations come from
    #[serde(default)]
    pub registry: RegistryConfig,

    /// How rejected payloads are rendered
    #[serde(default)]
    pub response: ResponseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Deepest nesting level evaluated
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Longest array evaluated element by element (unbounded if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_array_length: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Declaration files or directories, loaded in order
    #[serde(default)]
    pub definitions: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    #[serde(default)]
    pub format: ResponseFormat,

    /// Status code of a rejected payload; must be a client error
    #[serde(default = "default_status")]
    pub status: u16,
}

// Default value functions
fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_status() -> u16 {
    UNPROCESSABLE_ENTITY
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_array_length: None,
        }
    }
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            format: ResponseFormat::Json,
            status: default_status(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, optionally from a specific file as well
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["params.toml", ".params.toml", "config/params.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "params") {
            let xdg_config = config_dir.config_dir().join("params.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Environment variables (PARAMS__EVALUATION__MAX_DEPTH=8)
        builder = builder.add_source(
            Environment::with_prefix("PARAMS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(400..500).contains(&self.response.status) {
            return Err(ConfigError::Message(format!(
                "response.status must be a 4xx client error, got {}",
                self.response.status
            )));
        }
        if self.evaluation.max_depth == 0 {
            return Err(ConfigError::Message(
                "evaluation.max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    pub fn evaluation_options(&self) -> EvaluationOptions {
        EvaluationOptions {
            max_depth: self.evaluation.max_depth,
            max_array_length: self.evaluation.max_array_length,
        }
    }
}
