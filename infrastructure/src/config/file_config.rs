//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Every section is optional; missing keys take the defaults below.

use panel_application::PanelParams;
use panel_domain::{DEFAULT_COMMIT_THRESHOLD, DEFAULT_MAX_STEPS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("timeout_seconds cannot be 0")]
    InvalidTimeout,

    #[error("model name cannot be empty")]
    EmptyModelName,

    #[error("max_steps cannot be 0")]
    InvalidMaxSteps,

    #[error("commit_threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),
}

/// Raw oracle configuration from TOML (`[oracle]` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOracleConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    pub endpoint: String,
    /// Model name sent with every request and recorded on reports
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Timeout in seconds for one oracle call
    pub timeout_seconds: u64,
    /// Request `response_format: json_object`
    pub json_mode: bool,
}

impl Default for FileOracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_seconds: 120,
            json_mode: true,
        }
    }
}

impl FileOracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Raw panel configuration from TOML (`[panel]` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePanelConfig {
    pub max_steps: u32,
    pub commit_threshold: f64,
    pub stagnation_window: u32,
    pub stagnation_epsilon: f64,
    /// Fixed RNG seed for reproducible exploration
    pub seed: Option<u64>,
}

impl Default for FilePanelConfig {
    fn default() -> Self {
        let params = PanelParams::default();
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            commit_threshold: DEFAULT_COMMIT_THRESHOLD,
            stagnation_window: params.stagnation_window,
            stagnation_epsilon: params.stagnation_epsilon,
            seed: None,
        }
    }
}

impl FilePanelConfig {
    /// Convert into application-level parameters
    pub fn to_params(&self) -> PanelParams {
        PanelParams::default()
            .with_max_steps(self.max_steps)
            .with_commit_threshold(self.commit_threshold)
            .with_stagnation(self.stagnation_window, self.stagnation_epsilon)
            .with_seed(self.seed)
    }
}

/// Raw storage configuration from TOML (`[storage]` section)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    /// SQLite database path
    pub database: Option<PathBuf>,
}

/// Raw logging configuration from TOML (`[logging]` section)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL audit transcript path
    pub audit_log: Option<PathBuf>,
}

/// Output format for run reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOutputFormat {
    #[default]
    Full,
    Summary,
    Json,
}

/// Raw output configuration from TOML (`[output]` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputConfig {
    pub format: Option<FileOutputFormat>,
    /// Enable colored terminal output
    pub color: bool,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            format: None,
            color: true,
        }
    }
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub oracle: FileOracleConfig,
    pub panel: FilePanelConfig,
    pub storage: FileStorageConfig,
    pub logging: FileLoggingConfig,
    pub output: FileOutputConfig,
}

impl FileConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.oracle.timeout_seconds == 0 {
            return Err(ConfigValidationError::InvalidTimeout);
        }

        if self.oracle.model.trim().is_empty() {
            return Err(ConfigValidationError::EmptyModelName);
        }

        if self.panel.max_steps == 0 {
            return Err(ConfigValidationError::InvalidMaxSteps);
        }

        let threshold = self.panel.commit_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigValidationError::InvalidThreshold(threshold));
        }

        Ok(())
    }
}
