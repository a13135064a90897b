//! Configuration file loading for diagnostic-panel
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `PANEL_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./panel.toml` or `./.panel.toml`
//! 4. Global: `$XDG_CONFIG_HOME/diagnostic-panel/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileConfig, FileLoggingConfig, FileOracleConfig, FileOutputConfig,
    FileOutputFormat, FilePanelConfig, FileStorageConfig,
};
pub use loader::ConfigLoader;
