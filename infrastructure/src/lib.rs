//! Infrastructure layer for diagnostic-panel
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod config;
pub mod logging;
pub mod oracle;
pub mod storage;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileConfig, FileLoggingConfig, FileOracleConfig,
    FileOutputConfig, FileOutputFormat, FilePanelConfig, FileStorageConfig,
};
pub use logging::JsonlAuditLogger;
pub use oracle::{OpenAiOracle, OpenAiOracleConfig};
pub use storage::{CaseFile, CaseFileError, InMemoryFlowRepository, SqliteFlowRepository};
