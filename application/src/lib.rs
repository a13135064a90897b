//! Application layer for diagnostic-panel
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::PanelParams;
pub use ports::{
    audit_logger::{AuditEvent, AuditLogger, NoAuditLogger},
    flow_repository::{FlowRepository, RepositoryError},
    progress::{NoProgress, PanelProgressNotifier},
    reasoning_oracle::{OracleError, ReasoningOracle},
};
pub use use_cases::invoke_reasoning::ReasoningInvoker;
pub use use_cases::panel_flow::{PanelFlowUseCase, StepFlowError};
pub use use_cases::run_panel::{
    BestByAction, PanelRunReport, RunPanelError, RunPanelInput, RunPanelUseCase, StepRecord,
    StopReason,
};
