//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod audit_logger;
pub mod flow_repository;
pub mod progress;
pub mod reasoning_oracle;
