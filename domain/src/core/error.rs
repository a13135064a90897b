//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Commit threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("Step budget must be at least 1")]
    InvalidStepBudget,

    #[error("Flow {0} is already finished")]
    FlowAlreadyFinished(String),
}
