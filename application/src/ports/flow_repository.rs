//! Flow persistence port
//!
//! The repository is passed in by the caller; use cases hold no process-wide
//! storage handle. Turns are append-only: an insert for an existing
//! `(flow_id, step_index)` must fail with [`RepositoryError::DuplicateStep`]
//! and leave the stored turn untouched.

use async_trait::async_trait;
use panel_domain::{CaseId, Flow, FlowId, FlowReport, StoredCaseFields, Turn};
use thiserror::Error;

/// Errors raised by flow repositories
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Flow not found: {0}")]
    FlowNotFound(String),

    #[error("Step {step_index} already recorded for flow {flow_id}")]
    DuplicateStep { flow_id: String, step_index: u32 },

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Storage for cases, flows, turns and reports
#[async_trait]
pub trait FlowRepository: Send + Sync {
    /// Raw stored fields for a case, if the case exists
    async fn load_case(&self, case_id: &CaseId) -> Result<Option<StoredCaseFields>, RepositoryError>;

    async fn insert_flow(&self, flow: &Flow) -> Result<(), RepositoryError>;

    async fn get_flow(&self, flow_id: &FlowId) -> Result<Option<Flow>, RepositoryError>;

    /// All turns of a flow, ordered by step index ascending
    async fn list_turns(&self, flow_id: &FlowId) -> Result<Vec<Turn>, RepositoryError>;

    async fn insert_turn(&self, turn: &Turn) -> Result<(), RepositoryError>;

    /// Append the committing turn, store the report and mark the flow
    /// finished as one unit: either all three writes land or none do.
    async fn record_commit(
        &self,
        turn: &Turn,
        flow: &Flow,
        report: &FlowReport,
    ) -> Result<(), RepositoryError>;
}
