//! Flow domain entities
//!
//! A [`Flow`] is one diagnostic session bound to one case. It owns an
//! append-only sequence of [`Turn`]s ordered by 1-based step index.

use crate::core::error::DomainError;
use crate::panel::action::PanelAction;
use crate::panel::output::PanelOutput;
use crate::panel::resolve::FinalConsensus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowId(String);

impl FlowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random (v4) identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for FlowId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for FlowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to an external case record (not owned by the flow).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseId(String);

impl CaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for CaseId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for CaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    Running,
    /// Set only on a committed diagnosis
    Ok,
}

impl FlowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStatus::Running => "running",
            FlowStatus::Ok => "ok",
        }
    }
}

impl std::fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FlowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(FlowStatus::Running),
            "ok" => Ok(FlowStatus::Ok),
            other => Err(format!("Unknown flow status: {}", other)),
        }
    }
}

/// One diagnostic session (Entity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: FlowId,
    pub case_id: CaseId,
    pub status: FlowStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Flow {
    /// A new running flow with a generated id
    pub fn start(case_id: CaseId) -> Self {
        Self {
            id: FlowId::generate(),
            case_id,
            status: FlowStatus::Running,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == FlowStatus::Ok
    }

    /// Transition to `ok`. `finished_at` is set exactly once.
    pub fn finish(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        if self.is_finished() {
            return Err(DomainError::FlowAlreadyFinished(self.id.to_string()));
        }
        self.status = FlowStatus::Ok;
        self.finished_at = Some(at);
        Ok(())
    }
}

/// One persisted reasoning step (immutable once created)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub flow_id: FlowId,
    /// 1-based, strictly increasing within a flow
    pub step_index: u32,
    /// The validated panel output, stored verbatim for replay
    pub panel_output: PanelOutput,
    pub consensus: FinalConsensus,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(
        flow_id: FlowId,
        step_index: u32,
        panel_output: PanelOutput,
        consensus: FinalConsensus,
    ) -> Self {
        Self {
            flow_id,
            step_index,
            panel_output,
            consensus,
            created_at: Utc::now(),
        }
    }

    pub fn action(&self) -> PanelAction {
        self.consensus.action
    }

    pub fn certainty(&self) -> f64 {
        self.consensus.certainty
    }

    /// Orders after veto; empty for non-ORDER turns
    pub fn final_orders(&self) -> &[String] {
        self.consensus.final_orders()
    }
}

/// Result of one `step_flow` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub flow_id: FlowId,
    pub step_index: u32,
    pub consensus: FinalConsensus,
    pub done: bool,
    /// Whether the oracle output was replaced by the fallback
    #[serde(skip)]
    pub used_fallback: bool,
}
