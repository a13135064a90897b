//! Run Panel use case
//!
//! Drives a flow to completion: starts it, then steps it with
//! `step_index = 1, 2, ...` until the flow reports done, certainty
//! stagnates, or the step budget runs out. Tracks the best step overall
//! and per action.

use crate::config::PanelParams;
use crate::ports::audit_logger::{AuditEvent, AuditLogger, NoAuditLogger};
use crate::ports::flow_repository::FlowRepository;
use crate::ports::progress::{NoProgress, PanelProgressNotifier};
use crate::ports::reasoning_oracle::ReasoningOracle;
use crate::use_cases::panel_flow::{PanelFlowUseCase, StepFlowError};
use panel_domain::{
    CaseId, DomainError, FinalConsensus, FlowId, PanelAction, StepOutcome, TerminationPolicy,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors that can occur during a panel run
#[derive(Error, Debug)]
pub enum RunPanelError {
    #[error("Invalid panel parameters: {0}")]
    InvalidParams(#[from] DomainError),

    #[error(transparent)]
    Step(#[from] StepFlowError),
}

/// Why the driver stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// COMMIT at or above the threshold
    Committed,
    /// Certainty flat for the stagnation window
    Stagnated,
    /// Step budget reached without a confident commit
    StepBudget,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Committed => "committed",
            StopReason::Stagnated => "stagnated",
            StopReason::StepBudget => "stepBudget",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for the RunPanel use case
#[derive(Debug, Clone)]
pub struct RunPanelInput {
    pub case_id: CaseId,
    pub params: PanelParams,
}

impl RunPanelInput {
    pub fn new(case_id: impl Into<CaseId>) -> Self {
        Self {
            case_id: case_id.into(),
            params: PanelParams::default(),
        }
    }

    pub fn with_params(mut self, params: PanelParams) -> Self {
        self.params = params;
        self
    }
}

/// One executed step as seen by the driver
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub step_index: u32,
    pub consensus: FinalConsensus,
    pub used_fallback: bool,
}

impl From<StepOutcome> for StepRecord {
    fn from(outcome: StepOutcome) -> Self {
        Self {
            step_index: outcome.step_index,
            consensus: outcome.consensus,
            used_fallback: outcome.used_fallback,
        }
    }
}

/// Highest-certainty step per action; ties keep the earliest
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct BestByAction {
    pub ask: Option<StepRecord>,
    pub order: Option<StepRecord>,
    pub commit: Option<StepRecord>,
}

impl BestByAction {
    pub fn get(&self, action: PanelAction) -> Option<&StepRecord> {
        match action {
            PanelAction::Ask => self.ask.as_ref(),
            PanelAction::Order => self.order.as_ref(),
            PanelAction::Commit => self.commit.as_ref(),
        }
    }

    fn offer(&mut self, record: &StepRecord) {
        let slot = match record.consensus.action {
            PanelAction::Ask => &mut self.ask,
            PanelAction::Order => &mut self.order,
            PanelAction::Commit => &mut self.commit,
        };
        keep_best(slot, record);
    }
}

fn keep_best(slot: &mut Option<StepRecord>, record: &StepRecord) {
    let better = slot
        .as_ref()
        .is_none_or(|best| record.consensus.certainty > best.consensus.certainty);
    if better {
        *slot = Some(record.clone());
    }
}

/// Result of a panel run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelRunReport {
    pub flow_id: FlowId,
    pub case_id: CaseId,
    pub steps_run: u32,
    pub stop_reason: StopReason,
    pub overall_best: Option<StepRecord>,
    pub best_by_action: BestByAction,
    pub turns: Vec<StepRecord>,
}

impl PanelRunReport {
    /// Consensus of the last executed step
    pub fn final_consensus(&self) -> Option<&FinalConsensus> {
        self.turns.last().map(|t| &t.consensus)
    }
}

/// Counts consecutive steps whose certainty barely moved
struct StagnationTracker {
    window: u32,
    epsilon: f64,
    previous: f64,
    flat: u32,
}

impl StagnationTracker {
    fn new(window: u32, epsilon: f64) -> Self {
        Self {
            window,
            epsilon,
            previous: 0.0,
            flat: 0,
        }
    }

    /// Record a certainty; true once the window is filled with flat steps.
    fn observe(&mut self, certainty: f64) -> bool {
        if (certainty - self.previous).abs() < self.epsilon {
            self.flat += 1;
        } else {
            self.flat = 0;
        }
        self.previous = certainty;
        self.window > 0 && self.flat >= self.window
    }
}

/// Use case for driving a panel flow to completion
pub struct RunPanelUseCase<O: ReasoningOracle + 'static, R: FlowRepository + 'static> {
    oracle: Arc<O>,
    repository: Arc<R>,
    audit: Arc<dyn AuditLogger>,
}

impl<O: ReasoningOracle + 'static, R: FlowRepository + 'static> RunPanelUseCase<O, R> {
    pub fn new(oracle: Arc<O>, repository: Arc<R>) -> Self {
        Self {
            oracle,
            repository,
            audit: Arc::new(NoAuditLogger),
        }
    }

    pub fn with_audit_logger(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    /// Execute the use case with default (no-op) progress
    pub async fn execute(&self, input: RunPanelInput) -> Result<PanelRunReport, RunPanelError> {
        self.execute_with_progress(input, &NoProgress).await
    }

    /// Execute the use case with progress callbacks
    pub async fn execute_with_progress(
        &self,
        input: RunPanelInput,
        progress: &dyn PanelProgressNotifier,
    ) -> Result<PanelRunReport, RunPanelError> {
        let params = &input.params;
        let budget = params.step_budget();
        let policy = TerminationPolicy::new(budget, params.commit_threshold)?;

        let flow = PanelFlowUseCase::new(
            Arc::clone(&self.oracle),
            Arc::clone(&self.repository),
            policy,
            params.seed,
        )
        .with_audit_logger(Arc::clone(&self.audit));

        info!(
            "Starting panel run for case {} (budget {}, threshold {})",
            input.case_id, budget, params.commit_threshold
        );
        let flow_id = flow.start_flow(input.case_id.clone()).await?;
        progress.on_flow_start(&flow_id, budget);

        let mut stagnation =
            StagnationTracker::new(params.stagnation_window, params.stagnation_epsilon);
        let mut overall_best = None;
        let mut best_by_action = BestByAction::default();
        let mut turns = Vec::new();
        let mut stop_reason = StopReason::StepBudget;

        for step_index in 1..=budget {
            let outcome = flow
                .step_flow_with_progress(&flow_id, step_index, progress)
                .await?;
            let done = outcome.done;
            let record = StepRecord::from(outcome);

            keep_best(&mut overall_best, &record);
            best_by_action.offer(&record);
            let stagnated = stagnation.observe(record.consensus.certainty);
            let committed = policy.is_final_commit(&record.consensus);
            turns.push(record);

            if done {
                stop_reason = if committed {
                    StopReason::Committed
                } else {
                    StopReason::StepBudget
                };
                break;
            }
            if stagnated {
                stop_reason = StopReason::Stagnated;
                break;
            }
        }

        let steps_run = turns.len() as u32;
        info!(
            "Panel run for flow {} stopped after {} steps: {}",
            flow_id, steps_run, stop_reason
        );
        self.audit.log(AuditEvent::new(
            "run_complete",
            json!({ "flow_id": flow_id, "steps_run": steps_run, "stop_reason": stop_reason }),
        ));
        progress.on_run_complete(steps_run, stop_reason.as_str());

        Ok(PanelRunReport {
            flow_id,
            case_id: input.case_id,
            steps_run,
            stop_reason,
            overall_best,
            best_by_action,
            turns,
        })
    }
}
