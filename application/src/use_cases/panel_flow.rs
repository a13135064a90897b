//! Panel flow use case
//!
//! The flow state machine. [`PanelFlowUseCase::start_flow`] creates a
//! running flow; [`PanelFlowUseCase::step_flow`] runs one turn:
//!
//! ```text
//! load flow + case → prior turns → memory → oracle → normalize → validate
//!   → resolve → persist turn (confident COMMIT: turn + report + finish at once) → done?
//! ```
//!
//! The oracle call is the only suspension point that can fail transiently;
//! such a failure aborts the step before anything is written. Malformed
//! oracle output never fails a step; it becomes a persisted fallback turn.

use crate::ports::audit_logger::{AuditEvent, AuditLogger, NoAuditLogger};
use crate::ports::flow_repository::{FlowRepository, RepositoryError};
use crate::ports::progress::{NoProgress, PanelProgressNotifier};
use crate::ports::reasoning_oracle::{OracleError, ReasoningOracle};
use crate::use_cases::invoke_reasoning::ReasoningInvoker;
use chrono::Utc;
use panel_domain::{
    CaseId, CaseSnapshot, DomainError, Flow, FlowId, FlowReport, StepOutcome, TerminationPolicy,
    Turn, accept, normalize, reflective_summary, resolve,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that abort a flow operation
#[derive(Error, Debug)]
pub enum StepFlowError {
    #[error("Flow not found: {0}")]
    FlowNotFound(String),

    #[error("Case not found: {0}")]
    CaseNotFound(String),

    #[error("Flow {0} is already finished")]
    FlowFinished(String),

    #[error("Step {got} out of order, expected step {expected}")]
    StepOutOfOrder { expected: u32, got: u32 },

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl StepFlowError {
    /// Transient external failure; the same step may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, StepFlowError::Oracle(_))
    }
}

/// Use case owning the ASK / ORDER / COMMIT lifecycle of flows
pub struct PanelFlowUseCase<O: ReasoningOracle + 'static, R: FlowRepository + 'static> {
    invoker: ReasoningInvoker<O>,
    repository: Arc<R>,
    policy: TerminationPolicy,
    audit: Arc<dyn AuditLogger>,
}

impl<O: ReasoningOracle + 'static, R: FlowRepository + 'static> PanelFlowUseCase<O, R> {
    pub fn new(
        oracle: Arc<O>,
        repository: Arc<R>,
        policy: TerminationPolicy,
        seed: Option<u64>,
    ) -> Self {
        Self {
            invoker: ReasoningInvoker::new(oracle, seed),
            repository,
            policy,
            audit: Arc::new(NoAuditLogger),
        }
    }

    pub fn with_audit_logger(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn policy(&self) -> &TerminationPolicy {
        &self.policy
    }

    /// Create and persist a new running flow. Every call creates a new flow.
    pub async fn start_flow(&self, case_id: CaseId) -> Result<FlowId, StepFlowError> {
        let flow = Flow::start(case_id);
        self.repository.insert_flow(&flow).await?;

        info!("Started flow {} for case {}", flow.id, flow.case_id);
        self.audit.log(AuditEvent::new(
            "flow_started",
            json!({ "flow_id": flow.id, "case_id": flow.case_id }),
        ));
        Ok(flow.id)
    }

    /// Run one step with default (no-op) progress
    pub async fn step_flow(
        &self,
        flow_id: &FlowId,
        step_index: u32,
    ) -> Result<StepOutcome, StepFlowError> {
        self.step_flow_with_progress(flow_id, step_index, &NoProgress)
            .await
    }

    /// Run one step with progress callbacks
    pub async fn step_flow_with_progress(
        &self,
        flow_id: &FlowId,
        step_index: u32,
        progress: &dyn PanelProgressNotifier,
    ) -> Result<StepOutcome, StepFlowError> {
        let mut flow = self
            .repository
            .get_flow(flow_id)
            .await?
            .ok_or_else(|| StepFlowError::FlowNotFound(flow_id.to_string()))?;
        if flow.is_finished() {
            return Err(StepFlowError::FlowFinished(flow_id.to_string()));
        }

        let fields = self
            .repository
            .load_case(&flow.case_id)
            .await?
            .ok_or_else(|| StepFlowError::CaseNotFound(flow.case_id.to_string()))?;
        let snapshot = CaseSnapshot::build(&fields);
        for anomaly in &snapshot.anomalies {
            warn!("Case {} field degraded: {}", flow.case_id, anomaly);
        }

        let turns = self.repository.list_turns(flow_id).await?;
        let expected = turns.last().map_or(1, |t| t.step_index + 1);
        if step_index != expected {
            return Err(StepFlowError::StepOutOfOrder {
                expected,
                got: step_index,
            });
        }

        info!("Flow {} step {}", flow_id, step_index);
        let memory = reflective_summary(&turns);
        let sampling = self.invoker.plan(&turns);
        progress.on_step_start(step_index, &sampling);

        self.audit.log(AuditEvent::new(
            "oracle_request",
            json!({
                "flow_id": flow_id,
                "step_index": step_index,
                "model": self.invoker.model_name(),
                "temperature": sampling.temperature,
                "hint": sampling.hint,
            }),
        ));

        let raw = match self
            .invoker
            .invoke(&snapshot.state, &memory, &sampling)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Oracle call failed on flow {} step {}: {}", flow_id, step_index, e);
                self.audit.log(AuditEvent::new(
                    "oracle_error",
                    json!({ "flow_id": flow_id, "step_index": step_index, "error": e.to_string() }),
                ));
                return Err(e.into());
            }
        };

        self.audit.log(AuditEvent::new(
            "oracle_response",
            json!({ "flow_id": flow_id, "step_index": step_index, "raw": raw }),
        ));

        let validated = accept(normalize(&raw));
        if let Some(reason) = &validated.fallback {
            warn!(
                "Flow {} step {}: using fallback output ({})",
                flow_id, step_index, reason
            );
            self.audit.log(AuditEvent::new(
                "fallback",
                json!({ "flow_id": flow_id, "step_index": step_index, "reason": reason.to_string() }),
            ));
        }

        let consensus = resolve(&validated.output);
        let turn = Turn::new(
            flow_id.clone(),
            step_index,
            validated.output,
            consensus.clone(),
        );
        if self.policy.is_final_commit(&consensus) {
            flow.finish(Utc::now())?;
            let report = FlowReport::for_commit(
                flow.id.clone(),
                flow.case_id.clone(),
                self.invoker.model_name(),
                &consensus,
            );
            self.repository.record_commit(&turn, &flow, &report).await?;
            info!(
                "Flow {} committed to '{}' at certainty {:.2}",
                flow_id,
                consensus.diagnosis.as_deref().unwrap_or_default(),
                consensus.certainty
            );
            self.audit.log(AuditEvent::new(
                "turn_persisted",
                json!({ "flow_id": flow_id, "step_index": step_index, "consensus": consensus }),
            ));
            self.audit.log(AuditEvent::new(
                "flow_completed",
                json!({ "flow_id": flow_id, "step_index": step_index, "report": report.markdown }),
            ));
        } else {
            self.repository.insert_turn(&turn).await?;
            debug!(
                "Persisted step {}: {} (certainty {:.2})",
                step_index, consensus.action, consensus.certainty
            );
            self.audit.log(AuditEvent::new(
                "turn_persisted",
                json!({ "flow_id": flow_id, "step_index": step_index, "consensus": consensus }),
            ));
        }

        let done = self.policy.is_done(&consensus, step_index);
        progress.on_step_complete(step_index, &consensus, validated.fallback.is_some());

        Ok(StepOutcome {
            flow_id: flow_id.clone(),
            step_index,
            consensus,
            done,
            used_fallback: validated.fallback.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::{
        MockRepository, RecordingAuditLogger, ScriptedOracle, ask_json, case_fields, commit_json,
        order_json,
    };
    use panel_domain::panel::exploration::{BASE_TEMPERATURE, MAX_TEMPERATURE};
    use panel_domain::{FALLBACK_QUESTION, FALLBACK_RATIONALE, FlowStatus, PanelAction};

    fn use_case(
        responses: Vec<Result<String, OracleError>>,
        policy: TerminationPolicy,
    ) -> (
        PanelFlowUseCase<ScriptedOracle, MockRepository>,
        Arc<ScriptedOracle>,
        Arc<MockRepository>,
    ) {
        let oracle = Arc::new(ScriptedOracle::new(responses));
        let repo = Arc::new(MockRepository::with_case("case-1", case_fields()));
        let uc = PanelFlowUseCase::new(Arc::clone(&oracle), Arc::clone(&repo), policy, Some(3));
        (uc, oracle, repo)
    }

    #[tokio::test]
    async fn test_start_flow_creates_running_flow() {
        let (uc, _, repo) = use_case(vec![], TerminationPolicy::default());
        let a = uc.start_flow(CaseId::new("case-1")).await.unwrap();
        let b = uc.start_flow(CaseId::new("case-1")).await.unwrap();

        assert_ne!(a, b);
        let flow = repo.flow(&a).unwrap();
        assert_eq!(flow.status, FlowStatus::Running);
        assert!(repo.turns(&a).is_empty());
    }

    #[tokio::test]
    async fn test_first_step_uses_empty_memory() {
        let (uc, oracle, repo) = use_case(vec![Ok(ask_json(0.4))], TerminationPolicy::default());
        let flow_id = uc.start_flow(CaseId::new("case-1")).await.unwrap();

        let outcome = uc.step_flow(&flow_id, 1).await.unwrap();

        assert_eq!(outcome.consensus.action, PanelAction::Ask);
        assert_eq!(outcome.consensus.rationale, FALLBACK_RATIONALE);
        assert!(!outcome.done);
        assert!(!outcome.used_fallback);
        assert_eq!(
            oracle.calls()[0].payload["prior"],
            "No prior reasoning available."
        );
        assert_eq!(
            oracle.calls()[0].payload["patient"]["complaints"][0],
            "productive cough"
        );
        assert_eq!(repo.turns(&flow_id).len(), 1);
    }

    #[tokio::test]
    async fn test_second_step_sees_digest_of_first() {
        let (uc, oracle, _) = use_case(
            vec![Ok(order_json(&["CXR"], &[], 0.5)), Ok(ask_json(0.5))],
            TerminationPolicy::default(),
        );
        let flow_id = uc.start_flow(CaseId::new("case-1")).await.unwrap();
        uc.step_flow(&flow_id, 1).await.unwrap();
        uc.step_flow(&flow_id, 2).await.unwrap();

        let prior = oracle.calls()[1].payload["prior"].as_str().unwrap().to_string();
        assert!(prior.contains("Step 1: Action=ORDER, Certainty=0.5."));
        assert!(prior.contains("Orders=[\"CXR\"]"));
    }

    #[tokio::test]
    async fn test_malformed_output_is_persisted_as_fallback() {
        let (uc, _, repo) = use_case(
            vec![Ok("I cannot comply.".to_string())],
            TerminationPolicy::default(),
        );
        let flow_id = uc.start_flow(CaseId::new("case-1")).await.unwrap();

        let outcome = uc.step_flow(&flow_id, 1).await.unwrap();

        assert!(outcome.used_fallback);
        assert_eq!(
            outcome.consensus.questions,
            Some(vec![FALLBACK_QUESTION.to_string()])
        );
        assert_eq!(outcome.consensus.rationale, FALLBACK_RATIONALE);
        assert_eq!(repo.turns(&flow_id).len(), 1);
    }

    #[tokio::test]
    async fn test_oracle_failure_persists_nothing() {
        let (uc, _, repo) = use_case(
            vec![Err(OracleError::Timeout), Ok(ask_json(0.3))],
            TerminationPolicy::default(),
        );
        let flow_id = uc.start_flow(CaseId::new("case-1")).await.unwrap();

        let err = uc.step_flow(&flow_id, 1).await.unwrap_err();
        assert!(err.is_transient());
        assert!(repo.turns(&flow_id).is_empty());

        // the same step can be retried
        let outcome = uc.step_flow(&flow_id, 1).await.unwrap();
        assert_eq!(outcome.step_index, 1);
    }

    #[tokio::test]
    async fn test_confident_commit_finishes_flow() {
        let (uc, _, repo) = use_case(
            vec![Ok(commit_json("Community-acquired pneumonia", 0.85))],
            TerminationPolicy::default(),
        );
        let flow_id = uc.start_flow(CaseId::new("case-1")).await.unwrap();

        let outcome = uc.step_flow(&flow_id, 1).await.unwrap();

        assert!(outcome.done);
        let flow = repo.flow(&flow_id).unwrap();
        assert_eq!(flow.status, FlowStatus::Ok);
        assert!(flow.finished_at.is_some());

        let reports = repo.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(
            reports[0].markdown,
            "**Diagnosis:** Community-acquired pneumonia\n\nConsistent clinical picture"
        );
        assert_eq!(reports[0].model_name, "scripted");
    }

    #[tokio::test]
    async fn test_failed_finalisation_writes_nothing() {
        let (uc, _, repo) = use_case(
            vec![Ok(commit_json("CAP", 0.9)), Ok(commit_json("CAP", 0.9))],
            TerminationPolicy::default(),
        );
        let flow_id = uc.start_flow(CaseId::new("case-1")).await.unwrap();

        repo.set_commit_failure(true);
        let err = uc.step_flow(&flow_id, 1).await.unwrap_err();
        assert!(matches!(err, StepFlowError::Repository(_)));
        assert!(repo.turns(&flow_id).is_empty());
        assert!(repo.reports().is_empty());
        assert_eq!(repo.flow(&flow_id).unwrap().status, FlowStatus::Running);

        // the committing step can be retried once storage recovers
        repo.set_commit_failure(false);
        let outcome = uc.step_flow(&flow_id, 1).await.unwrap();
        assert!(outcome.done);
        assert_eq!(repo.turns(&flow_id).len(), 1);
        assert_eq!(repo.reports().len(), 1);
        assert_eq!(repo.flow(&flow_id).unwrap().status, FlowStatus::Ok);
    }

    #[tokio::test]
    async fn test_low_certainty_commit_keeps_running() {
        let (uc, _, repo) = use_case(
            vec![Ok(commit_json("Viral URTI", 0.6))],
            TerminationPolicy::default(),
        );
        let flow_id = uc.start_flow(CaseId::new("case-1")).await.unwrap();

        let outcome = uc.step_flow(&flow_id, 1).await.unwrap();

        assert!(!outcome.done);
        assert_eq!(repo.flow(&flow_id).unwrap().status, FlowStatus::Running);
        assert!(repo.reports().is_empty());
    }

    #[tokio::test]
    async fn test_finished_flow_rejects_more_steps() {
        let (uc, _, _) = use_case(
            vec![Ok(commit_json("CAP", 0.9)), Ok(ask_json(0.1))],
            TerminationPolicy::default(),
        );
        let flow_id = uc.start_flow(CaseId::new("case-1")).await.unwrap();
        uc.step_flow(&flow_id, 1).await.unwrap();

        let err = uc.step_flow(&flow_id, 2).await.unwrap_err();
        assert!(matches!(err, StepFlowError::FlowFinished(_)));
    }

    #[tokio::test]
    async fn test_step_budget_marks_done() {
        let policy = TerminationPolicy::new(3, 0.8).unwrap();
        let (uc, _, _) = use_case(vec![Ok(ask_json(0.2)), Ok(ask_json(0.2))], policy);
        let flow_id = uc.start_flow(CaseId::new("case-1")).await.unwrap();

        assert!(!uc.step_flow(&flow_id, 1).await.unwrap().done);
        assert!(uc.step_flow(&flow_id, 2).await.unwrap().done);
    }

    #[tokio::test]
    async fn test_out_of_order_steps_are_rejected() {
        let (uc, oracle, _) = use_case(vec![Ok(ask_json(0.2))], TerminationPolicy::default());
        let flow_id = uc.start_flow(CaseId::new("case-1")).await.unwrap();

        let err = uc.step_flow(&flow_id, 2).await.unwrap_err();
        assert!(matches!(
            err,
            StepFlowError::StepOutOfOrder {
                expected: 1,
                got: 2
            }
        ));
        assert!(oracle.calls().is_empty());

        uc.step_flow(&flow_id, 1).await.unwrap();
        let err = uc.step_flow(&flow_id, 1).await.unwrap_err();
        assert!(matches!(err, StepFlowError::StepOutOfOrder { expected: 2, .. }));
    }

    #[tokio::test]
    async fn test_unknown_flow_and_case() {
        let (uc, _, _) = use_case(vec![], TerminationPolicy::default());

        let err = uc.step_flow(&FlowId::new("missing"), 1).await.unwrap_err();
        assert!(matches!(err, StepFlowError::FlowNotFound(_)));

        let flow_id = uc.start_flow(CaseId::new("no-such-case")).await.unwrap();
        let err = uc.step_flow(&flow_id, 1).await.unwrap_err();
        assert!(matches!(err, StepFlowError::CaseNotFound(_)));
    }

    #[tokio::test]
    async fn test_vetoed_orders_are_persisted_without_veto() {
        let (uc, _, repo) = use_case(
            vec![Ok(order_json(&["CXR", "CRP"], &["CRP"], 0.5))],
            TerminationPolicy::default(),
        );
        let flow_id = uc.start_flow(CaseId::new("case-1")).await.unwrap();

        let outcome = uc.step_flow(&flow_id, 1).await.unwrap();
        assert_eq!(outcome.consensus.orders, Some(vec!["CXR".to_string()]));
        assert_eq!(repo.turns(&flow_id)[0].final_orders(), ["CXR".to_string()]);
    }

    #[tokio::test]
    async fn test_repetition_raises_temperature() {
        let order = order_json(&["CXR", "CRP"], &[], 0.5);
        let (uc, oracle, _) = use_case(
            vec![Ok(order.clone()), Ok(order.clone()), Ok(order)],
            TerminationPolicy::default(),
        );
        let flow_id = uc.start_flow(CaseId::new("case-1")).await.unwrap();
        for step in 1..=3 {
            uc.step_flow(&flow_id, step).await.unwrap();
        }

        let calls = oracle.calls();
        assert_eq!(calls[0].temperature, BASE_TEMPERATURE);
        assert_eq!(calls[1].temperature, BASE_TEMPERATURE);
        assert!(calls[2].system.contains("Let Dr."));
        assert!(calls[2].temperature > BASE_TEMPERATURE);
        assert!(calls[2].temperature <= MAX_TEMPERATURE);
    }

    #[tokio::test]
    async fn test_audit_transcript() {
        let audit = Arc::new(RecordingAuditLogger::default());
        let (uc, _, _) = use_case(
            vec![Ok("garbage".to_string())],
            TerminationPolicy::default(),
        );
        let uc = uc.with_audit_logger(audit.clone());
        let flow_id = uc.start_flow(CaseId::new("case-1")).await.unwrap();
        uc.step_flow(&flow_id, 1).await.unwrap();

        assert_eq!(
            *audit.events.lock().unwrap(),
            vec![
                "flow_started",
                "oracle_request",
                "oracle_response",
                "fallback",
                "turn_persisted"
            ]
        );
    }
}
