//! Test doubles shared by the use case tests

use crate::ports::audit_logger::{AuditEvent, AuditLogger};
use crate::ports::flow_repository::{FlowRepository, RepositoryError};
use crate::ports::reasoning_oracle::{OracleError, ReasoningOracle};
use async_trait::async_trait;
use panel_domain::{
    CaseId, FinalConsensus, Flow, FlowId, FlowReport, PanelAction, StoredCaseFields, Turn,
    fallback_output,
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

// ==================== Oracle ====================

pub struct OracleCall {
    pub system: String,
    pub payload: Value,
    pub temperature: f64,
}

/// Returns scripted responses in order; errors once the script runs out.
pub struct ScriptedOracle {
    responses: Mutex<VecDeque<Result<String, OracleError>>>,
    calls: Mutex<Vec<OracleCall>>,
}

impl ScriptedOracle {
    pub fn new(responses: Vec<Result<String, OracleError>>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(responses)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always returns the same text
    pub fn repeating(text: &str, times: usize) -> Self {
        Self::new((0..times).map(|_| Ok(text.to_string())).collect())
    }

    pub fn calls(&self) -> std::sync::MutexGuard<'_, Vec<OracleCall>> {
        self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn generate(
        &self,
        system_instruction: &str,
        user_payload: &Value,
        temperature: f64,
    ) -> Result<String, OracleError> {
        self.calls.lock().unwrap().push(OracleCall {
            system: system_instruction.to_string(),
            payload: user_payload.clone(),
            temperature,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Other("No more responses".to_string())))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

// ==================== Repository ====================

#[derive(Default)]
struct Store {
    cases: HashMap<String, StoredCaseFields>,
    flows: HashMap<String, Flow>,
    turns: HashMap<String, Vec<Turn>>,
    reports: Vec<FlowReport>,
}

#[derive(Default)]
pub struct MockRepository {
    store: Mutex<Store>,
    fail_commits: AtomicBool,
}

impl MockRepository {
    pub fn with_case(case_id: &str, fields: StoredCaseFields) -> Self {
        let repo = Self::default();
        repo.store
            .lock()
            .unwrap()
            .cases
            .insert(case_id.to_string(), fields);
        repo
    }

    /// Make `record_commit` fail (nothing is written) until switched off
    pub fn set_commit_failure(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn flow(&self, flow_id: &FlowId) -> Option<Flow> {
        self.store.lock().unwrap().flows.get(flow_id.as_str()).cloned()
    }

    pub fn turns(&self, flow_id: &FlowId) -> Vec<Turn> {
        self.store
            .lock()
            .unwrap()
            .turns
            .get(flow_id.as_str())
            .cloned()
            .unwrap_or_default()
    }

    pub fn reports(&self) -> Vec<FlowReport> {
        self.store.lock().unwrap().reports.clone()
    }
}

#[async_trait]
impl FlowRepository for MockRepository {
    async fn load_case(
        &self,
        case_id: &CaseId,
    ) -> Result<Option<StoredCaseFields>, RepositoryError> {
        Ok(self.store.lock().unwrap().cases.get(case_id.as_str()).cloned())
    }

    async fn insert_flow(&self, flow: &Flow) -> Result<(), RepositoryError> {
        self.store
            .lock()
            .unwrap()
            .flows
            .insert(flow.id.to_string(), flow.clone());
        Ok(())
    }

    async fn get_flow(&self, flow_id: &FlowId) -> Result<Option<Flow>, RepositoryError> {
        Ok(self.flow(flow_id))
    }

    async fn list_turns(&self, flow_id: &FlowId) -> Result<Vec<Turn>, RepositoryError> {
        Ok(self.turns(flow_id))
    }

    async fn insert_turn(&self, turn: &Turn) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().unwrap();
        let turns = store.turns.entry(turn.flow_id.to_string()).or_default();
        if turns.iter().any(|t| t.step_index == turn.step_index) {
            return Err(RepositoryError::DuplicateStep {
                flow_id: turn.flow_id.to_string(),
                step_index: turn.step_index,
            });
        }
        turns.push(turn.clone());
        Ok(())
    }

    async fn record_commit(
        &self,
        turn: &Turn,
        flow: &Flow,
        report: &FlowReport,
    ) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().unwrap();
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("disk full".to_string()));
        }
        let turns = store.turns.entry(turn.flow_id.to_string()).or_default();
        if turns.iter().any(|t| t.step_index == turn.step_index) {
            return Err(RepositoryError::DuplicateStep {
                flow_id: turn.flow_id.to_string(),
                step_index: turn.step_index,
            });
        }
        turns.push(turn.clone());
        store.flows.insert(flow.id.to_string(), flow.clone());
        store.reports.push(report.clone());
        Ok(())
    }
}

// ==================== Audit ====================

#[derive(Default)]
pub struct RecordingAuditLogger {
    pub events: Mutex<Vec<&'static str>>,
}

impl AuditLogger for RecordingAuditLogger {
    fn log(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event.event_type);
    }
}

// ==================== Fixtures ====================

pub fn case_fields() -> StoredCaseFields {
    StoredCaseFields::from_text(
        Some(r#"["productive cough", "fever 38.5"]"#.to_string()),
        Some(r#"{"crp": 48}"#.to_string()),
        Some("Smoker".to_string()),
    )
}

pub fn order_turn(step: u32, orders: &[&str], certainty: f64) -> Turn {
    let consensus = FinalConsensus {
        action: PanelAction::Order,
        rationale: "r".to_string(),
        questions: None,
        orders: Some(orders.iter().map(|o| o.to_string()).collect()),
        diagnosis: None,
        certainty,
    };
    Turn::new(FlowId::new("f"), step, fallback_output(), consensus)
}

pub fn ask_json(certainty: f64) -> String {
    format!(
        r#"{{"personas":{{}},"consensus":{{"action":"ASK","questions":["Any fever?"],"certainty":{}}}}}"#,
        certainty
    )
}

pub fn order_json(orders: &[&str], vetoed: &[&str], certainty: f64) -> String {
    serde_json::json!({
        "personas": { "stewardship": { "vetoed_tests": vetoed } },
        "consensus": { "action": "ORDER", "orders": orders, "certainty": certainty }
    })
    .to_string()
}

pub fn commit_json(diagnosis: &str, certainty: f64) -> String {
    serde_json::json!({
        "personas": {},
        "consensus": {
            "action": "COMMIT",
            "diagnosis": diagnosis,
            "rationale": "Consistent clinical picture",
            "certainty": certainty
        }
    })
    .to_string()
}
