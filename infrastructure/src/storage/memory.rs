//! In-memory flow repository, used when no database is configured.

use async_trait::async_trait;
use panel_application::{FlowRepository, RepositoryError};
use panel_domain::{CaseId, Flow, FlowId, FlowReport, StoredCaseFields, Turn};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    cases: HashMap<CaseId, StoredCaseFields>,
    flows: HashMap<FlowId, Flow>,
    turns: HashMap<FlowId, Vec<Turn>>,
    reports: Vec<FlowReport>,
}

/// Process-local [`FlowRepository`]; nothing survives the process.
#[derive(Default)]
pub struct InMemoryFlowRepository {
    tables: Mutex<Tables>,
}

impl InMemoryFlowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Storage("repository lock poisoned".to_string()))
    }

    /// Insert or replace a case record
    pub fn upsert_case(
        &self,
        case_id: CaseId,
        fields: StoredCaseFields,
    ) -> Result<(), RepositoryError> {
        self.tables()?.cases.insert(case_id, fields);
        Ok(())
    }

    /// Reports written so far
    pub fn reports(&self) -> Result<Vec<FlowReport>, RepositoryError> {
        Ok(self.tables()?.reports.clone())
    }
}

#[async_trait]
impl FlowRepository for InMemoryFlowRepository {
    async fn load_case(
        &self,
        case_id: &CaseId,
    ) -> Result<Option<StoredCaseFields>, RepositoryError> {
        Ok(self.tables()?.cases.get(case_id).cloned())
    }

    async fn insert_flow(&self, flow: &Flow) -> Result<(), RepositoryError> {
        self.tables()?.flows.insert(flow.id.clone(), flow.clone());
        Ok(())
    }

    async fn get_flow(&self, flow_id: &FlowId) -> Result<Option<Flow>, RepositoryError> {
        Ok(self.tables()?.flows.get(flow_id).cloned())
    }

    async fn list_turns(&self, flow_id: &FlowId) -> Result<Vec<Turn>, RepositoryError> {
        let mut turns = self
            .tables()?
            .turns
            .get(flow_id)
            .cloned()
            .unwrap_or_default();
        turns.sort_by_key(|t| t.step_index);
        Ok(turns)
    }

    async fn insert_turn(&self, turn: &Turn) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let turns = tables.turns.entry(turn.flow_id.clone()).or_default();
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
        let mut tables = self.tables()?;
        if !tables.flows.contains_key(&flow.id) {
            return Err(RepositoryError::FlowNotFound(flow.id.to_string()));
        }
        let turns = tables.turns.entry(turn.flow_id.clone()).or_default();
        if turns.iter().any(|t| t.step_index == turn.step_index) {
            return Err(RepositoryError::DuplicateStep {
                flow_id: turn.flow_id.to_string(),
                step_index: turn.step_index,
            });
        }
        turns.push(turn.clone());
        tables.flows.insert(flow.id.clone(), flow.clone());
        tables.reports.push(report.clone());
        Ok(())
    }
}
