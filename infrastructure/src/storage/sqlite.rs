//! SQLite flow repository.
//!
//! Tables: `cases` (raw stored clinical fields), `flows`, `turns` (one row
//! per step, primary key `(flow_id, step_index)`) and `reports`. Turn rows
//! keep the validated panel output verbatim next to the resolved consensus
//! columns.
//!
//! rusqlite is blocking, so every port call runs on tokio's blocking pool
//! against a shared connection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use panel_application::{FlowRepository, RepositoryError};
use panel_domain::{
    CaseId, FinalConsensus, Flow, FlowId, FlowReport, FlowStatus, PanelAction, PanelOutput,
    StoredCaseFields, Turn,
};
use rusqlite::{Connection, OptionalExtension, ffi, params};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    "CREATE TABLE IF NOT EXISTS schema_version (
         version INTEGER PRIMARY KEY,
         applied_at TEXT NOT NULL DEFAULT (datetime('now'))
     );
     CREATE TABLE IF NOT EXISTS cases (
         case_id TEXT PRIMARY KEY,
         symptoms TEXT,
         labs TEXT,
         history TEXT
     );
     CREATE TABLE IF NOT EXISTS flows (
         flow_id TEXT PRIMARY KEY,
         case_id TEXT NOT NULL,
         status TEXT NOT NULL DEFAULT 'running',
         created_at TEXT NOT NULL,
         finished_at TEXT
     );
     CREATE TABLE IF NOT EXISTS turns (
         flow_id TEXT NOT NULL REFERENCES flows(flow_id),
         step_index INTEGER NOT NULL,
         panel_json TEXT NOT NULL,
         action TEXT NOT NULL,
         questions_json TEXT,
         orders_json TEXT,
         diagnosis_json TEXT,
         certainty REAL NOT NULL,
         rationale TEXT NOT NULL,
         created_at TEXT NOT NULL,
         PRIMARY KEY (flow_id, step_index)
     );
     CREATE TABLE IF NOT EXISTS reports (
         id INTEGER PRIMARY KEY AUTOINCREMENT,
         flow_id TEXT NOT NULL REFERENCES flows(flow_id),
         case_id TEXT NOT NULL,
         task_type TEXT NOT NULL,
         model_name TEXT NOT NULL,
         output_md TEXT NOT NULL,
         created_at TEXT NOT NULL
     );
     INSERT INTO schema_version (version) VALUES (1);",
)];

fn storage(e: rusqlite::Error) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

fn corrupt(what: &str, e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Corrupt(format!("{}: {}", what, e))
}

/// Primary-key clash on `(flow_id, step_index)`; foreign-key failures are not duplicates.
fn is_duplicate_key(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn poisoned() -> RepositoryError {
    RepositoryError::Storage("connection lock poisoned".to_string())
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| corrupt("timestamp", e))
}

/// Stored text for a case field: strings as-is, structured values as JSON.
fn field_text(value: &Option<Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

/// SQLite-backed [`FlowRepository`]
pub struct SqliteFlowRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteFlowRepository {
    /// Open a database file and run migrations
    pub fn open(path: &Path) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path).map_err(storage)?;
        Self::init(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(storage)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn.lock().map_err(|_| poisoned())
    }

    /// Run `f` on the blocking pool with exclusive use of the connection.
    async fn blocking<T, F>(&self, f: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, RepositoryError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| poisoned())?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| RepositoryError::Storage(format!("storage task failed: {}", e)))?
    }

    /// Insert or replace a case record
    pub fn upsert_case(
        &self,
        case_id: &CaseId,
        fields: &StoredCaseFields,
    ) -> Result<(), RepositoryError> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO cases (case_id, symptoms, labs, history)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    case_id.as_str(),
                    field_text(&fields.symptoms),
                    field_text(&fields.labs),
                    field_text(&fields.history),
                ],
            )
            .map_err(storage)?;
        Ok(())
    }

    /// Number of reports written for a flow
    pub fn count_reports(&self, flow_id: &FlowId) -> Result<i64, RepositoryError> {
        self.conn()?
            .query_row(
                "SELECT COUNT(*) FROM reports WHERE flow_id = ?1",
                params![flow_id.as_str()],
                |row| row.get(0),
            )
            .map_err(storage)
    }
}

/// Run all pending migrations
fn run_migrations(conn: &Connection) -> Result<(), RepositoryError> {
    let current: i64 = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i64>>(0)
        })
        .ok()
        .flatten()
        .unwrap_or(0);

    for (version, sql) in MIGRATIONS {
        if *version > current {
            info!("Running migration v{}", version);
            conn.execute_batch(sql).map_err(|e| {
                RepositoryError::Storage(format!("migration v{} failed: {}", version, e))
            })?;
        }
    }
    Ok(())
}

struct TurnRow {
    flow_id: String,
    step_index: u32,
    panel_json: String,
    action: String,
    questions_json: Option<String>,
    orders_json: Option<String>,
    diagnosis_json: Option<String>,
    certainty: f64,
    rationale: String,
    created_at: String,
}

fn turn_from_row(row: TurnRow) -> Result<Turn, RepositoryError> {
    let panel_output: PanelOutput =
        serde_json::from_str(&row.panel_json).map_err(|e| corrupt("panel_json", e))?;
    let action: PanelAction = row.action.parse().map_err(|e: String| corrupt("action", e))?;

    let list = |raw: Option<String>, what: &str| -> Result<Option<Vec<String>>, RepositoryError> {
        raw.map(|text| serde_json::from_str(&text).map_err(|e| corrupt(what, e)))
            .transpose()
    };
    let diagnosis = row
        .diagnosis_json
        .map(|text| {
            let value: Value = serde_json::from_str(&text).map_err(|e| corrupt("diagnosis_json", e))?;
            Ok::<_, RepositoryError>(
                value
                    .get("diagnosis")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            )
        })
        .transpose()?;

    Ok(Turn {
        flow_id: FlowId::new(row.flow_id),
        step_index: row.step_index,
        panel_output,
        consensus: FinalConsensus {
            action,
            rationale: row.rationale,
            questions: list(row.questions_json, "questions_json")?,
            orders: list(row.orders_json, "orders_json")?,
            diagnosis,
            certainty: row.certainty,
        },
        created_at: parse_time(&row.created_at)?,
    })
}

fn insert_turn_row(conn: &Connection, turn: &Turn) -> Result<(), RepositoryError> {
    let consensus = &turn.consensus;
    let panel_json =
        serde_json::to_string(&turn.panel_output).map_err(|e| corrupt("panel_json", e))?;
    let to_json = |v: &Option<Vec<String>>| v.as_ref().map(|list| json!(list).to_string());

    let result = conn.execute(
        "INSERT INTO turns (flow_id, step_index, panel_json, action, questions_json,
                            orders_json, diagnosis_json, certainty, rationale, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            turn.flow_id.as_str(),
            turn.step_index,
            panel_json,
            consensus.action.as_str(),
            to_json(&consensus.questions),
            to_json(&consensus.orders),
            consensus
                .diagnosis
                .as_ref()
                .map(|d| json!({ "diagnosis": d }).to_string()),
            consensus.certainty,
            consensus.rationale,
            turn.created_at.to_rfc3339(),
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(e) if is_duplicate_key(&e) => Err(RepositoryError::DuplicateStep {
            flow_id: turn.flow_id.to_string(),
            step_index: turn.step_index,
        }),
        Err(e) => Err(storage(e)),
    }
}

fn select_turns(conn: &Connection, flow_id: &str) -> Result<Vec<Turn>, RepositoryError> {
    let mut stmt = conn
        .prepare(
            "SELECT flow_id, step_index, panel_json, action, questions_json, orders_json,
                    diagnosis_json, certainty, rationale, created_at
             FROM turns WHERE flow_id = ?1 ORDER BY step_index ASC",
        )
        .map_err(storage)?;

    let rows = stmt
        .query_map(params![flow_id], |row| {
            Ok(TurnRow {
                flow_id: row.get(0)?,
                step_index: row.get(1)?,
                panel_json: row.get(2)?,
                action: row.get(3)?,
                questions_json: row.get(4)?,
                orders_json: row.get(5)?,
                diagnosis_json: row.get(6)?,
                certainty: row.get(7)?,
                rationale: row.get(8)?,
                created_at: row.get(9)?,
            })
        })
        .map_err(storage)?;

    let mut turns = Vec::new();
    for row in rows {
        turns.push(turn_from_row(row.map_err(storage)?)?);
    }
    Ok(turns)
}

fn select_flow(conn: &Connection, flow_id: FlowId) -> Result<Option<Flow>, RepositoryError> {
    let row = conn
        .query_row(
            "SELECT case_id, status, created_at, finished_at FROM flows WHERE flow_id = ?1",
            params![flow_id.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )
        .optional()
        .map_err(storage)?;

    let Some((case_id, status, created_at, finished_at)) = row else {
        return Ok(None);
    };

    Ok(Some(Flow {
        id: flow_id,
        case_id: CaseId::new(case_id),
        status: status
            .parse::<FlowStatus>()
            .map_err(|e| corrupt("status", e))?,
        created_at: parse_time(&created_at)?,
        finished_at: finished_at.as_deref().map(parse_time).transpose()?,
    }))
}

#[async_trait]
impl FlowRepository for SqliteFlowRepository {
    async fn load_case(
        &self,
        case_id: &CaseId,
    ) -> Result<Option<StoredCaseFields>, RepositoryError> {
        let case_id = case_id.clone();
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT symptoms, labs, history FROM cases WHERE case_id = ?1",
                params![case_id.as_str()],
                |row| {
                    Ok(StoredCaseFields::from_text(
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                    ))
                },
            )
            .optional()
            .map_err(storage)
        })
        .await
    }

    async fn insert_flow(&self, flow: &Flow) -> Result<(), RepositoryError> {
        let flow = flow.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO flows (flow_id, case_id, status, created_at, finished_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    flow.id.as_str(),
                    flow.case_id.as_str(),
                    flow.status.as_str(),
                    flow.created_at.to_rfc3339(),
                    flow.finished_at.map(|t| t.to_rfc3339()),
                ],
            )
            .map_err(storage)?;
            Ok(())
        })
        .await
    }

    async fn get_flow(&self, flow_id: &FlowId) -> Result<Option<Flow>, RepositoryError> {
        let flow_id = flow_id.clone();
        self.blocking(move |conn| select_flow(conn, flow_id)).await
    }

    async fn list_turns(&self, flow_id: &FlowId) -> Result<Vec<Turn>, RepositoryError> {
        let flow_id = flow_id.clone();
        self.blocking(move |conn| select_turns(conn, flow_id.as_str()))
            .await
    }

    async fn insert_turn(&self, turn: &Turn) -> Result<(), RepositoryError> {
        let turn = turn.clone();
        self.blocking(move |conn| insert_turn_row(conn, &turn)).await
    }

    async fn record_commit(
        &self,
        turn: &Turn,
        flow: &Flow,
        report: &FlowReport,
    ) -> Result<(), RepositoryError> {
        let (turn, flow, report) = (turn.clone(), flow.clone(), report.clone());
        self.blocking(move |conn| {
            let tx = conn.transaction().map_err(storage)?;

            let updated = tx
                .execute(
                    "UPDATE flows SET status = ?1, finished_at = ?2 WHERE flow_id = ?3",
                    params![
                        flow.status.as_str(),
                        flow.finished_at.map(|t| t.to_rfc3339()),
                        flow.id.as_str(),
                    ],
                )
                .map_err(storage)?;
            if updated == 0 {
                return Err(RepositoryError::FlowNotFound(flow.id.to_string()));
            }

            insert_turn_row(&tx, &turn)?;

            tx.execute(
                "INSERT INTO reports (flow_id, case_id, task_type, model_name, output_md, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    report.flow_id.as_str(),
                    report.case_id.as_str(),
                    report.task_type,
                    report.model_name,
                    report.markdown,
                    report.created_at.to_rfc3339(),
                ],
            )
            .map_err(storage)?;

            tx.commit().map_err(storage)
        })
        .await
    }
}
