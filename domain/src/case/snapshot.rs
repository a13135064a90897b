//! Case snapshot building
//!
//! Stored clinical fields come from several producers with inconsistent
//! conventions: a field may be absent, a plain string, a JSON-encoded string,
//! an array or an object. [`CaseSnapshot::build`] turns all of them into a
//! [`CaseState`] whose three fields are always sequences. Nothing here fails;
//! unexpected shapes are degraded and reported as [`SnapshotAnomaly`] so the
//! caller can log them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw case fields as held by the case store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredCaseFields {
    pub symptoms: Option<Value>,
    pub labs: Option<Value>,
    pub history: Option<Value>,
}

impl StoredCaseFields {
    /// Convenience constructor for text columns
    pub fn from_text(
        symptoms: Option<String>,
        labs: Option<String>,
        history: Option<String>,
    ) -> Self {
        Self {
            symptoms: symptoms.map(Value::String),
            labs: labs.map(Value::String),
            history: history.map(Value::String),
        }
    }
}

/// Canonical input to one reasoning turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseState {
    pub complaints: Vec<Value>,
    pub labs: Vec<Value>,
    pub history: Vec<Value>,
}

impl CaseState {
    pub fn is_empty(&self) -> bool {
        self.complaints.is_empty() && self.labs.is_empty() && self.history.is_empty()
    }
}

/// Which stored field an anomaly came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseField {
    Symptoms,
    Labs,
    History,
}

impl CaseField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseField::Symptoms => "symptoms",
            CaseField::Labs => "labs",
            CaseField::History => "history",
        }
    }
}

/// A stored value that did not have the expected shape
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotAnomaly {
    pub field: CaseField,
    pub detail: String,
}

impl std::fmt::Display for SnapshotAnomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field.as_str(), self.detail)
    }
}

/// A built case state plus whatever had to be degraded on the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseSnapshot {
    pub state: CaseState,
    pub anomalies: Vec<SnapshotAnomaly>,
}

impl CaseSnapshot {
    pub fn build(fields: &StoredCaseFields) -> Self {
        let mut anomalies = Vec::new();
        let mut field = |which: CaseField, value: &Option<Value>| {
            let (items, anomaly) = to_sequence(value.as_ref());
            if let Some(detail) = anomaly {
                anomalies.push(SnapshotAnomaly {
                    field: which,
                    detail,
                });
            }
            items
        };

        let state = CaseState {
            complaints: field(CaseField::Symptoms, &fields.symptoms),
            labs: field(CaseField::Labs, &fields.labs),
            history: field(CaseField::History, &fields.history),
        };

        Self { state, anomalies }
    }
}

fn to_sequence(value: Option<&Value>) -> (Vec<Value>, Option<String>) {
    match value {
        None | Some(Value::Null) => (Vec::new(), None),
        Some(Value::Array(items)) => (items.clone(), None),
        Some(Value::String(text)) => from_text(text),
        Some(other) => (vec![other.clone()], None),
    }
}

fn from_text(text: &str) -> (Vec<Value>, Option<String>) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return (Vec::new(), None);
    }
    if !(trimmed.starts_with('[') || trimmed.starts_with('{')) {
        return (vec![Value::String(trimmed.to_string())], None);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => (items, None),
        Ok(Value::Null) => (Vec::new(), None),
        Ok(parsed) => (vec![parsed], None),
        Err(e) => (
            vec![Value::String(trimmed.to_string())],
            Some(format!("unparseable JSON kept as text ({})", e)),
        ),
    }
}
