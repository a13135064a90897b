//! Patient case input

pub mod snapshot;

pub use snapshot::{CaseField, CaseSnapshot, CaseState, SnapshotAnomaly, StoredCaseFields};
