//! Flow persistence adapters
//!
//! - [`SqliteFlowRepository`]: durable storage in a SQLite database
//! - [`InMemoryFlowRepository`]: process-local storage for one-off runs
//! - [`CaseFile`]: loads a case from a JSON file for seeding either store

mod case_file;
mod memory;
mod sqlite;

pub use case_file::{CaseFile, CaseFileError};
pub use memory::InMemoryFlowRepository;
pub use sqlite::SqliteFlowRepository;
