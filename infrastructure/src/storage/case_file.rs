//! Case files
//!
//! A case file is a JSON document holding one case's stored fields:
//!
//! ```json
//! { "id": "case-42", "symptoms": ["cough"], "labs": "{\"crp\": 48}", "history": "Smoker" }
//! ```
//!
//! Fields may be JSON values or JSON-encoded strings; they are kept as-is
//! and canonicalised later by the case snapshot.

use panel_domain::{CaseId, StoredCaseFields};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading a case file
#[derive(Error, Debug)]
pub enum CaseFileError {
    #[error("Failed to read case file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid case file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
struct RawCaseFile {
    id: Option<String>,
    symptoms: Option<Value>,
    labs: Option<Value>,
    history: Option<Value>,
}

/// A case loaded from disk
#[derive(Debug, Clone, PartialEq)]
pub struct CaseFile {
    pub case_id: CaseId,
    pub fields: StoredCaseFields,
}

impl CaseFile {
    /// Read a case file; without an `id` the file stem names the case.
    pub fn load(path: &Path) -> Result<Self, CaseFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| CaseFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawCaseFile =
            serde_json::from_str(&text).map_err(|source| CaseFileError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let case_id = raw
            .id
            .filter(|id| !id.trim().is_empty())
            .or_else(|| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "case".to_string());

        Ok(Self {
            case_id: CaseId::new(case_id),
            fields: StoredCaseFields {
                symptoms: raw.symptoms,
                labs: raw.labs,
                history: raw.history,
            },
        })
    }
}
