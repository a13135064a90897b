//! Reasoning oracle port
//!
//! The oracle is an opaque text generator. It is asked to emit panel JSON
//! but may return anything; the domain layer copes with that. Only the call
//! itself failing is an error here.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Transient failures of the external oracle call
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Request failed with status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Timeout")]
    Timeout,

    #[error("Malformed response envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Gateway to the text-generation capability
///
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    /// Generate raw text for a system instruction and a structured user payload.
    async fn generate(
        &self,
        system_instruction: &str,
        user_payload: &Value,
        temperature: f64,
    ) -> Result<String, OracleError>;

    /// Model name recorded on reports
    fn model_name(&self) -> &str;
}
