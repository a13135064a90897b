//! OpenAI-compatible chat-completions oracle.
//!
//! One oracle call is one `POST {endpoint}/chat/completions` with a system
//! message and the user payload serialized to a JSON string. The reply text
//! is returned untouched; an envelope without content yields `"{}"`, which
//! the panel treats like any other unusable output.

use async_trait::async_trait;
use panel_application::{OracleError, ReasoningOracle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Text returned when the response envelope carries no content
pub const EMPTY_CONTENT: &str = "{}";

/// Connection settings for [`OpenAiOracle`]
#[derive(Debug, Clone)]
pub struct OpenAiOracleConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub json_mode: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// `choices[0].message.content`, or [`EMPTY_CONTENT`] when absent.
pub fn extract_content(body: &str) -> Result<String, OracleError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| OracleError::MalformedEnvelope(e.to_string()))?;

    Ok(response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .unwrap_or_else(|| EMPTY_CONTENT.to_string()))
}

/// Reasoning oracle backed by an OpenAI-compatible HTTP API
pub struct OpenAiOracle {
    client: reqwest::Client,
    config: OpenAiOracleConfig,
}

impl OpenAiOracle {
    pub fn new(config: OpenAiOracleConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::ConnectionError(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }

    fn request<'a>(
        &'a self,
        system_instruction: &str,
        user_payload: &Value,
        temperature: f64,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            temperature,
            response_format: self
                .config
                .json_mode
                .then_some(ResponseFormat { kind: "json_object" }),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_instruction.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_payload.to_string(),
                },
            ],
        }
    }
}

#[async_trait]
impl ReasoningOracle for OpenAiOracle {
    async fn generate(
        &self,
        system_instruction: &str,
        user_payload: &Value,
        temperature: f64,
    ) -> Result<String, OracleError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            OracleError::MissingCredentials("API key required for chat completions".to_string())
        })?;

        let body = self.request(system_instruction, user_payload, temperature);
        let response = self
            .client
            .post(self.url())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout
                } else {
                    OracleError::ConnectionError(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout
            } else {
                OracleError::ConnectionError(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(OracleError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        debug!("Oracle replied with {} bytes", text.len());
        extract_content(&text)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
