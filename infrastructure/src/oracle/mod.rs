//! Reasoning oracle adapters

mod openai;

pub use openai::{EMPTY_CONTENT, OpenAiOracle, OpenAiOracleConfig, extract_content};
