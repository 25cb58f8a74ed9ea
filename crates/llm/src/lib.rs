//! Language model integration
//!
//! One backend: an OpenAI-style chat completions endpoint, with bounded
//! retry on transient failures. The dispatcher only ever sees the
//! `LanguageModel` trait from core.

pub mod backend;
pub mod prompt;

pub use backend::{ChatBackend, ChatConfig};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<LlmError> for potsbox_core::Error {
    fn from(err: LlmError) -> Self {
        potsbox_core::Error::Llm(err.to_string())
    }
}
