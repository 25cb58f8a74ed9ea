//! Core traits and types for the telephone exchange
//!
//! This crate provides foundational types used across all other crates:
//! - Conversation turns and the continuation verdict
//! - Per-call context threaded through fetchers and templates
//! - Calendar math for the almanac placeholders
//! - The token substitution engine
//! - LLM message types
//! - Core traits for pluggable backends (LLM, speech, capabilities)
//! - Error types

pub mod almanac;
pub mod call;
pub mod conversation;
pub mod error;
pub mod llm_types;
pub mod tokens;
pub mod traits;

pub use call::{CallContext, Verdict};
pub use conversation::{Turn, TurnRole};
pub use error::{Error, Result};
pub use llm_types::{GenerateRequest, Message, Role, SamplingParams};
pub use tokens::{FieldMap, TokenError};

pub use traits::{CapabilityFetcher, LanguageModel, Speaker, SpeechToText, TextToSpeech};
