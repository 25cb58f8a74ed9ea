//! Intent classification
//!
//! One structured-output model call mapping free caller speech onto the
//! closed set of switch actions. Parsing failures are an expected outcome
//! with an explicit result type, not an exception path: anything the model
//! returns that does not conform becomes the chat fallback at confidence
//! zero, and the dispatcher carries on.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use potsbox_config::ServiceName;
use potsbox_core::{GenerateRequest, LanguageModel, Message, SamplingParams};

/// What the classifier decided
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntentAction {
    /// Route the caller to a different service
    Switch(ServiceName),
    /// Keep chatting on the current line
    Chat,
}

/// Classifier output, confidence always in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntentResult {
    pub action: IntentAction,
    pub confidence: f32,
}

impl IntentResult {
    /// The safe default when the model output is unusable.
    pub fn fallback() -> Self {
        Self {
            action: IntentAction::Chat,
            confidence: 0.0,
        }
    }
}

/// Why a classifier reply could not be used
#[derive(Error, Debug)]
pub enum IntentParseError {
    #[error("not a JSON object: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing action field")]
    MissingAction,

    #[error("unrecognized action: {0}")]
    UnknownAction(String),
}

#[derive(Deserialize)]
struct WireIntent {
    action: Option<String>,
    confidence: Option<serde_json::Value>,
}

/// Parse a raw classifier reply.
pub fn parse_intent(raw: &str) -> Result<IntentResult, IntentParseError> {
    let wire: WireIntent = serde_json::from_str(raw)?;

    let label = wire
        .action
        .ok_or(IntentParseError::MissingAction)?
        .trim()
        .to_uppercase();

    let action = if label == "OPERATOR_CHAT" {
        IntentAction::Chat
    } else {
        ServiceName::from_action_label(&label)
            .map(IntentAction::Switch)
            .ok_or(IntentParseError::UnknownAction(label))?
    };

    Ok(IntentResult {
        action,
        confidence: clamp_confidence(wire.confidence),
    })
}

fn clamp_confidence(value: Option<serde_json::Value>) -> f32 {
    let raw = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if raw.is_finite() {
        raw.clamp(0.0, 1.0) as f32
    } else {
        0.0
    }
}

/// Thin wrapper asking the model which line the caller wants.
pub struct IntentClassifier {
    llm: Arc<dyn LanguageModel>,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    fn system_prompt() -> String {
        let mut prompt = String::from(
            "You are a telephone exchange controller.\nDecide the caller's intent.\n\nActions:\n",
        );
        for name in ServiceName::ALL {
            if let Some(label) = name.action_label() {
                prompt.push_str("- ");
                prompt.push_str(label);
                prompt.push('\n');
            }
        }
        prompt.push_str(
            "- OPERATOR_CHAT\n\nReturn JSON only:\n{ \"action\": string, \"confidence\": number }",
        );
        prompt
    }

    /// Classify a caller utterance. Never fails; unusable model output
    /// degrades to the chat fallback at confidence zero.
    pub async fn classify(&self, heard: &str) -> IntentResult {
        let request = GenerateRequest::new(
            vec![
                Message::system(Self::system_prompt()),
                Message::user(heard),
            ],
            SamplingParams {
                temperature: 0.0,
                max_tokens: 40,
            },
        )
        .json();

        match self.llm.generate(&request).await {
            Ok(raw) => parse_intent(&raw).unwrap_or_else(|err| {
                tracing::debug!(error = %err, raw = %raw, "intent reply did not parse");
                IntentResult::fallback()
            }),
            Err(err) => {
                tracing::warn!(error = %err, "intent classification call failed");
                IntentResult::fallback()
            }
        }
    }
}
