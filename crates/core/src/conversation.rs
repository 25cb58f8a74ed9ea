//! Conversation turns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role in a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// The person on the line
    Caller,
    /// The service answering the extension
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::Caller => "caller",
            TurnRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single turn in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Who spoke
    pub role: TurnRole,
    /// Spoken or transcribed content
    pub text: String,
    /// When the turn occurred
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a new turn
    pub fn new(role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a caller turn
    pub fn caller(text: impl Into<String>) -> Self {
        Self::new(TurnRole::Caller, text)
    }

    /// Create an assistant turn
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, text)
    }
}
