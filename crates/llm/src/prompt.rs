//! Prompt assembly helpers
//!
//! The exchange replays a bounded window of the conversation into each
//! model call as a single user message, rendered here.

use potsbox_core::{Turn, TurnRole};

/// Render a conversation window as plain text.
pub fn context_block(turns: &[Turn]) -> String {
    if turns.is_empty() {
        return "No prior conversation.".to_string();
    }

    turns
        .iter()
        .map(|t| match t.role {
            TurnRole::Caller => format!("Caller: {}", t.text),
            TurnRole::Assistant => format!("Operator: {}", t.text),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The user message for one conversational turn.
pub fn caller_message(context: &str, heard: &str) -> String {
    format!("Conversation so far:\n{context}\n\nCaller:\n{heard}")
}
