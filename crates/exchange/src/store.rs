//! Conversation store
//!
//! Append-only per-call turn log. The full history is kept for the call's
//! lifetime, but model calls only ever replay a bounded window of the most
//! recent turns.

use std::collections::HashMap;

use parking_lot::RwLock;

use potsbox_core::Turn;

#[derive(Default)]
pub struct ConversationStore {
    logs: RwLock<HashMap<String, Vec<Turn>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one turn to a call's log.
    pub fn append(&self, call_id: &str, turn: Turn) {
        self.logs
            .write()
            .entry(call_id.to_string())
            .or_default()
            .push(turn);
    }

    /// All turns for a call, in order.
    pub fn turns(&self, call_id: &str) -> Vec<Turn> {
        self.logs.read().get(call_id).cloned().unwrap_or_default()
    }

    /// The most recent `n` turns for a call.
    pub fn window(&self, call_id: &str, n: usize) -> Vec<Turn> {
        let logs = self.logs.read();
        match logs.get(call_id) {
            Some(turns) => turns[turns.len().saturating_sub(n)..].to_vec(),
            None => Vec::new(),
        }
    }

    /// Drop everything recorded for a call.
    pub fn purge(&self, call_id: &str) {
        self.logs.write().remove(call_id);
    }

    /// Number of turns recorded for a call.
    pub fn len(&self, call_id: &str) -> usize {
        self.logs.read().get(call_id).map_or(0, Vec::len)
    }
}
