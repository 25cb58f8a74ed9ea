//! Call sessions and their manager
//!
//! One `CallSession` per active phone call, threaded explicitly through the
//! dispatcher; there is no process-wide current call, so concurrent calls
//! on different channels never touch each other's state. The per-session
//! async mutex enforces the one-turn-in-flight rule: a caller utterance is
//! fully dispatched before the next one for the same call is accepted.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use potsbox_config::ServiceName;
use potsbox_core::Verdict;

use crate::dispatcher::TurnDispatcher;
use crate::ExchangeError;

/// Mutable per-call state
#[derive(Debug, Clone)]
pub struct CallSession {
    /// Unique per-call identifier from the telephony layer
    pub call_id: String,
    /// Dial code the caller entered
    pub extension: String,
    /// Caller's city for location-aware capabilities
    pub city: String,
    /// Currently active service; changes only at call start or via a
    /// confident intent switch
    pub service: ServiceName,
    /// Whether the opener has been spoken for this activation
    pub greeted: bool,
    /// Dispatched caller utterances so far
    pub turn_index: u64,
    /// Forces the next verdict to be a hangup
    pub ended: bool,
}

impl CallSession {
    pub fn new(
        call_id: impl Into<String>,
        extension: impl Into<String>,
        city: impl Into<String>,
        service: ServiceName,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            extension: extension.into(),
            city: city.into(),
            service,
            greeted: false,
            turn_index: 0,
            ended: false,
        }
    }

    /// Activate a different service. Clears the greeting guard so the new
    /// service's opener can be spoken once.
    pub fn switch_to(&mut self, service: ServiceName) {
        self.service = service;
        self.greeted = false;
    }
}

/// Owns every active call and translates dispatcher verdicts for the
/// telephony layer.
pub struct CallSessionManager {
    sessions: RwLock<HashMap<String, Arc<Mutex<CallSession>>>>,
    dispatcher: Arc<TurnDispatcher>,
    default_city: String,
}

impl CallSessionManager {
    pub fn new(dispatcher: Arc<TurnDispatcher>, default_city: impl Into<String>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            dispatcher,
            default_city: default_city.into(),
        }
    }

    /// Handle a call-start event: resolve the extension, purge anything a
    /// previous call left under this id, and run the opener path.
    pub async fn on_call_start(
        &self,
        extension: &str,
        call_id: &str,
        city: Option<&str>,
    ) -> Verdict {
        tracing::info!(extension, call_id, "incoming call");

        // A reused call id means the previous call on this channel is over.
        self.sessions.write().remove(call_id);
        self.dispatcher.reset_call(call_id).await;

        let service = self.dispatcher.catalog.resolve(extension).name;
        let city = match city {
            Some(c) if !c.trim().is_empty() => c,
            _ => self.default_city.as_str(),
        };
        let mut session = CallSession::new(call_id, extension, city, service);

        let verdict = self.dispatcher.open(&mut session).await;

        if verdict.is_terminated() {
            self.dispatcher.end_call(call_id);
        } else {
            self.sessions
                .write()
                .insert(call_id.to_string(), Arc::new(Mutex::new(session)));
        }

        tracing::info!(call_id, service = %service, verdict = %verdict, "call opened");
        verdict
    }

    /// Handle a caller-replied event: one full turn through the dispatcher.
    pub async fn on_caller_reply(
        &self,
        call_id: &str,
        heard: &str,
    ) -> Result<Verdict, ExchangeError> {
        let session = self
            .sessions
            .read()
            .get(call_id)
            .cloned()
            .ok_or_else(|| ExchangeError::UnknownCall(call_id.to_string()))?;

        let mut guard = session.lock().await;
        let verdict = self.dispatcher.dispatch(&mut guard, heard).await;
        drop(guard);

        if verdict.is_terminated() {
            self.sessions.write().remove(call_id);
            self.dispatcher.end_call(call_id);
            tracing::info!(call_id, "call torn down");
        }

        Ok(verdict)
    }

    /// Number of calls currently holding a session.
    pub fn active_calls(&self) -> usize {
        self.sessions.read().len()
    }
}
