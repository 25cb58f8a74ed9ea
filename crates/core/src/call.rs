//! Per-call context and the continuation verdict

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Context for one call, threaded explicitly through fetchers and templates.
///
/// There is no process-wide "current call"; everything that needs to know
/// about the call receives one of these.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Unique per-call identifier
    pub call_id: String,
    /// Dial code the caller entered
    pub extension: String,
    /// Caller's city, for location-aware capabilities
    pub city: String,
    /// Caller-local wall clock time
    pub now: NaiveDateTime,
}

impl CallContext {
    pub fn new(
        call_id: impl Into<String>,
        extension: impl Into<String>,
        city: impl Into<String>,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            extension: extension.into(),
            city: city.into(),
            now,
        }
    }
}

/// The two-valued continuation verdict the telephony layer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Keep the line open and record the next caller utterance
    Continue,
    /// Tear the call down
    Terminated,
}

impl Verdict {
    /// Token sent back to the telephony layer
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Continue => "listen",
            Verdict::Terminated => "hangup",
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, Verdict::Terminated)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
