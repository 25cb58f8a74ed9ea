//! The call session / turn dispatcher
//!
//! This crate is the exchange's decision logic: who answers an extension,
//! how a caller utterance becomes a spoken reply, when the caller is routed
//! to a different service, and when the call ends versus keeps listening.

pub mod dispatcher;
pub mod handlers;
pub mod intent;
pub mod session;
pub mod store;

pub use dispatcher::{DispatcherConfig, TurnDispatcher};
pub use handlers::HandlerFlow;
pub use intent::{IntentAction, IntentClassifier, IntentResult};
pub use session::{CallSession, CallSessionManager};
pub use store::ConversationStore;

use thiserror::Error;

/// Exchange errors surfaced to the transport layer
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("no active call with id {0}")]
    UnknownCall(String),
}
