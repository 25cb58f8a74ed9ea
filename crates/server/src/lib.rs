//! Exchange server
//!
//! HTTP endpoints the telephony layer calls: one on call start, one each
//! time the caller has said something. Both answer with the continuation
//! verdict.

pub mod http;
pub mod state;

pub use http::create_router;
pub use state::AppState;
