//! HTTP endpoints
//!
//! The telephony dialplan drives these: `/call/start` when a caller dials
//! an extension, `/call/reply` after each recorded utterance. Responses
//! carry the verdict token; response audio travels through the mailbox on
//! disk, not through HTTP.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use potsbox_core::Verdict;

use crate::state::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/call/start", post(call_start))
        .route("/call/reply", post(call_reply))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct StartParams {
    /// Dial code the caller entered
    #[serde(default)]
    exten: String,
    /// Call identifier; defaults to the extension for dialplans that only
    /// pass one value
    id: Option<String>,
    /// Optional caller city channel variable
    city: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyParams {
    /// Call identifier
    id: String,
}

#[derive(Debug, Serialize)]
struct VerdictResponse {
    verdict: &'static str,
}

impl From<Verdict> for VerdictResponse {
    fn from(verdict: Verdict) -> Self {
        VerdictResponse {
            verdict: verdict.as_str(),
        }
    }
}

/// Call-start event: greet (or deliver a one-shot) and report the verdict.
async fn call_start(
    State(state): State<AppState>,
    Query(params): Query<StartParams>,
) -> Json<VerdictResponse> {
    let exten = params.exten.trim();
    let call_id = match params.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id,
        _ if !exten.is_empty() => exten,
        _ => "0",
    };

    let verdict = state
        .manager
        .on_call_start(exten, call_id, params.city.as_deref())
        .await;
    Json(verdict.into())
}

/// Caller-replied event: transcribe the recording and run one turn.
///
/// A missing or unintelligible recording becomes the empty utterance; the
/// dispatcher answers silence with a re-prompt, so no failure below this
/// point reaches the telephony layer as an error.
async fn call_reply(
    State(state): State<AppState>,
    Query(params): Query<ReplyParams>,
) -> Json<VerdictResponse> {
    let call_id = params.id.trim();

    let heard = match state.mailbox.read_inbound(call_id) {
        Ok(audio) => match state.transcriber.transcribe(&audio).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(call_id, error = %err, "transcription failed");
                String::new()
            }
        },
        Err(err) => {
            tracing::warn!(call_id, error = %err, "no caller recording found");
            String::new()
        }
    };

    tracing::info!(call_id, heard = %heard, "caller utterance");

    match state.manager.on_caller_reply(call_id, &heard).await {
        Ok(verdict) => Json(verdict.into()),
        Err(err) => {
            tracing::warn!(call_id, error = %err, "reply for inactive call");
            Json(Verdict::Terminated.into())
        }
    }
}

/// Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ready",
        "active_calls": state.manager.active_calls(),
    }))
}
