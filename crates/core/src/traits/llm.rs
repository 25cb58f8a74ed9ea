//! Language model trait

use async_trait::async_trait;

use crate::{GenerateRequest, Result};

/// Language model interface
///
/// Implementations:
/// - `ChatBackend` - OpenAI-style chat completions endpoint
///
/// The dispatcher treats this as a pure function from messages to text.
/// Implementations own their timeouts and retries; a call returns a value
/// or an error, it never hangs the turn indefinitely.
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Generate a completion for the request.
    ///
    /// When `request.json_output` is set the returned text is expected to be
    /// a JSON object; callers treat anything else as a parse failure, not an
    /// error from this method.
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;

    /// Model name for logging
    fn model_name(&self) -> &str;

    /// Check whether the backend is reachable
    async fn is_available(&self) -> bool;
}
