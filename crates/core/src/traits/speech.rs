//! Speech processing traits

use async_trait::async_trait;

use crate::Result;

/// Speech-to-text interface
///
/// An empty transcript means silence or unintelligible audio. That is a
/// normal outcome, not an error; the dispatcher answers it with a re-prompt.
#[async_trait]
pub trait SpeechToText: Send + Sync + 'static {
    /// Transcribe a complete WAV utterance
    async fn transcribe(&self, audio_wav: &[u8]) -> Result<String>;

    /// Model name for logging
    fn model_name(&self) -> &str;
}

/// Text-to-speech interface
#[async_trait]
pub trait TextToSpeech: Send + Sync + 'static {
    /// Synthesize text to WAV bytes in the given voice
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>>;

    /// Model name for logging
    fn model_name(&self) -> &str;
}

/// The dispatcher's output seam.
///
/// Production wiring synthesizes the line and appends it to the call's
/// audio mailbox; tests record what would have been spoken.
#[async_trait]
pub trait Speaker: Send + Sync + 'static {
    /// Speak one line into the call
    async fn say(&self, call_id: &str, voice_id: &str, text: &str) -> Result<()>;

    /// Discard any audio and transcript state held for a call.
    ///
    /// Called when a call ends or a new call reuses the identifier.
    async fn reset(&self, call_id: &str) -> Result<()>;
}
