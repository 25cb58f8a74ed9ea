//! Shared application state

use std::sync::Arc;

use potsbox_core::SpeechToText;
use potsbox_exchange::CallSessionManager;
use potsbox_speech::AudioMailbox;

#[derive(Clone)]
pub struct AppState {
    /// Owns every active call
    pub manager: Arc<CallSessionManager>,
    /// Transcribes recorded caller audio
    pub transcriber: Arc<dyn SpeechToText>,
    /// Per-call audio files shared with the telephony layer
    pub mailbox: Arc<AudioMailbox>,
}
