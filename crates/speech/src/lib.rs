//! Speech processing
//!
//! HTTP implementations of the speech traits, the per-call audio mailbox
//! the telephony layer reads from, and the production `Speaker`.

pub mod mailbox;
pub mod speaker;
pub mod synthesize;
pub mod transcribe;

pub use mailbox::AudioMailbox;
pub use speaker::TtsSpeaker;
pub use synthesize::HttpSynthesizer;
pub use transcribe::HttpTranscriber;

use thiserror::Error;

/// Speech errors
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Audio file error: {0}")]
    Audio(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for SpeechError {
    fn from(err: reqwest::Error) -> Self {
        SpeechError::Network(err.to_string())
    }
}

impl From<hound::Error> for SpeechError {
    fn from(err: hound::Error) -> Self {
        SpeechError::Audio(err.to_string())
    }
}

impl From<SpeechError> for potsbox_core::Error {
    fn from(err: SpeechError) -> Self {
        potsbox_core::Error::Speech(err.to_string())
    }
}
