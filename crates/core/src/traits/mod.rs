//! Traits for pluggable backends

pub mod capability;
pub mod llm;
pub mod speech;

pub use capability::CapabilityFetcher;
pub use llm::LanguageModel;
pub use speech::{Speaker, SpeechToText, TextToSpeech};
