//! The production speaker: synthesize, then deliver to the mailbox

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use potsbox_core::{Result, Speaker, TextToSpeech};

use crate::AudioMailbox;

// Models occasionally prefix replies with a speaker tag; callers should
// never hear it.
static SPEAKER_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*operator:\s*").unwrap());

/// Speaks by synthesizing into the call's audio mailbox.
pub struct TtsSpeaker {
    tts: Arc<dyn TextToSpeech>,
    mailbox: Arc<AudioMailbox>,
}

impl TtsSpeaker {
    pub fn new(tts: Arc<dyn TextToSpeech>, mailbox: Arc<AudioMailbox>) -> Self {
        Self { tts, mailbox }
    }
}

pub(crate) fn clean_for_speech(text: &str) -> String {
    SPEAKER_TAG_RE.replace(text, "").trim().to_string()
}

#[async_trait]
impl Speaker for TtsSpeaker {
    async fn say(&self, call_id: &str, voice_id: &str, text: &str) -> Result<()> {
        let line = clean_for_speech(text);
        if line.is_empty() {
            return Ok(());
        }

        tracing::info!(call_id, voice = voice_id, line = %line, "speaking");

        let audio = self.tts.synthesize(&line, voice_id).await?;
        self.mailbox.append_reply(call_id, &audio)?;
        self.mailbox.append_transcript(call_id, &line)?;
        Ok(())
    }

    async fn reset(&self, call_id: &str) -> Result<()> {
        self.mailbox.purge(call_id)?;
        Ok(())
    }
}
