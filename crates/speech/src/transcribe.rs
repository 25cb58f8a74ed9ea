//! Speech-to-text over an OpenAI-style transcription endpoint

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use potsbox_core::{Result, SpeechToText};

use crate::SpeechError;

// Telephone audio plus a speech model produces the occasional stray glyph;
// strip anything outside plain conversational text.
static NOISE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s,.!?'-]").unwrap());

/// Transcription backend configuration + client
pub struct HttpTranscriber {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: Option<String>,
}

impl HttpTranscriber {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
        }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/v1/audio/transcriptions",
            self.endpoint.trim_end_matches('/')
        )
    }

    async fn try_transcribe(&self, audio_wav: &[u8]) -> std::result::Result<String, SpeechError> {
        let file = Part::bytes(audio_wav.to_vec())
            .file_name("input.wav")
            .mime_str("audio/wav")
            .map_err(|e| SpeechError::Configuration(e.to_string()))?;

        let form = Form::new().part("file", file).text("model", self.model.clone());

        let mut builder = self.client.post(self.api_url()).multipart(form);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(SpeechError::Api(format!("{status}: {detail}")));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::InvalidResponse(e.to_string()))?;

        Ok(sanitize(parsed.text.as_deref().unwrap_or_default()))
    }
}

pub(crate) fn sanitize(text: &str) -> String {
    NOISE_RE.replace_all(text, "").trim().to_string()
}

#[async_trait]
impl SpeechToText for HttpTranscriber {
    async fn transcribe(&self, audio_wav: &[u8]) -> Result<String> {
        Ok(self.try_transcribe(audio_wav).await?)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("  What time is it?  "), "What time is it?");
        assert_eq!(sanitize("uh… hello ♪"), "uh hello");
        assert_eq!(sanitize("it's 5 o'clock, right!"), "it's 5 o'clock, right!");
        assert_eq!(sanitize("   "), "");
    }

    #[test]
    fn test_parse_response() {
        let parsed: TranscriptionResponse =
            serde_json::from_str(r#"{"text":"hello operator"}"#).unwrap();
        assert_eq!(parsed.text.as_deref(), Some("hello operator"));

        let parsed: TranscriptionResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(parsed.text.is_none());
    }
}
