//! Text-to-speech over an OpenAI-style speech endpoint

use async_trait::async_trait;
use serde::Serialize;

use potsbox_core::{Result, TextToSpeech};

use crate::SpeechError;

/// Synthesis backend configuration + client
pub struct HttpSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'static str,
}

impl HttpSynthesizer {
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
        format!("{}/v1/audio/speech", self.endpoint.trim_end_matches('/'))
    }

    async fn try_synthesize(
        &self,
        text: &str,
        voice_id: &str,
    ) -> std::result::Result<Vec<u8>, SpeechError> {
        let body = SpeechRequest {
            model: &self.model,
            voice: voice_id,
            input: text,
            response_format: "wav",
        };

        let mut builder = self.client.post(self.api_url()).json(&body);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(SpeechError::Api(format!("{status}: {detail}")));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(SpeechError::InvalidResponse(
                "no speech data returned".to_string(),
            ));
        }

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl TextToSpeech for HttpSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        Ok(self.try_synthesize(text, voice_id).await?)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body() {
        let body = SpeechRequest {
            model: "gpt-4o-mini-tts",
            voice: "ash",
            input: "Operator.",
            response_format: "wav",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["voice"], "ash");
        assert_eq!(json["response_format"], "wav");
    }
}
