//! OpenAI-compatible `/audio/speech` client.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::error::SynthesisError;
use crate::settings::TtsSettings;

use super::collaborators::SpeechSynthesizer;

const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct HttpSpeechSynthesizer {
    /// Base URL without trailing slash (e.g. https://api.openai.com/v1).
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    client: reqwest::Client,
}

impl HttpSpeechSynthesizer {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    /// `STORYCUT_TTS_KEY` is required; `STORYCUT_TTS_URL` and `STORYCUT_TTS_MODEL`
    /// override the configured endpoint.
    pub fn from_env(defaults: &TtsSettings) -> Result<Self> {
        let api_key = std::env::var("STORYCUT_TTS_KEY")
            .map_err(|_| anyhow!("speech synthesis requires STORYCUT_TTS_KEY"))?;
        let base_url =
            std::env::var("STORYCUT_TTS_URL").unwrap_or_else(|_| defaults.base_url.clone());
        let model = std::env::var("STORYCUT_TTS_MODEL").unwrap_or_else(|_| defaults.model.clone());
        Self::new(base_url, api_key, model)
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/speech", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, SynthesisError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text.trim(),
            "voice": voice_id,
        });

        let res = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SynthesisError::new(voice_id, e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SynthesisError::new(
                voice_id,
                format!("TTS API error {status}: {body}"),
            ));
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|e| SynthesisError::new(voice_id, e.to_string()))?;
        if bytes.is_empty() {
            return Err(SynthesisError::new(voice_id, "TTS API returned no audio"));
        }
        Ok(bytes.to_vec())
    }
}
