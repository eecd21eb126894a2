//! Speech-to-text over an OpenAI-compatible `/audio/transcriptions` endpoint.
//!
//! Works with OpenAI Whisper and any server exposing the same multipart
//! API (faster-whisper-server, LocalAI, ...).

use std::time::Duration;

use async_trait::async_trait;
use notebridge_config::TranscriptionConfig;
use notebridge_core::{Transcriber, TranscriptionError};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct WhisperTranscriber {
    base_url: String,
    api_key: String,
    model: String,
    language: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TranscriptionAnswer {
    #[serde(default)]
    text: String,
}

impl WhisperTranscriber {
    pub fn from_config(config: &TranscriptionConfig) -> Result<Self, TranscriptionError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TranscriptionError::Request(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            language: config.language.clone(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }
}

/// Telegram voice notes are Ogg/Opus; anything else is sent as a generic blob.
fn mime_for(file_name: &str) -> &'static str {
    match file_name.rsplit('.').next() {
        Some("ogg" | "oga" | "opus") => "audio/ogg",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        file_name: &str,
    ) -> Result<String, TranscriptionError> {
        let size = audio.len();
        let part = Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        let mut form = Form::new()
            .part("file", part)
            .text("model", self.model.clone());
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        debug!(size, model = %self.model, "Sending audio for transcription");
        let mut request = self.client.post(self.endpoint()).multipart(form);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Transcription API error");
            return Err(TranscriptionError::Request(format!(
                "API returned {status}: {body}"
            )));
        }

        let answer: TranscriptionAnswer = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Request(format!("Invalid answer: {e}")))?;

        let text = answer.text.trim();
        if text.is_empty() {
            return Err(TranscriptionError::EmptyResult);
        }
        Ok(text.to_string())
    }
}
