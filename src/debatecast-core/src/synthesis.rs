//! Speech synthesis backends.
//!
//! The orchestrator only sees [`SpeechSynthesizer`]. Synthesis is never
//! retried here: a failed call fails the whole operation, which the caller
//! may retry from the same preconditions.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Voice ID is required")]
    MissingVoice,

    #[error("Unknown voice '{0}'")]
    UnknownVoice(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Synthesis backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("TTS engine error: {0}")]
    Engine(String),
}

/// Container format of synthesized audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }
}

/// Encoded audio returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

/// A voice offered by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Voice {
    pub voice_id: String,
    pub name: String,
}

/// Text-to-speech backend seam.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` with the given voice.
    async fn synthesize(&self, text: &str, voice_id: &str)
    -> Result<SynthesizedAudio, SynthesisError>;

    /// Voices this backend can render.
    async fn voices(&self) -> Result<Vec<Voice>, SynthesisError>;
}

#[derive(Deserialize)]
struct VoicesResponse {
    voices: Vec<Voice>,
}

/// ElevenLabs text-to-speech over HTTP (MP3 output).
pub struct ElevenLabsSynthesizer {
    api_base: String,
    api_key: String,
    model_id: Option<String>,
    client: reqwest::Client,
}

impl ElevenLabsSynthesizer {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model_id: None,
            client: reqwest::Client::new(),
        }
    }

    /// Pin the ElevenLabs model instead of using the account default.
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SynthesisError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SynthesisError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        if voice_id.trim().is_empty() {
            return Err(SynthesisError::MissingVoice);
        }

        let mut body = serde_json::json!({ "text": text });
        if let Some(model_id) = &self.model_id {
            body["model_id"] = serde_json::Value::String(model_id.clone());
        }

        debug!(voice_id, chars = text.len(), "requesting ElevenLabs synthesis");

        let response = self
            .client
            .post(format!("{}/text-to-speech/{}", self.api_base, voice_id))
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&body)
            .send()
            .await?;
        let bytes = Self::check_status(response).await?.bytes().await?;

        Ok(SynthesizedAudio {
            bytes: bytes.to_vec(),
            format: AudioFormat::Mp3,
        })
    }

    async fn voices(&self) -> Result<Vec<Voice>, SynthesisError> {
        let response = self
            .client
            .get(format!("{}/voices", self.api_base))
            .header("xi-api-key", &self.api_key)
            .send()
            .await?;
        let parsed: VoicesResponse = Self::check_status(response).await?.json().await?;
        Ok(parsed.voices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions() {
        assert_eq!(AudioFormat::Mp3.extension(), "mp3");
        assert_eq!(AudioFormat::Wav.extension(), "wav");
    }

    #[test]
    fn test_voices_response_ignores_extra_fields() {
        let json = r#"{"voices":[{"voice_id":"21m00Tcm4TlvDq8ikWAM","name":"Rachel","category":"premade"}]}"#;
        let parsed: VoicesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.voices.len(), 1);
        assert_eq!(parsed.voices[0].name, "Rachel");
    }

    #[tokio::test]
    async fn test_missing_voice_fails_before_request() {
        let synth = ElevenLabsSynthesizer::new("http://127.0.0.1:9", "key");
        let err = synth.synthesize("hello", "  ").await.unwrap_err();
        assert!(matches!(err, SynthesisError::MissingVoice));
    }
}
