//! Speech service boundary
//!
//! Capture, transcription, and synthesis live behind one injected trait so
//! the session controller can run against a fake in tests and a real
//! backend in production. Capture is backend-specific: the mock fabricates
//! clips, the whisper backend has no capture device of its own and reports
//! that honestly.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

/// Speech processing errors
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("capture error: {0}")]
    Capture(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("synthesis error: {0}")]
    Synthesis(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

pub type SpeechResult<T> = Result<T, SpeechError>;

/// Transcription of one captured clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    pub confidence: f32,
}

/// External speech collaborator: capture, speech-to-text, text-to-speech
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Acquire the capture device and start recording
    async fn start_capture(&self) -> SpeechResult<()>;

    /// Stop recording and return the captured clip
    async fn stop_capture(&self) -> SpeechResult<Vec<u8>>;

    /// Convert a captured clip to text
    async fn transcribe(&self, audio: &[u8]) -> SpeechResult<TranscriptionResult>;

    /// Convert text to audio for speak-back
    async fn synthesize(&self, text: &str) -> SpeechResult<Vec<u8>>;
}

// ============ Mock Backend ============

/// Canned-transcript backend for tests and the demo console.
///
/// Each `transcribe` call returns the next transcript in order, wrapping
/// around at the end. Audio input is ignored.
pub struct MockSpeech {
    transcripts: Vec<String>,
    cursor: AtomicUsize,
    deny_capture: bool,
}

impl MockSpeech {
    pub fn new() -> Self {
        Self::with_transcripts(vec![
            "play shape of you".to_string(),
            "what's playing".to_string(),
            "pause".to_string(),
            "resume".to_string(),
            "next".to_string(),
            "shuffle".to_string(),
        ])
    }

    pub fn with_transcripts(transcripts: Vec<String>) -> Self {
        Self {
            transcripts,
            cursor: AtomicUsize::new(0),
            deny_capture: false,
        }
    }

    /// Backend whose capture device is unavailable
    #[allow(dead_code)]
    pub fn denying_capture() -> Self {
        Self {
            transcripts: Vec::new(),
            cursor: AtomicUsize::new(0),
            deny_capture: true,
        }
    }
}

impl Default for MockSpeech {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechService for MockSpeech {
    async fn start_capture(&self) -> SpeechResult<()> {
        if self.deny_capture {
            return Err(SpeechError::Capture("microphone access denied".to_string()));
        }
        Ok(())
    }

    async fn stop_capture(&self) -> SpeechResult<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn transcribe(&self, _audio: &[u8]) -> SpeechResult<TranscriptionResult> {
        if self.transcripts.is_empty() {
            return Err(SpeechError::Transcription(
                "no canned transcript available".to_string(),
            ));
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.transcripts.len();
        Ok(TranscriptionResult {
            text: self.transcripts[idx].clone(),
            confidence: 0.95,
        })
    }

    async fn synthesize(&self, text: &str) -> SpeechResult<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }
}

// ============ Whisper Backend ============

/// Whisper-compatible transcription endpoint with a sibling speech
/// endpoint for synthesis
pub struct WhisperSpeech {
    client: reqwest::Client,
    endpoint: String,
    speech_endpoint: String,
    api_key: String,
}

impl WhisperSpeech {
    pub fn new(endpoint: &str, api_key: &str) -> Self {
        let speech_endpoint = endpoint.replace("/audio/transcriptions", "/audio/speech");
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            speech_endpoint,
            api_key: api_key.to_string(),
        }
    }
}

impl std::fmt::Debug for WhisperSpeech {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperSpeech")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[async_trait]
impl SpeechService for WhisperSpeech {
    async fn start_capture(&self) -> SpeechResult<()> {
        // Capture belongs to the device layer, not the remote endpoint
        Err(SpeechError::Capture(
            "no capture device attached to the whisper backend".to_string(),
        ))
    }

    async fn stop_capture(&self) -> SpeechResult<Vec<u8>> {
        Err(SpeechError::Capture(
            "no capture device attached to the whisper backend".to_string(),
        ))
    }

    async fn transcribe(&self, audio: &[u8]) -> SpeechResult<TranscriptionResult> {
        if self.api_key.is_empty() {
            return Err(SpeechError::Transcription(
                "speech API key not configured".to_string(),
            ));
        }

        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("clip.wav")
            .mime_str("audio/wav")
            .map_err(|e| SpeechError::Transcription(format!("failed to build form part: {}", e)))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", "whisper-1")
            .text("response_format", "json");

        debug!("transcribing {} byte clip", audio.len());
        let response = self
            .client
            .post(&self.endpoint)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SpeechError::Transcription(format!(
                "transcription endpoint error: {}",
                detail
            )));
        }

        let body: Value = response.json().await?;
        let text = body["text"].as_str().unwrap_or("").to_string();
        // The endpoint reports no overall confidence
        Ok(TranscriptionResult {
            text,
            confidence: 1.0,
        })
    }

    async fn synthesize(&self, text: &str) -> SpeechResult<Vec<u8>> {
        if self.api_key.is_empty() {
            return Err(SpeechError::Synthesis(
                "speech API key not configured".to_string(),
            ));
        }

        let body = json!({
            "model": "tts-1",
            "voice": "alloy",
            "input": text,
        });
        let response = self
            .client
            .post(&self.speech_endpoint)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SpeechError::Synthesis(format!(
                "speech endpoint error: {}",
                detail
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_cycles_transcripts() {
        let speech = MockSpeech::with_transcripts(vec![
            "pause".to_string(),
            "resume".to_string(),
        ]);
        assert_eq!(speech.transcribe(&[]).await.unwrap().text, "pause");
        assert_eq!(speech.transcribe(&[]).await.unwrap().text, "resume");
        assert_eq!(
            speech.transcribe(&[]).await.unwrap().text,
            "pause",
            "transcripts wrap around"
        );
    }

    #[tokio::test]
    async fn test_mock_capture_denial() {
        let speech = MockSpeech::denying_capture();
        assert!(matches!(
            speech.start_capture().await,
            Err(SpeechError::Capture(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_synthesize_echoes_text() {
        let speech = MockSpeech::new();
        let audio = speech.synthesize("now playing").await.unwrap();
        assert_eq!(audio, b"now playing");
    }

    #[test]
    fn test_whisper_derives_speech_endpoint() {
        let speech = WhisperSpeech::new("https://api.openai.com/v1/audio/transcriptions", "k");
        assert_eq!(
            speech.speech_endpoint,
            "https://api.openai.com/v1/audio/speech"
        );
    }
}
