//! Voice control module
//!
//! This module turns spoken audio into playback and library actions:
//! - `SpeechService`: Capture, transcription and synthesis backends
//! - `classify`: Rule-based mapping from transcript text to an `Intent`
//! - `IntentExecutor`: Carries intents out against player, catalog and library
//! - `VoiceSessionController`: One-session-at-a-time pipeline with feedback

pub mod executor;
pub mod intent;
pub mod session;
pub mod speech;

pub use executor::{ExecutionResult, IntentExecutor};
pub use intent::{Intent, IntentKind, classify};
pub use session::{
    SessionConfig, SessionEvent, SessionEventReceiver, SessionEventSender, SessionPhase,
    VoiceSessionController, session_event_channel,
};
pub use speech::{
    MockSpeech, SpeechError, SpeechResult, SpeechService, TranscriptionResult, WhisperSpeech,
};
