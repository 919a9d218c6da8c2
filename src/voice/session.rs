use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::executor::{ExecutionResult, IntentExecutor};
use super::intent::classify;
use super::speech::SpeechService;
use crate::features::VoiceSettings;

// ============================================================================
// Session phases
// ============================================================================

/// Where a voice session currently is in its pipeline.
///
/// Exactly one session runs at a time. A session moves strictly forward
/// through the phases and every path ends back at `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Capturing,
    Transcribing,
    Classifying,
    Executing,
    Presenting,
}

impl SessionPhase {
    pub fn display_name(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "Idle",
            SessionPhase::Capturing => "Listening",
            SessionPhase::Transcribing => "Transcribing",
            SessionPhase::Classifying => "Understanding",
            SessionPhase::Executing => "Working",
            SessionPhase::Presenting => "Done",
        }
    }
}

// ============================================================================
// Session events
// ============================================================================

#[derive(Debug, Clone)]
pub enum SessionEvent {
    PhaseChanged(SessionPhase),
    FeedbackReady(ExecutionResult),
    FeedbackCleared,
}

pub type SessionEventSender = UnboundedSender<SessionEvent>;
pub type SessionEventReceiver = UnboundedReceiver<SessionEvent>;

pub fn session_event_channel() -> (SessionEventSender, SessionEventReceiver) {
    unbounded_channel()
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Upper bound for each of the transcribe/classify/execute stages.
    pub stage_timeout: Duration,
    /// How long feedback stays on screen before the session returns to idle.
    pub feedback_display: Duration,
    /// Speak every feedback message back through the speech service.
    pub speak_responses: bool,
}

impl SessionConfig {
    pub fn from_settings(voice: &VoiceSettings) -> Self {
        Self {
            stage_timeout: Duration::from_secs(voice.stage_timeout_secs),
            feedback_display: Duration::from_secs(voice.feedback_display_secs),
            speak_responses: voice.speak_responses,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(10),
            feedback_display: Duration::from_secs(3),
            speak_responses: false,
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

struct SessionInner {
    phase: SessionPhase,
    feedback: Option<ExecutionResult>,
}

/// Drives one voice session at a time through capture, transcription,
/// classification, execution and feedback presentation.
///
/// Each session gets a monotonically increasing id. Every stage re-checks
/// that id before applying its result, so anything that finishes after the
/// controller has moved on is discarded instead of applied.
#[derive(Clone)]
pub struct VoiceSessionController {
    speech: Arc<dyn SpeechService>,
    executor: Arc<IntentExecutor>,
    inner: Arc<RwLock<SessionInner>>,
    session_id: Arc<AtomicU64>,
    subscribers: Arc<RwLock<Vec<SessionEventSender>>>,
    config: SessionConfig,
}

impl std::fmt::Debug for VoiceSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceSessionController")
            .field("phase", &self.phase())
            .field("session_id", &self.session_id.load(Ordering::SeqCst))
            .field("config", &self.config)
            .finish()
    }
}

impl VoiceSessionController {
    pub fn new(
        speech: Arc<dyn SpeechService>,
        executor: Arc<IntentExecutor>,
        config: SessionConfig,
    ) -> Self {
        Self {
            speech,
            executor,
            inner: Arc::new(RwLock::new(SessionInner {
                phase: SessionPhase::Idle,
                feedback: None,
            })),
            session_id: Arc::new(AtomicU64::new(0)),
            subscribers: Arc::new(RwLock::new(Vec::new())),
            config,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.read().phase
    }

    pub fn feedback(&self) -> Option<ExecutionResult> {
        self.inner.read().feedback.clone()
    }

    pub fn subscribe(&self) -> SessionEventReceiver {
        let (tx, rx) = session_event_channel();
        self.subscribers.write().push(tx);
        rx
    }

    fn notify(&self, event: SessionEvent) {
        self.subscribers
            .write()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn next_session(&self) -> u64 {
        self.session_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, id: u64) -> bool {
        self.session_id.load(Ordering::SeqCst) == id
    }

    /// Advances the phase, unless a newer session owns the controller.
    fn set_phase_if_current(&self, id: u64, phase: SessionPhase) -> bool {
        if !self.is_current(id) {
            debug!("session {} superseded, skipping {:?}", id, phase);
            return false;
        }
        self.inner.write().phase = phase;
        self.notify(SessionEvent::PhaseChanged(phase));
        true
    }

    /// Opens a new voice session and starts audio capture.
    ///
    /// Returns `false` without side effects when a session is already
    /// running. A capture failure (no microphone, permission denied) is
    /// presented as feedback and the session ends there.
    pub async fn start_session(&self) -> bool {
        if self.phase() != SessionPhase::Idle {
            debug!("voice session already active, start ignored");
            return false;
        }
        let id = self.next_session();
        self.set_phase_if_current(id, SessionPhase::Capturing);
        info!("voice session {} started", id);

        if let Err(e) = self.speech.start_capture().await {
            warn!("audio capture unavailable: {}", e);
            self.present(id, ExecutionResult::fail("Microphone unavailable"))
                .await;
            return false;
        }
        true
    }

    /// Ends capture and runs the rest of the pipeline in the background.
    ///
    /// Ignored unless a session is currently capturing. Pipeline progress is
    /// reported through [`subscribe`](Self::subscribe) and the final outcome
    /// lands in [`feedback`](Self::feedback).
    pub async fn finish_capture(&self) {
        if self.phase() != SessionPhase::Capturing {
            debug!("no capture in progress, finish ignored");
            return;
        }
        let id = self.session_id.load(Ordering::SeqCst);

        let clip = match self.speech.stop_capture().await {
            Ok(clip) => clip,
            Err(e) => {
                warn!("audio capture failed: {}", e);
                self.present(id, ExecutionResult::fail("Could not capture audio"))
                    .await;
                return;
            }
        };

        self.set_phase_if_current(id, SessionPhase::Transcribing);
        let this = self.clone();
        tokio::spawn(async move {
            this.transcribe_and_run(id, clip).await;
        });
    }

    /// Runs a typed utterance through classification and execution, skipping
    /// the audio stages. Shares the same single-session gate as voice input.
    pub async fn run_utterance(&self, text: &str) -> Option<ExecutionResult> {
        if self.phase() != SessionPhase::Idle {
            debug!("voice session already active, utterance ignored");
            return None;
        }
        let id = self.next_session();
        self.classify_and_execute(id, text).await
    }

    async fn transcribe_and_run(&self, id: u64, clip: Vec<u8>) -> Option<ExecutionResult> {
        // The transcription request runs detached so a timeout abandons it
        // without killing it. If it eventually completes, its result dies
        // with the dropped handle instead of being applied to a session
        // that has already moved on.
        let speech = self.speech.clone();
        let request = tokio::spawn(async move { speech.transcribe(&clip).await });

        let transcription = match timeout(self.config.stage_timeout, request).await {
            Err(_) => {
                warn!("transcription timed out after {:?}", self.config.stage_timeout);
                return self
                    .present(id, ExecutionResult::fail("Transcription timed out"))
                    .await;
            }
            Ok(Err(e)) => {
                warn!("transcription task failed: {}", e);
                return self
                    .present(id, ExecutionResult::fail("Transcription failed"))
                    .await;
            }
            Ok(Ok(Err(e))) => {
                warn!("transcription failed: {}", e);
                return self
                    .present(id, ExecutionResult::fail("Transcription failed"))
                    .await;
            }
            Ok(Ok(Ok(t))) => t,
        };

        if !self.is_current(id) {
            debug!("discarding transcription for superseded session {}", id);
            return None;
        }
        info!(
            "session {} transcribed {:?} (confidence {:.2})",
            id, transcription.text, transcription.confidence
        );
        self.classify_and_execute(id, &transcription.text).await
    }

    async fn classify_and_execute(&self, id: u64, text: &str) -> Option<ExecutionResult> {
        if !self.set_phase_if_current(id, SessionPhase::Classifying) {
            return None;
        }
        let intent = classify(text);
        debug!(
            "session {} classified {:?} as {} ({:.2})",
            id,
            text,
            intent.kind.as_tag(),
            intent.confidence
        );

        if !self.set_phase_if_current(id, SessionPhase::Executing) {
            return None;
        }
        let result = match timeout(self.config.stage_timeout, self.executor.execute(&intent)).await
        {
            Ok(result) => result,
            Err(_) => {
                warn!("intent execution timed out after {:?}", self.config.stage_timeout);
                ExecutionResult::fail("Command timed out")
            }
        };
        self.present(id, result).await
    }

    /// Publishes the session outcome and schedules the return to idle.
    async fn present(&self, id: u64, result: ExecutionResult) -> Option<ExecutionResult> {
        if !self.is_current(id) {
            debug!("discarding result for superseded session {}", id);
            return None;
        }
        {
            let mut inner = self.inner.write();
            inner.phase = SessionPhase::Presenting;
            inner.feedback = Some(result.clone());
        }
        self.notify(SessionEvent::PhaseChanged(SessionPhase::Presenting));
        self.notify(SessionEvent::FeedbackReady(result.clone()));

        if self.config.speak_responses {
            // Spoken feedback is best effort and never blocks the session
            if let Err(e) = self.speech.synthesize(&result.message).await {
                warn!("speak-back failed: {}", e);
            }
        }

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.config.feedback_display).await;
            this.clear_feedback(id);
        });
        Some(result)
    }

    fn clear_feedback(&self, id: u64) {
        if !self.is_current(id) {
            return;
        }
        {
            let mut inner = self.inner.write();
            if inner.phase != SessionPhase::Presenting {
                return;
            }
            inner.phase = SessionPhase::Idle;
            inner.feedback = None;
        }
        self.notify(SessionEvent::PhaseChanged(SessionPhase::Idle));
        self.notify(SessionEvent::FeedbackCleared);
    }
}

// ============================================================================
// Tests
// ============================================================================
