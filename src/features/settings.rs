//! Application settings persistence
//!
//! Handles saving and loading user preferences.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Volume level (0 to 100)
    pub volume: u8,
    /// Shuffle enabled at startup
    pub shuffle: bool,
    /// Repeat mode (off, all, one)
    pub repeat: RepeatMode,
    /// Catalog service settings
    #[serde(default)]
    pub catalog: CatalogSettings,
    /// Voice pipeline settings
    #[serde(default)]
    pub voice: VoiceSettings,
    /// Account settings
    #[serde(default)]
    pub account: AccountSettings,
}

/// Catalog service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// Catalog API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// OAuth token endpoint for client credentials
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Client id issued by the catalog service
    #[serde(default)]
    pub client_id: String,
    /// Client secret issued by the catalog service
    #[serde(default)]
    pub client_secret: String,
    /// Device to drive for remote playback; empty means play locally
    #[serde(default)]
    pub device_id: String,
}

fn default_api_base() -> String {
    crate::api::catalog::API_BASE.to_string()
}

fn default_token_url() -> String {
    crate::api::catalog::TOKEN_URL.to_string()
}

impl CatalogSettings {
    /// Resolve client credentials from settings or environment.
    /// Returns None when neither source has them.
    pub fn credentials(&self) -> Option<(String, String)> {
        let id = if self.client_id.is_empty() {
            std::env::var("CADENZA_CLIENT_ID").ok()?
        } else {
            self.client_id.clone()
        };
        let secret = if self.client_secret.is_empty() {
            std::env::var("CADENZA_CLIENT_SECRET").ok()?
        } else {
            self.client_secret.clone()
        };
        if id.is_empty() || secret.is_empty() {
            return None;
        }
        Some((id, secret))
    }
}

/// Voice pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Which speech backend transcribes captured audio
    #[serde(default)]
    pub speech_backend: SpeechBackend,
    /// Transcription endpoint for the whisper backend
    #[serde(default = "default_speech_endpoint")]
    pub speech_endpoint: String,
    /// API key for the speech service
    #[serde(default)]
    pub speech_api_key: String,
    /// How long voice feedback stays visible, in seconds
    #[serde(default = "default_feedback_secs")]
    pub feedback_display_secs: u64,
    /// Timeout for transcription and intent execution, in seconds
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
    /// Speak responses back through the speech service
    #[serde(default)]
    pub speak_responses: bool,
}

fn default_speech_endpoint() -> String {
    "https://api.openai.com/v1/audio/transcriptions".to_string()
}

fn default_feedback_secs() -> u64 {
    3
}

fn default_stage_timeout_secs() -> u64 {
    10
}

/// Speech backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpeechBackend {
    /// Canned transcripts, no network
    #[default]
    Mock,
    /// Whisper-compatible transcription endpoint
    Whisper,
}

impl std::fmt::Display for SpeechBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeechBackend::Mock => write!(f, "mock"),
            SpeechBackend::Whisper => write!(f, "whisper"),
        }
    }
}

/// Account settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSettings {
    /// Local user identifier for playlists and favorites
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// Display name
    #[serde(default)]
    pub username: String,
}

fn default_user_id() -> String {
    "local".to_string()
}

/// Repeat mode for playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    /// Advance through the queue once per pass
    #[default]
    Off,
    /// Loop the whole queue
    All,
    /// Repeat the current track
    One,
}

impl std::fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl RepeatMode {
    /// Get the next mode in cycle order
    pub fn next(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }

    /// Get display name for the mode
    pub fn display_name(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::All => "all",
            RepeatMode::One => "one",
        }
    }

    /// Get the transport wire value for this mode
    pub fn as_wire_state(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::All => "context", // loop the playing context
            RepeatMode::One => "track",
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            volume: 70,
            shuffle: false,
            repeat: RepeatMode::Off,
            catalog: CatalogSettings::default(),
            voice: VoiceSettings::default(),
            account: AccountSettings::default(),
        }
    }
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token_url: default_token_url(),
            client_id: String::new(),
            client_secret: String::new(),
            device_id: String::new(),
        }
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            speech_backend: SpeechBackend::Mock,
            speech_endpoint: default_speech_endpoint(),
            speech_api_key: String::new(),
            feedback_display_secs: 3,
            stage_timeout_secs: 10,
            speak_responses: false,
        }
    }
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            username: String::new(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "cadenza", "Cadenza")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Load settings from file, or return defaults if not found
    pub fn load() -> Self {
        Self::file_path()
            .and_then(|path| Self::load_from_file(&path).ok())
            .unwrap_or_default()
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SettingsError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| SettingsError::Parse(e.to_string()))
    }

    /// Save settings to the default file
    pub fn save(&self) -> Result<(), SettingsError> {
        if let Some(path) = Self::file_path() {
            self.save_to_file(&path)
        } else {
            Err(SettingsError::Io(
                "Could not determine config directory".to_string(),
            ))
        }
    }

    /// Save settings to a specific file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::Io(e.to_string()))?;
        }

        let content =
            serde_json::to_string_pretty(self).map_err(|e| SettingsError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| SettingsError::Io(e.to_string()))?;
        Ok(())
    }
}

/// Errors that can occur with settings
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
}
