//! Feature modules - business logic separated from the surfaces
//!
//! Each feature module contains the core logic for a specific functionality.
//! Features should not depend on the console or voice surfaces directly.

pub mod settings;

pub use settings::{
    AccountSettings, CatalogSettings, RepeatMode, Settings, SettingsError, SpeechBackend,
    VoiceSettings,
};
