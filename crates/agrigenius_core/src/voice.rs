//! crates/agrigenius_core/src/voice.rs
//!
//! Voice selection and capture-error classification for the chat's speech features.

use crate::ports::{Voice, Utterance};

/// Picks the voice for a message: exact tag match first, then the first voice
/// of the same language family. `None` means "use the platform default".
pub fn select_voice(voices: &[Voice], language_tag: &str) -> Option<Voice> {
    if let Some(exact) = voices.iter().find(|v| v.language_tag == language_tag) {
        return Some(exact.clone());
    }
    let family = language_tag.split('-').next().unwrap_or(language_tag);
    voices
        .iter()
        .find(|v| v.language_tag.starts_with(family))
        .cloned()
}

/// Builds the utterance for a message in `language_tag` (`en-US` when the
/// message carries no tag).
pub fn utterance_for(text: &str, language_tag: Option<&str>, voices: &[Voice]) -> Utterance {
    let tag = language_tag.unwrap_or("en-US");
    Utterance {
        text: text.to_string(),
        voice: select_voice(voices, tag),
        language_tag: tag.to_string(),
    }
}

/// How the chat reacts to a speech-capture engine error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureFault {
    /// The user or platform refused microphone access.
    PermissionDenied,
    /// Nothing was heard or no microphone frame arrived; not worth a message.
    Silent,
    /// Anything else; the code is shown to the user.
    Other(String),
}

pub fn classify_capture_error(code: &str) -> CaptureFault {
    match code {
        "not-allowed" => CaptureFault::PermissionDenied,
        "no-speech" | "audio-capture" => CaptureFault::Silent,
        other => CaptureFault::Other(other.to_string()),
    }
}
