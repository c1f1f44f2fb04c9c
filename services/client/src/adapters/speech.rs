//! services/client/src/adapters/speech.rs
//!
//! Platform speech services for the terminal. Capture and GPS have no terminal
//! backend and are reported as unavailable; playback uses a local `espeak-ng`
//! (or `espeak`) binary when one is on the `PATH`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use agrigenius_core::language::LanguageCode;
use agrigenius_core::ports::{
    Capability, LocationProvider, PortError, PortResult, SpeechRecognizer, SpeechSynthesizer,
    Utterance, Voice,
};
use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const SYNTH_BINARIES: [&str; 2] = ["espeak-ng", "espeak"];

//=========================================================================================
// Capability Detection
//=========================================================================================

pub fn detect_recognizer() -> Capability<dyn SpeechRecognizer> {
    Capability::Unavailable("speech capture is not supported in the terminal".to_string())
}

pub fn detect_location() -> Capability<dyn LocationProvider> {
    Capability::Unavailable("no position source is available in the terminal".to_string())
}

pub fn detect_synthesizer() -> Capability<dyn SpeechSynthesizer> {
    let path = std::env::var_os("PATH").unwrap_or_default();
    let found = std::env::split_paths(&path).find_map(|dir| {
        SYNTH_BINARIES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    });

    match found {
        Some(binary) => {
            info!("Speech playback through {}", binary.display());
            Capability::Available(Arc::new(CommandSynthesizer::new(binary)))
        }
        None => Capability::Unavailable("no espeak binary found on PATH".to_string()),
    }
}

//=========================================================================================
// Command-line Synthesizer
//=========================================================================================

/// Speaks through an external text-to-speech program, one utterance at a time.
pub struct CommandSynthesizer {
    binary: PathBuf,
    current: Mutex<Option<CancellationToken>>,
}

impl CommandSynthesizer {
    pub fn new(binary: impl AsRef<Path>) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
            current: Mutex::new(None),
        }
    }

    fn replace_current(&self, token: Option<CancellationToken>) {
        let previous = {
            let mut guard = self.current.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::replace(&mut *guard, token)
        };
        if let Some(previous) = previous {
            previous.cancel();
        }
    }
}

/// The program's voice name for a display language.
fn voice_name(language: LanguageCode) -> &'static str {
    match language {
        LanguageCode::En => "en-us",
        other => other.code(),
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        LanguageCode::ALL
            .into_iter()
            .map(|lang| Voice {
                name: voice_name(lang).to_string(),
                language_tag: lang.speech_tag(),
            })
            .collect()
    }

    async fn speak(&self, utterance: Utterance) -> PortResult<()> {
        let token = CancellationToken::new();
        self.replace_current(Some(token.clone()));

        let voice = match &utterance.voice {
            Some(voice) => voice.name.clone(),
            None => utterance
                .language_tag
                .split('-')
                .next()
                .unwrap_or("en")
                .to_lowercase(),
        };
        debug!("Speaking {} chars with voice {}", utterance.text.len(), voice);

        let mut child = Command::new(&self.binary)
            .args(playback_args(&voice, &utterance.text))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PortError::Unexpected(format!("could not start speech playback: {}", e)))?;

        tokio::select! {
            status = child.wait() => {
                let status = status
                    .map_err(|e| PortError::Unexpected(format!("speech playback failed: {}", e)))?;
                if status.success() {
                    Ok(())
                } else {
                    Err(PortError::Unexpected(format!("speech playback exited with {}", status)))
                }
            }
            _ = token.cancelled() => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to stop speech playback: {}", e);
                }
                Ok(())
            }
        }
    }

    fn cancel(&self) {
        self.replace_current(None);
    }
}

/// Arguments for one playback. `--` ends option parsing so text starting
/// with `-` is spoken, not read as a flag.
fn playback_args<'a>(voice: &'a str, text: &'a str) -> [&'a str; 4] {
    ["-v", voice, "--", text]
}
