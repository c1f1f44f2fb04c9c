//! services/client/src/session.rs
//!
//! The explicit session context handed to every controller (who is signed in,
//! which display language is active, the matching translations), and the
//! language settings that own it.

use std::path::PathBuf;
use std::sync::Arc;

use agrigenius_core::domain::{Identity, ProfilePatch};
use agrigenius_core::language::LanguageCode;
use agrigenius_core::ports::{PortError, PreferenceStore, ProfileGateway};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::i18n::Translator;

/// Read-only view of the session, cloned into each controller at construction.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub identity: Option<Identity>,
    pub language: LanguageCode,
    pub translator: Arc<Translator>,
}

impl SessionContext {
    pub fn new(identity: Option<Identity>, language: LanguageCode, translator: Arc<Translator>) -> Self {
        Self {
            identity,
            language,
            translator,
        }
    }

    /// A signed-out English session using the built-in strings.
    pub fn anonymous() -> Self {
        Self::new(None, LanguageCode::En, Arc::new(Translator::english()))
    }

    pub fn t(&self, key: &str) -> String {
        self.translator.t(key)
    }

    pub fn t_with(&self, key: &str, replacements: &[(&str, &str)]) -> String {
        self.translator.t_with(key, replacements)
    }

    /// Localized text for a port error shown in a view.
    pub fn describe_error(&self, error: &PortError) -> String {
        match error {
            PortError::NotAuthenticated => self.t("errorNoUser"),
            PortError::NotConfigured(_) => self.t("errorEndpointNotConfigured"),
            PortError::MalformedResponse(_) => self.t("errorMalformedData"),
            PortError::Network { likely_cors: true, .. } => self.t("errorNetworkCors"),
            PortError::Network { .. } => self.t("errorNetwork"),
            other => other.to_string(),
        }
    }
}

/// Picks the starting language: the profile's, then the locally saved one,
/// then the system locale, then English.
pub fn resolve_initial_language(
    profile_language: Option<LanguageCode>,
    saved_language: Option<LanguageCode>,
    system_locale: Option<&str>,
) -> LanguageCode {
    profile_language
        .or(saved_language)
        .or_else(|| system_locale.and_then(LanguageCode::from_locale))
        .unwrap_or_default()
}

/// The system locale as reported by the environment.
pub fn system_locale() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.is_empty())
}

//=========================================================================================
// Language Settings
//=========================================================================================

/// Owns the active display language and keeps the local preference, the
/// profile and the translations in step with it.
pub struct LanguageSettings {
    locales_dir: PathBuf,
    preferences: Arc<dyn PreferenceStore>,
    profiles: Arc<dyn ProfileGateway>,
    identity: Option<Identity>,
    translator: Arc<Translator>,
}

impl LanguageSettings {
    /// Resolves the starting language and loads its translations.
    pub async fn initialize(
        locales_dir: PathBuf,
        preferences: Arc<dyn PreferenceStore>,
        profiles: Arc<dyn ProfileGateway>,
        identity: Option<Identity>,
        system_locale: Option<&str>,
    ) -> Self {
        let profile_language = match &identity {
            Some(identity) => match profiles.get_profile(identity).await {
                Ok(profile) => profile.preferred_language,
                Err(e) => {
                    warn!("Could not read the profile language: {}", e);
                    None
                }
            },
            None => None,
        };
        let saved_language = preferences.load_language().unwrap_or_else(|e| {
            warn!("Could not read the saved language: {}", e);
            None
        });

        let language = resolve_initial_language(profile_language, saved_language, system_locale);
        info!("Display language: {}", language.code());

        Self {
            translator: Arc::new(Translator::load(&locales_dir, language)),
            locales_dir,
            preferences,
            profiles,
            identity,
        }
    }

    pub fn language(&self) -> LanguageCode {
        self.translator.language()
    }

    pub fn context(&self) -> SessionContext {
        SessionContext::new(self.identity.clone(), self.language(), self.translator.clone())
    }

    /// Switches the display language. The local preference is written
    /// immediately; the profile is updated in the background and the returned
    /// handle resolves when that update has finished (its failure is only logged).
    pub fn set_language(&mut self, language: LanguageCode) -> Option<JoinHandle<()>> {
        if let Err(e) = self.preferences.store_language(language) {
            warn!("Could not save the language preference: {}", e);
        }
        self.translator = Arc::new(Translator::load(&self.locales_dir, language));
        info!("Display language changed to {}", language.code());

        let identity = self.identity.clone()?;
        let profiles = self.profiles.clone();
        Some(tokio::spawn(async move {
            let patch = ProfilePatch {
                preferred_language: Some(language),
                ..Default::default()
            };
            if let Err(e) = profiles.save_profile(&identity, &patch).await {
                warn!("Failed to update the profile language: {}", e);
            }
        }))
    }
}
