//! crates/agrigenius_core/src/language.rs
//!
//! The display languages the client supports and their speech tags.

use std::fmt;
use std::str::FromStr;

/// A supported display language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LanguageCode {
    #[default]
    En,
    Hi,
    Bn,
    Ta,
    Te,
    Mr,
    Gu,
    Kn,
    Pa,
    Ml,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported language code: {0}")]
pub struct UnsupportedLanguage(pub String);

impl LanguageCode {
    pub const ALL: [LanguageCode; 10] = [
        LanguageCode::En,
        LanguageCode::Hi,
        LanguageCode::Bn,
        LanguageCode::Ta,
        LanguageCode::Te,
        LanguageCode::Mr,
        LanguageCode::Gu,
        LanguageCode::Kn,
        LanguageCode::Pa,
        LanguageCode::Ml,
    ];

    pub fn code(self) -> &'static str {
        match self {
            LanguageCode::En => "en",
            LanguageCode::Hi => "hi",
            LanguageCode::Bn => "bn",
            LanguageCode::Ta => "ta",
            LanguageCode::Te => "te",
            LanguageCode::Mr => "mr",
            LanguageCode::Gu => "gu",
            LanguageCode::Kn => "kn",
            LanguageCode::Pa => "pa",
            LanguageCode::Ml => "ml",
        }
    }

    /// The language's name written in that language.
    pub fn native_name(self) -> &'static str {
        match self {
            LanguageCode::En => "English",
            LanguageCode::Hi => "हिन्दी",
            LanguageCode::Bn => "বাংলা",
            LanguageCode::Ta => "தமிழ்",
            LanguageCode::Te => "తెలుగు",
            LanguageCode::Mr => "मराठी",
            LanguageCode::Gu => "ગુજરાતી",
            LanguageCode::Kn => "ಕನ್ನಡ",
            LanguageCode::Pa => "ਪੰਜਾਬੀ",
            LanguageCode::Ml => "മലയാളം",
        }
    }

    /// BCP 47 tag used for speech capture, voice selection and model replies.
    pub fn speech_tag(self) -> String {
        match self {
            LanguageCode::En => "en-US".to_string(),
            other => format!("{}-IN", other.code()),
        }
    }

    /// Resolves a locale string such as `hi`, `hi-IN` or `en_GB.UTF-8`.
    pub fn from_locale(locale: &str) -> Option<Self> {
        let primary = locale
            .split(|c: char| c == '-' || c == '_' || c == '.')
            .next()?
            .to_ascii_lowercase();
        primary.parse().ok()
    }
}

impl FromStr for LanguageCode {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LanguageCode::ALL
            .into_iter()
            .find(|lang| lang.code() == s)
            .ok_or_else(|| UnsupportedLanguage(s.to_string()))
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
