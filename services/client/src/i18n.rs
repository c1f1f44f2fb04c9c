//! services/client/src/i18n.rs
//!
//! Key-based UI translations loaded from `<locales>/<code>.json`.
//!
//! Lookup order for a key: the selected language, then English, then the key
//! itself. The English strings compiled into the binary back up a missing or
//! damaged English file.

use std::collections::HashMap;
use std::path::Path;

use agrigenius_core::language::LanguageCode;
use tracing::{debug, warn};

const EMBEDDED_ENGLISH: &str = include_str!("../../../locales/en.json");

type Strings = HashMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct Translator {
    language: LanguageCode,
    selected: Strings,
    english: Strings,
}

impl Translator {
    /// Loads the strings for `language` from `locales_dir`.
    pub fn load(locales_dir: &Path, language: LanguageCode) -> Self {
        let mut english = parse(EMBEDDED_ENGLISH).unwrap_or_default();
        match read_file(locales_dir, LanguageCode::En) {
            Some(file) => english.extend(file),
            None => debug!("Using the built-in English strings"),
        }

        let selected = if language == LanguageCode::En {
            Strings::new()
        } else {
            read_file(locales_dir, language).unwrap_or_else(|| {
                warn!(
                    "Could not load translations for '{}'. Falling back to English.",
                    language.code()
                );
                Strings::new()
            })
        };

        Self {
            language,
            selected,
            english,
        }
    }

    /// English only, from the strings compiled into the binary.
    pub fn english() -> Self {
        Self {
            language: LanguageCode::En,
            selected: Strings::new(),
            english: parse(EMBEDDED_ENGLISH).unwrap_or_default(),
        }
    }

    pub fn language(&self) -> LanguageCode {
        self.language
    }

    pub fn t(&self, key: &str) -> String {
        self.selected
            .get(key)
            .or_else(|| self.english.get(key))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// Like `t`, replacing each `{name}` placeholder with its value.
    pub fn t_with(&self, key: &str, replacements: &[(&str, &str)]) -> String {
        replacements
            .iter()
            .fold(self.t(key), |text, (name, value)| {
                text.replace(&format!("{{{}}}", name), value)
            })
    }
}

fn read_file(dir: &Path, language: LanguageCode) -> Option<Strings> {
    let path = dir.join(format!("{}.json", language.code()));
    let raw = std::fs::read_to_string(&path).ok()?;
    match parse(&raw) {
        Some(strings) => Some(strings),
        None => {
            warn!("Ignoring unreadable translation file {}", path.display());
            None
        }
    }
}

fn parse(raw: &str) -> Option<Strings> {
    serde_json::from_str(raw).ok()
}
