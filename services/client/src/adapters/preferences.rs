//! services/client/src/adapters/preferences.rs
//!
//! A small JSON file that remembers the display language between runs, read
//! before any profile is available.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use agrigenius_core::language::LanguageCode;
use agrigenius_core::ports::{PortError, PortResult, PreferenceStore};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferencesRecord {
    #[serde(default)]
    language: Option<String>,
}

/// Implements `PreferenceStore` on top of a single JSON file.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read(&self) -> PortResult<Option<PreferencesRecord>> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                PortError::MalformedResponse(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PortError::Unexpected(format!("{}: {}", self.path.display(), e))),
        }
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn load_language(&self) -> PortResult<Option<LanguageCode>> {
        let Some(record) = self.read()? else {
            return Ok(None);
        };
        Ok(record.language.and_then(|code| match code.parse() {
            Ok(language) => Some(language),
            Err(e) => {
                warn!("Ignoring saved language preference: {}", e);
                None
            }
        }))
    }

    fn store_language(&self, language: LanguageCode) -> PortResult<()> {
        // A damaged file is simply overwritten.
        let mut record = self.read().ok().flatten().unwrap_or_default();
        record.language = Some(language.code().to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PortError::Unexpected(format!("{}: {}", parent.display(), e)))?;
        }
        let body = serde_json::to_vec_pretty(&record)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        fs::write(&self.path, body)
            .map_err(|e| PortError::Unexpected(format!("{}: {}", self.path.display(), e)))
    }
}
