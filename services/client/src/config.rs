//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: Level,
    pub firebase_api_key: String,
    pub firebase_database_url: String,
    pub firebase_storage_bucket: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub weather_base_url: String,
    pub sensor_poll_interval: Duration,
    pub weather_refresh_interval: Duration,
    pub locales_path: PathBuf,
    pub preferences_path: PathBuf,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Backend Settings ---
        let firebase_api_key = required("FIREBASE_API_KEY")?;
        let firebase_database_url = required("FIREBASE_DATABASE_URL")?
            .trim_end_matches('/')
            .to_string();
        let firebase_storage_bucket = required("FIREBASE_STORAGE_BUCKET")?;

        // --- Load Inference Settings (key is optional) ---
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());
        let gemini_model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string());
        let gemini_base_url = std::env::var("GEMINI_BASE_URL")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string());

        let weather_base_url = std::env::var("WEATHER_BASE_URL")
            .unwrap_or_else(|_| "https://api.open-meteo.com/v1".to_string());

        // --- Load Refresh Intervals ---
        let sensor_poll_interval = seconds("SENSOR_POLL_SECS", 5)?;
        let weather_refresh_interval = seconds("WEATHER_REFRESH_SECS", 20 * 60)?;

        let locales_path = std::env::var("LOCALES_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./locales"));
        let preferences_path = std::env::var("PREFERENCES_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.agrigenius/preferences.json"));

        Ok(Self {
            log_level,
            firebase_api_key,
            firebase_database_url,
            firebase_storage_bucket,
            gemini_api_key,
            gemini_model,
            gemini_base_url,
            weather_base_url,
            sensor_poll_interval,
            weather_refresh_interval,
            locales_path,
            preferences_path,
        })
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn seconds(name: &str, default: u64) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(Duration::from_secs(default)),
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(ConfigError::InvalidValue(
                name.to_string(),
                format!("'{}' is not a positive number of seconds", raw),
            )),
            Ok(secs) => Ok(Duration::from_secs(secs)),
        },
    }
}
