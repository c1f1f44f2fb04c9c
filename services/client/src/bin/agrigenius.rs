//! services/client/src/bin/agrigenius.rs

use client_lib::{
    adapters::{
        speech::{detect_location, detect_recognizer, detect_synthesizer},
        FilePreferenceStore, FirebaseAdapter, FirebaseSettings, GeminiAdvisorAdapter,
        HttpSensorAdapter, OpenMeteoAdapter,
    },
    config::Config,
    controllers::{AppServices, RefreshIntervals, ViewRouter},
    error::ClientError,
    session::{system_locale, LanguageSettings},
    shell::{self, Shell},
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Starting AgriGenius...");

    // --- 2. Initialize Service Adapters ---
    let http = reqwest::Client::builder().build()?;

    let firebase = Arc::new(FirebaseAdapter::new(
        http.clone(),
        FirebaseSettings {
            api_key: config.firebase_api_key.clone(),
            database_url: config.firebase_database_url.clone(),
            storage_bucket: config.firebase_storage_bucket.clone(),
        },
    ));
    let services = AppServices {
        profiles: firebase.clone(),
        sensors: Arc::new(HttpSensorAdapter::new(http.clone())),
        forecasts: Arc::new(OpenMeteoAdapter::new(http.clone(), &config.weather_base_url)),
        advisor: Arc::new(GeminiAdvisorAdapter::new(
            http.clone(),
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            &config.gemini_base_url,
        )),
        recognizer: detect_recognizer(),
        synthesizer: detect_synthesizer(),
        positions: detect_location(),
    };
    let preferences = Arc::new(FilePreferenceStore::new(&config.preferences_path));
    let locale = system_locale();

    // --- 3. Sign In ---
    // The login form is shown in the locally preferred language.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let greeting = LanguageSettings::initialize(
        config.locales_path.clone(),
        preferences.clone(),
        firebase.clone(),
        None,
        locale.as_deref(),
    )
    .await;
    let Some(identity) = shell::sign_in(firebase.clone(), &greeting.context(), &mut lines).await? else {
        info!("Input closed before sign-in");
        return Ok(());
    };

    // --- 4. Resolve the Session & Mount the Dashboard ---
    let language = LanguageSettings::initialize(
        config.locales_path.clone(),
        preferences,
        firebase,
        Some(identity),
        locale.as_deref(),
    )
    .await;
    let intervals = RefreshIntervals {
        sensor: config.sensor_poll_interval,
        weather: config.weather_refresh_interval,
    };
    let router = ViewRouter::new(services, intervals, language.context()).await;

    // --- 5. Run the Shell ---
    let mut shell = Shell::new(router, language);
    shell.run(&mut lines).await
}
