//! crates/agrigenius_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! controllers to be independent of the hosted services behind them
//! (auth provider, realtime database, object storage, inference, weather, speech).

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

use crate::domain::{
    AdviceReply, AdviceRequest, Credentials, FarmLocation, Identity, ProfilePatch, RawForecast,
    Registration, SensorReading, UserProfile,
};
use crate::language::LanguageCode;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., HTTP, JSON).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("No user is logged in")]
    NotAuthenticated,
    #[error("Not configured: {0}")]
    NotConfigured(String),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// `likely_cors` is set when the request never produced an HTTP response,
    /// which is how blocked cross-origin requests and lost connections look.
    #[error("Network failure: {message}")]
    Network { message: String, likely_cors: bool },
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Capability Detection
//=========================================================================================

/// The outcome of probing for an optional platform service.
pub enum Capability<T: ?Sized> {
    Available(Arc<T>),
    Unavailable(String),
}

impl<T: ?Sized> Capability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }

    pub fn get(&self) -> Option<&Arc<T>> {
        match self {
            Capability::Available(service) => Some(service),
            Capability::Unavailable(_) => None,
        }
    }
}

impl<T: ?Sized> Clone for Capability<T> {
    fn clone(&self) -> Self {
        match self {
            Capability::Available(service) => Capability::Available(service.clone()),
            Capability::Unavailable(reason) => Capability::Unavailable(reason.clone()),
        }
    }
}

//=========================================================================================
// Remote Data Gateway Ports
//=========================================================================================

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_in(&self, credentials: &Credentials) -> PortResult<Identity>;

    /// Creates the account and its default profile record.
    async fn sign_up(&self, registration: &Registration) -> PortResult<Identity>;
}

#[async_trait]
pub trait ProfileGateway: Send + Sync {
    async fn get_profile(&self, identity: &Identity) -> PortResult<UserProfile>;

    /// Merges `patch` into the stored record.
    async fn save_profile(&self, identity: &Identity, patch: &ProfilePatch) -> PortResult<()>;

    /// Stores an image and returns its public download URL.
    async fn upload_image(
        &self,
        identity: &Identity,
        file_name: &str,
        mime_type: &str,
        bytes: Bytes,
    ) -> PortResult<String>;
}

//=========================================================================================
// Telemetry, Weather & Inference Ports
//=========================================================================================

#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Fetches and validates one reading from the user's endpoint.
    async fn fetch_reading(&self, endpoint: &str) -> PortResult<SensorReading>;
}

#[async_trait]
pub trait ForecastService: Send + Sync {
    async fn fetch_forecast(&self, location: FarmLocation) -> PortResult<RawForecast>;
}

#[async_trait]
pub trait CropAdvisor: Send + Sync {
    /// Answers a farmer's question. Unparseable model output is not an error;
    /// adapters degrade it to a fixed fallback reply.
    async fn advise(&self, request: AdviceRequest) -> PortResult<AdviceReply>;
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// A one-shot high-accuracy position fix.
    async fn current_position(&self) -> PortResult<FarmLocation>;
}

//=========================================================================================
// Speech Ports
//=========================================================================================

/// Events emitted by a running speech capture.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// The full transcript so far (interim results included).
    Transcript(String),
    /// An engine error code such as `not-allowed` or `no-speech`.
    Error(String),
    /// The engine stopped capturing.
    Ended,
}

pub type RecognitionEvents = Pin<Box<dyn Stream<Item = RecognitionEvent> + Send>>;

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Starts continuous capture with interim results in the given BCP 47 language.
    async fn start(&self, language_tag: &str) -> PortResult<RecognitionEvents>;

    async fn stop(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    pub language_tag: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// `None` means the platform default voice.
    pub voice: Option<Voice>,
    pub language_tag: String,
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn voices(&self) -> Vec<Voice>;

    /// Resolves once playback finishes, or with an error if playback fails.
    async fn speak(&self, utterance: Utterance) -> PortResult<()>;

    /// Stops whatever is currently playing.
    fn cancel(&self);
}

//=========================================================================================
// Local Preferences
//=========================================================================================

pub trait PreferenceStore: Send + Sync {
    fn load_language(&self) -> PortResult<Option<LanguageCode>>;

    fn store_language(&self, language: LanguageCode) -> PortResult<()>;
}
