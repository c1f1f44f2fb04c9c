pub mod advice;
pub mod domain;
pub mod language;
pub mod market;
pub mod ports;
pub mod voice;
pub mod weather;

pub use domain::{
    AdviceReply, AdviceRequest, ChatMessage, Credentials, DeliveryStatus, FarmLocation, Identity,
    ImageAttachment, ProfilePatch, RawForecast, Registration, Sender, SensorReading, UserProfile,
    WeatherSnapshot,
};
pub use language::LanguageCode;
pub use ports::{
    AuthService, Capability, CropAdvisor, ForecastService, LocationProvider, PortError,
    PortResult, PreferenceStore, ProfileGateway, SensorSource, SpeechRecognizer,
    SpeechSynthesizer,
};
