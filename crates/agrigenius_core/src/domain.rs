//! crates/agrigenius_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any backend or serialization format.

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::language::LanguageCode;

//=========================================================================================
// Sensor Telemetry
//=========================================================================================

/// One complete snapshot of the soil/climate sensor.
///
/// N/P/K are unitless indices, temperature is in °C, humidity and moisture in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub moisture: f64,
}

//=========================================================================================
// Location
//=========================================================================================

/// A validated farm location. Both coordinates are always present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FarmLocation {
    lat: f64,
    lon: f64,
}

/// Raised when a latitude/longitude pair is out of range or not a number.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid coordinates: latitude must be within [-90, 90] and longitude within [-180, 180]")]
pub struct InvalidCoordinates;

impl FarmLocation {
    pub fn new(lat: f64, lon: f64) -> Result<Self, InvalidCoordinates> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(InvalidCoordinates);
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(InvalidCoordinates);
        }
        Ok(Self { lat, lon })
    }

    /// Parses the two free-text fields of the manual location form.
    pub fn parse(lat: &str, lon: &str) -> Result<Self, InvalidCoordinates> {
        let lat = lat.trim().parse::<f64>().map_err(|_| InvalidCoordinates)?;
        let lon = lon.trim().parse::<f64>().map_err(|_| InvalidCoordinates)?;
        Self::new(lat, lon)
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

//=========================================================================================
// Identity & Profile
//=========================================================================================

/// The authenticated identity handed out by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    /// Bearer token used for database and storage requests.
    pub id_token: String,
}

// Only used by the login form - contains sensitive data
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// The profile record owned by one identity.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub farm_size: Option<String>,
    /// Sensor polling endpoint.
    pub script_url: Option<String>,
    pub farm_location: Option<FarmLocation>,
    pub profile_image: Option<String>,
    /// `None` when the record holds no supported language.
    pub preferred_language: Option<LanguageCode>,
}

/// A partial profile update. `None` leaves the stored field untouched.
///
/// The nested options on `farm_location` distinguish "leave alone" (`None`)
/// from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub farm_size: Option<String>,
    pub script_url: Option<String>,
    pub farm_location: Option<Option<FarmLocation>>,
    pub profile_image: Option<String>,
    pub preferred_language: Option<LanguageCode>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl UserProfile {
    /// Applies a patch with the same merge semantics the backend uses.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(size) = &patch.farm_size {
            self.farm_size = non_empty(size);
        }
        if let Some(url) = &patch.script_url {
            self.script_url = non_empty(url);
        }
        if let Some(location) = patch.farm_location {
            self.farm_location = location;
        }
        if let Some(image) = &patch.profile_image {
            self.profile_image = non_empty(image);
        }
        if let Some(language) = patch.preferred_language {
            self.preferred_language = Some(language);
        }
    }
}

/// Stored empty strings mean "not set".
pub fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

//=========================================================================================
// Weather
//=========================================================================================

/// The forecast payload as delivered by the weather service: parallel arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct RawForecast {
    /// Offset of the location's local time from UTC. Timestamps below are local.
    pub utc_offset_seconds: i32,
    pub hourly: HourlySeries,
    pub daily: DailySeries,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourlySeries {
    pub time: Vec<NaiveDateTime>,
    pub temperature: Vec<f64>,
    pub humidity: Vec<f64>,
    pub weather_code: Vec<u16>,
    pub wind_speed: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailySeries {
    pub date: Vec<NaiveDate>,
    pub weather_code: Vec<u16>,
    pub temperature_max: Vec<f64>,
    pub temperature_min: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub condition: String,
    pub humidity: f64,
    pub wind_speed: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyForecast {
    pub time: String,
    pub temperature: f64,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyForecast {
    pub day: String,
    pub min_temp: f64,
    pub max_temp: f64,
    pub condition: String,
}

/// The display-ready forecast. Always fully populated.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub current: CurrentConditions,
    pub hourly: Vec<HourlyForecast>,
    pub daily: Vec<DailyForecast>,
}

//=========================================================================================
// Chat
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Delivered,
}

/// A single entry in the chat log.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: Sender,
    pub text: String,
    /// Data-URL preview of the attached image, for display.
    pub image: Option<String>,
    /// BCP 47 tag of the language the text is written in.
    pub language_tag: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Only user messages carry a delivery status.
    pub status: Option<DeliveryStatus>,
}

impl ChatMessage {
    pub fn user(text: String, image: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: Sender::User,
            text,
            image,
            language_tag: None,
            timestamp: Utc::now(),
            status: Some(DeliveryStatus::Sent),
        }
    }

    pub fn bot(text: String, language_tag: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: Sender::Bot,
            text,
            image: None,
            language_tag,
            timestamp: Utc::now(),
            status: None,
        }
    }
}

/// An image staged for sending, together with its display preview.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
    /// `data:<mime>;base64,<...>` rendition of `bytes`.
    pub preview: String,
}

/// Everything the crop advisor gets to see for one question.
#[derive(Debug, Clone, Default)]
pub struct AdviceRequest {
    pub prompt: String,
    pub image: Option<ImageAttachment>,
    pub sensor: Option<SensorReading>,
    pub location: Option<FarmLocation>,
    pub weather: Option<WeatherSnapshot>,
    pub language: LanguageCode,
}

/// The advisor's answer and the language it says it answered in.
#[derive(Debug, Clone, PartialEq)]
pub struct AdviceReply {
    pub text: String,
    pub language_tag: String,
}
