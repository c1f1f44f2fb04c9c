//! services/client/src/adapters/open_meteo.rs
//!
//! Forecast client for the open weather REST API. Implements the
//! `ForecastService` port; the display transform lives in `agrigenius_core::weather`.

use agrigenius_core::domain::{DailySeries, FarmLocation, HourlySeries, RawForecast};
use agrigenius_core::ports::{ForecastService, PortError, PortResult};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::{debug, error};

use super::network_error;

const HOURLY_FIELDS: &str = "temperature_2m,relative_humidity_2m,weather_code,wind_speed_10m";
const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min";
const FORECAST_DAYS: &str = "5";

/// Weather API client
#[derive(Clone)]
pub struct OpenMeteoAdapter {
    client: Client,
    base_url: String,
}

impl OpenMeteoAdapter {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    utc_offset_seconds: i32,
    hourly: HourlyRecord,
    daily: DailyRecord,
}

#[derive(Debug, Deserialize)]
struct HourlyRecord {
    time: Vec<String>,
    temperature_2m: Vec<f64>,
    relative_humidity_2m: Vec<f64>,
    weather_code: Vec<u16>,
    wind_speed_10m: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct DailyRecord {
    time: Vec<String>,
    weather_code: Vec<u16>,
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
}

impl ForecastResponse {
    fn to_domain(self) -> PortResult<RawForecast> {
        let hourly_times = self
            .hourly
            .time
            .iter()
            .map(|t| {
                NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M")
                    .map_err(|_| PortError::MalformedResponse(format!("bad hourly time '{}'", t)))
            })
            .collect::<PortResult<Vec<_>>>()?;
        let daily_dates = self
            .daily
            .time
            .iter()
            .map(|d| {
                NaiveDate::parse_from_str(d, "%Y-%m-%d")
                    .map_err(|_| PortError::MalformedResponse(format!("bad daily date '{}'", d)))
            })
            .collect::<PortResult<Vec<_>>>()?;

        Ok(RawForecast {
            utc_offset_seconds: self.utc_offset_seconds,
            hourly: HourlySeries {
                time: hourly_times,
                temperature: self.hourly.temperature_2m,
                humidity: self.hourly.relative_humidity_2m,
                weather_code: self.hourly.weather_code,
                wind_speed: self.hourly.wind_speed_10m,
            },
            daily: DailySeries {
                date: daily_dates,
                weather_code: self.daily.weather_code,
                temperature_max: self.daily.temperature_2m_max,
                temperature_min: self.daily.temperature_2m_min,
            },
        })
    }
}

fn parse_forecast(body: &[u8]) -> PortResult<RawForecast> {
    let response: ForecastResponse = serde_json::from_slice(body).map_err(|e| {
        PortError::MalformedResponse(format!("Invalid data format received from weather service: {}", e))
    })?;
    response.to_domain()
}

//=========================================================================================
// `ForecastService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ForecastService for OpenMeteoAdapter {
    async fn fetch_forecast(&self, location: FarmLocation) -> PortResult<RawForecast> {
        let url = format!("{}/forecast", self.base_url);
        let latitude = location.lat().to_string();
        let longitude = location.lon().to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("hourly", HOURLY_FIELDS),
                ("daily", DAILY_FIELDS),
                ("timezone", "auto"),
                ("forecast_days", FORECAST_DAYS),
            ])
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Weather API error: {} - {}", status, body);
            return Err(PortError::Network {
                message: format!("Weather API request failed with status {}: {}", status.as_u16(), body),
                likely_cors: false,
            });
        }

        let body = response.bytes().await.map_err(network_error)?;
        debug!("Weather API returned {} bytes", body.len());
        parse_forecast(&body)
    }
}
