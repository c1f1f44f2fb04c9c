//! services/client/src/adapters/sensor_http.rs
//!
//! This module contains the adapter for the user-supplied telemetry endpoint
//! (typically a spreadsheet web-app script). It implements the `SensorSource`
//! port from the `core` crate.

use agrigenius_core::domain::SensorReading;
use agrigenius_core::ports::{PortError, PortResult, SensorSource};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::{Map, Value};
use tracing::debug;

use super::network_error;

/// Accepted spellings for each field: (sheet column name, internal name).
const FIELDS: [(&str, &str); 6] = [
    ("Nitrogen", "nitrogen"),
    ("Phosphorus", "phosphorus"),
    ("Potassium", "potassium"),
    ("Temp", "temperature"),
    ("Humidity", "humidity"),
    ("Moisture", "moisture"),
];

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `SensorSource` port with plain GET requests.
#[derive(Clone)]
pub struct HttpSensorAdapter {
    client: Client,
}

impl HttpSensorAdapter {
    /// Creates a new `HttpSensorAdapter`.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Validates a telemetry body and maps it onto the internal field names.
pub fn parse_payload(body: &[u8]) -> PortResult<SensorReading> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| PortError::MalformedResponse(format!("body is not JSON: {}", e)))?;
    let object = value.as_object().ok_or_else(|| {
        PortError::MalformedResponse("expected a JSON object with six numbers".to_string())
    })?;

    let mut numbers = [0.0_f64; 6];
    for (slot, (sheet_name, internal_name)) in numbers.iter_mut().zip(FIELDS) {
        *slot = number_field(object, sheet_name, internal_name)?;
    }
    let [nitrogen, phosphorus, potassium, temperature, humidity, moisture] = numbers;

    Ok(SensorReading {
        nitrogen,
        phosphorus,
        potassium,
        temperature,
        humidity,
        moisture,
    })
}

fn number_field(object: &Map<String, Value>, sheet_name: &str, internal_name: &str) -> PortResult<f64> {
    let value = object
        .get(sheet_name)
        .or_else(|| object.get(internal_name))
        .ok_or_else(|| PortError::MalformedResponse(format!("missing field {}", sheet_name)))?;

    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| {
            PortError::MalformedResponse(format!("field {} is out of range", sheet_name))
        }),
        _ => Err(PortError::MalformedResponse(format!(
            "field {} is not a number",
            sheet_name
        ))),
    }
}

//=========================================================================================
// `SensorSource` Trait Implementation
//=========================================================================================

#[async_trait]
impl SensorSource for HttpSensorAdapter {
    async fn fetch_reading(&self, endpoint: &str) -> PortResult<SensorReading> {
        let response = self
            .client
            .get(endpoint)
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortError::Network {
                message: format!("Network response was not ok. Status: {}", status.as_u16()),
                likely_cors: false,
            });
        }

        let body = response.bytes().await.map_err(network_error)?;
        debug!("Sensor endpoint returned {} bytes", body.len());
        parse_payload(&body)
    }
}
