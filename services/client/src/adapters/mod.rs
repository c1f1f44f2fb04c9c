pub mod firebase;
pub mod gemini;
pub mod open_meteo;
pub mod preferences;
pub mod sensor_http;
pub mod speech;

pub use firebase::{FirebaseAdapter, FirebaseSettings};
pub use gemini::GeminiAdvisorAdapter;
pub use open_meteo::OpenMeteoAdapter;
pub use preferences::FilePreferenceStore;
pub use sensor_http::HttpSensorAdapter;

use agrigenius_core::ports::PortError;

/// Maps a transport failure. A request that never produced an HTTP status is
/// flagged as a probable cross-origin or connectivity problem.
pub(crate) fn network_error(e: reqwest::Error) -> PortError {
    let likely_cors = e.status().is_none() && !e.is_decode();
    PortError::Network {
        message: e.to_string(),
        likely_cors,
    }
}
