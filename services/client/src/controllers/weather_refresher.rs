//! services/client/src/controllers/weather_refresher.rs
//!
//! Keeps the weather screen's forecast fresh for the farm location stored in
//! the profile.

use std::sync::Arc;
use std::time::Duration;

use agrigenius_core::domain::{FarmLocation, WeatherSnapshot};
use agrigenius_core::language::LanguageCode;
use agrigenius_core::ports::{ForecastService, PortError, PortResult, ProfileGateway};
use agrigenius_core::weather::build_snapshot;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tracing::info;

use super::refresh::{RefreshJob, RefreshState, Refresher};
use crate::session::SessionContext;

pub type WeatherState = RefreshState<WeatherSnapshot>;

/// Fetches and transforms the forecast for one location.
pub(crate) struct ForecastJob {
    pub(crate) forecasts: Arc<dyn ForecastService>,
    pub(crate) location: FarmLocation,
    pub(crate) language: LanguageCode,
}

#[async_trait]
impl RefreshJob<WeatherSnapshot> for ForecastJob {
    async fn fetch(&self) -> PortResult<WeatherSnapshot> {
        let raw = self.forecasts.fetch_forecast(self.location).await?;
        build_snapshot(&raw, Utc::now(), self.language)
    }
}

pub struct WeatherRefresher {
    session: SessionContext,
    profiles: Arc<dyn ProfileGateway>,
    forecasts: Arc<dyn ForecastService>,
    refresher: Refresher<WeatherSnapshot>,
    location: Option<FarmLocation>,
}

impl WeatherRefresher {
    pub fn new(
        session: SessionContext,
        profiles: Arc<dyn ProfileGateway>,
        forecasts: Arc<dyn ForecastService>,
        interval: Duration,
    ) -> Self {
        Self {
            session,
            profiles,
            forecasts,
            refresher: Refresher::new("Weather refresh", interval),
            location: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WeatherState> {
        self.refresher.subscribe()
    }

    pub fn state(&self) -> WeatherState {
        self.refresher.snapshot()
    }

    /// The location the forecast is for, once resolved.
    pub fn location(&self) -> Option<FarmLocation> {
        self.location
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresher.is_running()
    }

    /// Loads the farm location and starts the refresh loop. No location means
    /// a "not configured" state and no polling.
    pub async fn activate(&mut self) {
        match self.resolve_location().await {
            Ok(location) => {
                info!(
                    "Refreshing weather for {:.4}, {:.4}",
                    location.lat(),
                    location.lon()
                );
                self.location = Some(location);
                self.refresher.start(Arc::new(ForecastJob {
                    forecasts: self.forecasts.clone(),
                    location,
                    language: self.session.language,
                }));
            }
            Err(e) => {
                self.location = None;
                self.refresher.halt_with(e, true);
            }
        }
    }

    /// The "try again" action: back to first-load behaviour and restart.
    pub async fn retry(&mut self) {
        self.refresher.reset(false);
        self.activate().await;
    }

    pub fn shutdown(&mut self) {
        self.refresher.stop();
    }

    async fn resolve_location(&self) -> PortResult<FarmLocation> {
        let identity = self
            .session
            .identity
            .as_ref()
            .ok_or(PortError::NotAuthenticated)?;

        let location = match self.profiles.get_profile(identity).await {
            Ok(profile) => profile.farm_location,
            Err(PortError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        location.ok_or_else(|| PortError::NotConfigured("farm location is not set".to_string()))
    }
}
