//! services/client/src/controllers/sensor_poller.rs
//!
//! Keeps the dashboard's live reading fresh by polling the user's sensor
//! endpoint on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use agrigenius_core::domain::SensorReading;
use agrigenius_core::ports::{PortError, PortResult, ProfileGateway, SensorSource};
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

use super::refresh::{RefreshJob, RefreshState, Refresher};
use crate::session::SessionContext;

pub type SensorState = RefreshState<SensorReading>;

/// Fetches from one resolved endpoint.
struct EndpointJob {
    source: Arc<dyn SensorSource>,
    endpoint: String,
}

#[async_trait]
impl RefreshJob<SensorReading> for EndpointJob {
    async fn fetch(&self) -> PortResult<SensorReading> {
        self.source.fetch_reading(&self.endpoint).await
    }
}

pub struct SensorPoller {
    session: SessionContext,
    profiles: Arc<dyn ProfileGateway>,
    source: Arc<dyn SensorSource>,
    refresher: Refresher<SensorReading>,
    job: Option<Arc<EndpointJob>>,
}

impl SensorPoller {
    pub fn new(
        session: SessionContext,
        profiles: Arc<dyn ProfileGateway>,
        source: Arc<dyn SensorSource>,
        interval: Duration,
    ) -> Self {
        Self {
            session,
            profiles,
            source,
            refresher: Refresher::new("Sensor polling", interval),
            job: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SensorState> {
        self.refresher.subscribe()
    }

    pub fn state(&self) -> SensorState {
        self.refresher.snapshot()
    }

    pub fn is_polling(&self) -> bool {
        self.refresher.is_running()
    }

    /// Resolves the endpoint from the profile and starts polling it.
    ///
    /// Without a signed-in user or a configured endpoint the error is
    /// published and no timer is started.
    pub async fn activate(&mut self) {
        match self.resolve_endpoint().await {
            Ok(endpoint) => {
                info!("Polling sensor endpoint {}", endpoint);
                let job = Arc::new(EndpointJob {
                    source: self.source.clone(),
                    endpoint,
                });
                self.job = Some(job.clone());
                self.refresher.start(job);
            }
            Err(e) => {
                self.job = None;
                let clear = matches!(e, PortError::NotConfigured(_));
                self.refresher.halt_with(e, clear);
            }
        }
    }

    /// Restarts from first-load behaviour, re-reading the endpoint.
    pub async fn refetch(&mut self) {
        self.refresher.reset(true);
        self.activate().await;
    }

    /// One fetch against the resolved endpoint, outside the timer.
    pub async fn poll_once(&self) {
        if let Some(job) = &self.job {
            self.refresher.run_once(job.as_ref()).await;
        }
    }

    pub fn shutdown(&mut self) {
        self.refresher.stop();
    }

    async fn resolve_endpoint(&self) -> PortResult<String> {
        let identity = self
            .session
            .identity
            .as_ref()
            .ok_or(PortError::NotAuthenticated)?;

        let profile = match self.profiles.get_profile(identity).await {
            Ok(profile) => Some(profile),
            Err(PortError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        profile
            .and_then(|p| p.script_url)
            .ok_or_else(|| PortError::NotConfigured("URL is not configured.".to_string()))
    }
}
