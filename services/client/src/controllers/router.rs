//! services/client/src/controllers/router.rs
//!
//! Holds which screen is active and mounts that screen's controller. Leaving a
//! screen tears its controller down, which stops any refresh loop it owns.

use std::sync::Arc;
use std::time::Duration;

use agrigenius_core::ports::{
    Capability, CropAdvisor, ForecastService, LocationProvider, ProfileGateway, SensorSource,
    SpeechRecognizer, SpeechSynthesizer,
};
use tracing::info;

use super::conversation::{ConversationController, ConversationServices, LiveFeeds};
use super::profile::ProfileController;
use super::sensor_poller::SensorPoller;
use super::weather_refresher::WeatherRefresher;
use crate::session::SessionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarketView {
    #[default]
    Main,
    Prices,
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Dashboard,
    Weather,
    Market(MarketView),
    Profile,
}

/// Every outside service a screen may need.
#[derive(Clone)]
pub struct AppServices {
    pub profiles: Arc<dyn ProfileGateway>,
    pub sensors: Arc<dyn SensorSource>,
    pub forecasts: Arc<dyn ForecastService>,
    pub advisor: Arc<dyn CropAdvisor>,
    pub recognizer: Capability<dyn SpeechRecognizer>,
    pub synthesizer: Capability<dyn SpeechSynthesizer>,
    pub positions: Capability<dyn LocationProvider>,
}

#[derive(Debug, Clone, Copy)]
pub struct RefreshIntervals {
    pub sensor: Duration,
    pub weather: Duration,
}

/// The mounted screen and the controller it owns.
pub enum Screen {
    Dashboard(SensorPoller),
    Weather(WeatherRefresher),
    Market(MarketView),
    Profile(ProfileController),
}

impl Screen {
    pub fn view(&self) -> View {
        match self {
            Screen::Dashboard(_) => View::Dashboard,
            Screen::Weather(_) => View::Weather,
            Screen::Market(sub) => View::Market(*sub),
            Screen::Profile(_) => View::Profile,
        }
    }

    fn tear_down(&mut self) {
        match self {
            Screen::Dashboard(poller) => poller.shutdown(),
            Screen::Weather(refresher) => refresher.shutdown(),
            Screen::Market(_) | Screen::Profile(_) => {}
        }
    }
}

pub struct ViewRouter {
    services: AppServices,
    intervals: RefreshIntervals,
    session: SessionContext,
    screen: Screen,
    chat: Option<ConversationController>,
}

impl ViewRouter {
    /// Starts on the dashboard.
    pub async fn new(services: AppServices, intervals: RefreshIntervals, session: SessionContext) -> Self {
        let screen = mount(&services, intervals, &session, View::Dashboard).await;
        Self {
            services,
            intervals,
            session,
            screen,
            chat: None,
        }
    }

    pub fn view(&self) -> View {
        self.screen.view()
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Switches screens. Moving between market sub-views keeps nothing to
    /// tear down; navigating to the active view is a no-op.
    pub async fn navigate(&mut self, view: View) {
        if view == self.view() {
            return;
        }
        info!("Navigating to {:?}", view);
        self.screen.tear_down();
        self.screen = mount(&self.services, self.intervals, &self.session, view).await;
    }

    pub fn chat(&self) -> Option<&ConversationController> {
        self.chat.as_ref()
    }

    pub fn is_chat_open(&self) -> bool {
        self.chat.is_some()
    }

    /// Opens the assistant over the current screen, wired to whatever live
    /// data that screen is publishing.
    pub async fn open_chat(&mut self) {
        if self.chat.is_some() {
            return;
        }
        let feeds = match &self.screen {
            Screen::Dashboard(poller) => LiveFeeds {
                sensor: Some(poller.subscribe()),
                weather: None,
            },
            Screen::Weather(refresher) => LiveFeeds {
                sensor: None,
                weather: Some(refresher.subscribe()),
            },
            _ => LiveFeeds::default(),
        };
        let services = ConversationServices {
            advisor: self.services.advisor.clone(),
            profiles: self.services.profiles.clone(),
            forecasts: self.services.forecasts.clone(),
            recognizer: self.services.recognizer.clone(),
            synthesizer: self.services.synthesizer.clone(),
        };
        self.chat = Some(ConversationController::open(self.session.clone(), services, feeds).await);
    }

    pub async fn close_chat(&mut self) {
        if let Some(chat) = self.chat.take() {
            chat.close().await;
        }
    }

    /// Installs a new session (after a language change) and re-creates the
    /// mounted controllers so they pick it up. An open chat starts over.
    pub async fn replace_session(&mut self, session: SessionContext) {
        self.session = session;
        let view = self.view();
        self.screen.tear_down();
        self.screen = mount(&self.services, self.intervals, &self.session, view).await;

        if self.chat.is_some() {
            self.close_chat().await;
            self.open_chat().await;
        }
    }

    pub async fn shutdown(&mut self) {
        self.close_chat().await;
        self.screen.tear_down();
    }
}

async fn mount(
    services: &AppServices,
    intervals: RefreshIntervals,
    session: &SessionContext,
    view: View,
) -> Screen {
    match view {
        View::Dashboard => {
            let mut poller = SensorPoller::new(
                session.clone(),
                services.profiles.clone(),
                services.sensors.clone(),
                intervals.sensor,
            );
            poller.activate().await;
            Screen::Dashboard(poller)
        }
        View::Weather => {
            let mut refresher = WeatherRefresher::new(
                session.clone(),
                services.profiles.clone(),
                services.forecasts.clone(),
                intervals.weather,
            );
            refresher.activate().await;
            Screen::Weather(refresher)
        }
        View::Market(sub) => Screen::Market(sub),
        View::Profile => {
            let mut profile = ProfileController::new(
                session.clone(),
                services.profiles.clone(),
                services.positions.clone(),
            );
            profile.load().await;
            Screen::Profile(profile)
        }
    }
}
