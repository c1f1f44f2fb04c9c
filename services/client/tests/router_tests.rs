//! View routing: mounting and tearing down per-screen controllers.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use agrigenius_core::domain::FarmLocation;
use agrigenius_core::ports::{LocationProvider, SpeechRecognizer, SpeechSynthesizer};
use client_lib::controllers::{
    AppServices, MarketView, RefreshIntervals, Screen, View, ViewRouter,
};
use common::{
    profile, raw_forecast, reading, reply, signed_in, unavailable, FakeAdvisor, FakeForecast,
    FakeProfiles, FakeSensor,
};

struct Rig {
    sensor: Arc<FakeSensor>,
    forecasts: Arc<FakeForecast>,
    advisor: Arc<FakeAdvisor>,
    profiles: Arc<FakeProfiles>,
}

impl Rig {
    fn new() -> Self {
        let mut p = profile();
        p.script_url = Some("https://script.example/exec".to_string());
        p.farm_location = Some(FarmLocation::new(12.9716, 77.5946).unwrap());
        Self {
            sensor: FakeSensor::new(vec![Ok(reading(40.0))]),
            forecasts: FakeForecast::new(vec![Ok(raw_forecast(48, 5))]),
            advisor: FakeAdvisor::new(vec![Ok(reply("ok", "en-US"))]),
            profiles: FakeProfiles::with(p),
        }
    }

    async fn router(&self) -> ViewRouter {
        let services = AppServices {
            profiles: self.profiles.clone(),
            sensors: self.sensor.clone(),
            forecasts: self.forecasts.clone(),
            advisor: self.advisor.clone(),
            recognizer: unavailable::<dyn SpeechRecognizer>(),
            synthesizer: unavailable::<dyn SpeechSynthesizer>(),
            positions: unavailable::<dyn LocationProvider>(),
        };
        let intervals = RefreshIntervals {
            sensor: Duration::from_secs(5),
            weather: Duration::from_secs(20 * 60),
        };
        ViewRouter::new(services, intervals, signed_in()).await
    }
}

#[tokio::test(start_paused = true)]
async fn starts_on_the_dashboard_and_polls() {
    let rig = Rig::new();
    let router = rig.router().await;
    tokio::time::sleep(Duration::from_secs(11)).await;

    assert_eq!(router.view(), View::Dashboard);
    assert_eq!(rig.sensor.calls.load(Ordering::SeqCst), 3);
    match router.screen() {
        Screen::Dashboard(poller) => assert_eq!(poller.state().value, Some(reading(40.0))),
        _ => panic!("dashboard not mounted"),
    }
}

#[tokio::test(start_paused = true)]
async fn leaving_the_dashboard_stops_polling() {
    let rig = Rig::new();
    let mut router = rig.router().await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    router.navigate(View::Weather).await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(rig.sensor.calls.load(Ordering::SeqCst), 1);
    assert_eq!(rig.forecasts.calls.load(Ordering::SeqCst), 1);
    assert_eq!(router.view(), View::Weather);
}

#[tokio::test]
async fn market_sub_views_and_same_view_navigation() {
    let rig = Rig::new();
    let mut router = rig.router().await;

    router.navigate(View::Market(MarketView::Main)).await;
    router.navigate(View::Market(MarketView::Prices)).await;
    assert_eq!(router.view(), View::Market(MarketView::Prices));

    router.navigate(View::Profile).await;
    let reads = rig.profiles.reads.load(Ordering::SeqCst);
    router.navigate(View::Profile).await;
    assert_eq!(rig.profiles.reads.load(Ordering::SeqCst), reads);
}

#[tokio::test(start_paused = true)]
async fn chat_over_the_dashboard_sees_the_live_reading() {
    let rig = Rig::new();
    let mut router = rig.router().await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    router.open_chat().await;
    assert!(router.is_chat_open());
    let chat = router.chat().unwrap();
    chat.send_text("How is my soil?").unwrap().await.unwrap();

    assert_eq!(rig.advisor.requests.lock().unwrap()[0].sensor, Some(reading(40.0)));

    router.close_chat().await;
    assert!(!router.is_chat_open());
}

#[tokio::test(start_paused = true)]
async fn replacing_the_session_remounts_the_screen() {
    let rig = Rig::new();
    let mut router = rig.router().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    let before = rig.sensor.calls.load(Ordering::SeqCst);

    router.replace_session(signed_in()).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(router.view(), View::Dashboard);
    assert_eq!(rig.sensor.calls.load(Ordering::SeqCst), before + 1);
}
