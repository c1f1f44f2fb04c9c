//! Hand-written port fakes shared by the controller tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use agrigenius_core::domain::{
    AdviceReply, AdviceRequest, Credentials, DailySeries, FarmLocation, HourlySeries, Identity,
    ProfilePatch, RawForecast, Registration, SensorReading, UserProfile,
};
use agrigenius_core::language::LanguageCode;
use agrigenius_core::ports::{
    AuthService, Capability, CropAdvisor, ForecastService, LocationProvider, PortError,
    PortResult, PreferenceStore, ProfileGateway, RecognitionEvent, RecognitionEvents,
    SensorSource, SpeechRecognizer, SpeechSynthesizer, Utterance, Voice,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Timelike, Utc};
use client_lib::controllers::SensorState;
use client_lib::session::SessionContext;
use futures::channel::mpsc;
use tokio::sync::{watch, Notify, Semaphore};

pub fn identity() -> Identity {
    Identity {
        user_id: "uid-ravi".to_string(),
        email: "ravi@example.com".to_string(),
        id_token: "token-123".to_string(),
    }
}

pub fn profile() -> UserProfile {
    UserProfile {
        name: "Ravi".to_string(),
        email: "ravi@example.com".to_string(),
        farm_size: None,
        script_url: None,
        farm_location: None,
        profile_image: None,
        preferred_language: Some(LanguageCode::En),
    }
}

pub fn signed_in() -> SessionContext {
    let mut session = SessionContext::anonymous();
    session.identity = Some(identity());
    session
}

pub fn reading(nitrogen: f64) -> SensorReading {
    SensorReading {
        nitrogen,
        phosphorus: 20.0,
        potassium: 60.0,
        temperature: 27.5,
        humidity: 65.0,
        moisture: 40.0,
    }
}

/// Pops scripted results in order and repeats the last one.
fn next_scripted<T: Clone>(script: &Mutex<VecDeque<T>>) -> T {
    let mut script = script.lock().unwrap();
    if script.len() > 1 {
        script.pop_front().unwrap()
    } else {
        script.front().cloned().unwrap()
    }
}

//=========================================================================================
// Profiles
//=========================================================================================

pub struct FakeProfiles {
    pub profile: Mutex<Option<UserProfile>>,
    pub patches: Mutex<Vec<ProfilePatch>>,
    pub uploads: Mutex<Vec<String>>,
    pub reads: AtomicUsize,
    /// Returned by `get_profile` instead of the record while set.
    pub read_error: Mutex<Option<PortError>>,
    pub save_error: Mutex<Option<PortError>>,
}

impl FakeProfiles {
    pub fn with(profile: UserProfile) -> Arc<Self> {
        Arc::new(Self {
            profile: Mutex::new(Some(profile)),
            patches: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
            read_error: Mutex::new(None),
            save_error: Mutex::new(None),
        })
    }

    pub fn empty() -> Arc<Self> {
        let profiles = Self::with(profile());
        *profiles.profile.lock().unwrap() = None;
        profiles
    }

    pub fn stored(&self) -> Option<UserProfile> {
        self.profile.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileGateway for FakeProfiles {
    async fn get_profile(&self, _identity: &Identity) -> PortResult<UserProfile> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.read_error.lock().unwrap().clone() {
            return Err(e);
        }
        self.profile
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PortError::NotFound("users/uid-ravi".to_string()))
    }

    async fn save_profile(&self, _identity: &Identity, patch: &ProfilePatch) -> PortResult<()> {
        if let Some(e) = self.save_error.lock().unwrap().clone() {
            return Err(e);
        }
        self.patches.lock().unwrap().push(patch.clone());
        if let Some(profile) = self.profile.lock().unwrap().as_mut() {
            profile.apply(patch);
        }
        Ok(())
    }

    async fn upload_image(
        &self,
        _identity: &Identity,
        file_name: &str,
        _mime_type: &str,
        _bytes: Bytes,
    ) -> PortResult<String> {
        self.uploads.lock().unwrap().push(file_name.to_string());
        Ok(format!("https://storage.example/{}", file_name))
    }
}

//=========================================================================================
// Sensor & Forecast
//=========================================================================================

pub struct FakeSensor {
    results: Mutex<VecDeque<PortResult<SensorReading>>>,
    pub calls: AtomicUsize,
    pub endpoints: Mutex<Vec<String>>,
    /// When set, each fetch records the `loading` flag published at that moment.
    pub watching: Mutex<Option<watch::Receiver<SensorState>>>,
    pub loading_seen: Mutex<Vec<bool>>,
}

impl FakeSensor {
    pub fn new(results: Vec<PortResult<SensorReading>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            calls: AtomicUsize::new(0),
            endpoints: Mutex::new(Vec::new()),
            watching: Mutex::new(None),
            loading_seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SensorSource for FakeSensor {
    async fn fetch_reading(&self, endpoint: &str) -> PortResult<SensorReading> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.endpoints.lock().unwrap().push(endpoint.to_string());
        if let Some(rx) = self.watching.lock().unwrap().as_ref() {
            let loading = rx.borrow().loading;
            self.loading_seen.lock().unwrap().push(loading);
        }
        next_scripted(&self.results)
    }
}

/// A forecast whose first hour is one hour ago (UTC), so the current hour
/// is index 1 and at least `hours - 1` entries remain.
pub fn raw_forecast(hours: usize, days: usize) -> RawForecast {
    let start = (Utc::now() - Duration::hours(1))
        .naive_utc()
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap();
    let today = Utc::now().date_naive();

    RawForecast {
        utc_offset_seconds: 0,
        hourly: HourlySeries {
            time: (0..hours).map(|i| start + Duration::hours(i as i64)).collect(),
            temperature: (0..hours).map(|i| 20.0 + i as f64).collect(),
            humidity: vec![60.0; hours],
            weather_code: vec![1; hours],
            wind_speed: vec![8.5; hours],
        },
        daily: DailySeries {
            date: (0..days).map(|i| today + Duration::days(i as i64)).collect(),
            weather_code: vec![3; days],
            temperature_max: vec![31.0; days],
            temperature_min: vec![19.0; days],
        },
    }
}

pub struct FakeForecast {
    results: Mutex<VecDeque<PortResult<RawForecast>>>,
    pub calls: AtomicUsize,
    pub locations: Mutex<Vec<FarmLocation>>,
}

impl FakeForecast {
    pub fn new(results: Vec<PortResult<RawForecast>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            calls: AtomicUsize::new(0),
            locations: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ForecastService for FakeForecast {
    async fn fetch_forecast(&self, location: FarmLocation) -> PortResult<RawForecast> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.locations.lock().unwrap().push(location);
        next_scripted(&self.results)
    }
}

//=========================================================================================
// Advisor
//=========================================================================================

/// Answers from a script. When gated, each answer waits for `release`.
/// When held, request `n` gets scripted result `n` once `answer(n)` is called.
pub struct FakeAdvisor {
    results: Mutex<VecDeque<PortResult<AdviceReply>>>,
    pub requests: Mutex<Vec<AdviceRequest>>,
    gate: Option<Semaphore>,
    turns: Vec<Semaphore>,
}

impl FakeAdvisor {
    pub fn new(results: Vec<PortResult<AdviceReply>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
            gate: None,
            turns: Vec::new(),
        })
    }

    pub fn gated(results: Vec<PortResult<AdviceReply>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
            gate: Some(Semaphore::new(0)),
            turns: Vec::new(),
        })
    }

    pub fn held(results: Vec<PortResult<AdviceReply>>) -> Arc<Self> {
        let turns = results.iter().map(|_| Semaphore::new(0)).collect();
        Arc::new(Self {
            results: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
            gate: None,
            turns,
        })
    }

    /// Lets the `index`-th request (zero-based) return its scripted result.
    pub fn answer(&self, index: usize) {
        self.turns[index].add_permits(1);
    }

    pub fn release(&self, answers: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(answers);
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

pub fn reply(text: &str, tag: &str) -> AdviceReply {
    AdviceReply {
        text: text.to_string(),
        language_tag: tag.to_string(),
    }
}

#[async_trait]
impl CropAdvisor for FakeAdvisor {
    async fn advise(&self, request: AdviceRequest) -> PortResult<AdviceReply> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len() - 1
        };
        if !self.turns.is_empty() {
            self.turns[index].acquire().await.unwrap().forget();
            return self.results.lock().unwrap()[index].clone();
        }
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        next_scripted(&self.results)
    }
}

//=========================================================================================
// Speech
//=========================================================================================

/// A recognizer driven by the test through `emit`.
pub struct FakeRecognizer {
    sender: Mutex<Option<mpsc::UnboundedSender<RecognitionEvent>>>,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    /// Number of starts that succeed before every further start fails.
    pub allowed_starts: AtomicUsize,
}

impl FakeRecognizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sender: Mutex::new(None),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            allowed_starts: AtomicUsize::new(usize::MAX),
        })
    }

    pub fn emit(&self, event: RecognitionEvent) {
        if let Some(sender) = self.sender.lock().unwrap().as_ref() {
            let _ = sender.unbounded_send(event);
        }
    }
}

#[async_trait]
impl SpeechRecognizer for FakeRecognizer {
    async fn start(&self, _language_tag: &str) -> PortResult<RecognitionEvents> {
        let started = self.starts.fetch_add(1, Ordering::SeqCst);
        if started >= self.allowed_starts.load(Ordering::SeqCst) {
            return Err(PortError::UnsupportedCapability("microphone busy".to_string()));
        }
        let (tx, rx) = mpsc::unbounded();
        *self.sender.lock().unwrap() = Some(tx);
        Ok(Box::pin(rx))
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Playback that lasts until `finish` or `cancel`.
pub struct FakeSynth {
    pub spoken: Mutex<Vec<Utterance>>,
    pub cancels: AtomicUsize,
    done: Notify,
    pub failure: Mutex<Option<PortError>>,
}

impl FakeSynth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            spoken: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
            done: Notify::new(),
            failure: Mutex::new(None),
        })
    }

    pub fn finish(&self) {
        self.done.notify_waiters();
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    fn voices(&self) -> Vec<Voice> {
        vec![
            Voice {
                name: "english".to_string(),
                language_tag: "en-US".to_string(),
            },
            Voice {
                name: "hindi".to_string(),
                language_tag: "hi-IN".to_string(),
            },
        ]
    }

    async fn speak(&self, utterance: Utterance) -> PortResult<()> {
        self.spoken.lock().unwrap().push(utterance);
        self.done.notified().await;
        match self.failure.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.done.notify_waiters();
    }
}

pub fn unavailable<T: ?Sized>() -> Capability<T> {
    Capability::Unavailable("not in tests".to_string())
}

//=========================================================================================
// Auth, Position & Preferences
//=========================================================================================

pub struct FakeAuth {
    result: PortResult<Identity>,
    pub calls: AtomicUsize,
}

impl FakeAuth {
    pub fn new(result: PortResult<Identity>) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl AuthService for FakeAuth {
    async fn sign_in(&self, _credentials: &Credentials) -> PortResult<Identity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }

    async fn sign_up(&self, _registration: &Registration) -> PortResult<Identity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

pub struct FixedPosition(pub FarmLocation);

#[async_trait]
impl LocationProvider for FixedPosition {
    async fn current_position(&self) -> PortResult<FarmLocation> {
        Ok(self.0)
    }
}

#[derive(Default)]
pub struct FakePreferences {
    pub language: Mutex<Option<LanguageCode>>,
}

impl PreferenceStore for FakePreferences {
    fn load_language(&self) -> PortResult<Option<LanguageCode>> {
        Ok(*self.language.lock().unwrap())
    }

    fn store_language(&self, language: LanguageCode) -> PortResult<()> {
        *self.language.lock().unwrap() = Some(language);
        Ok(())
    }
}
