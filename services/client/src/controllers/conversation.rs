//! services/client/src/controllers/conversation.rs
//!
//! The chat session behind the assistant overlay: the message log, the
//! request/response lifecycle, image staging, speech capture and playback.
//!
//! All view state lives in one `ChatState` published through a `watch`
//! channel. Background work (advisor requests, capture, playback) updates it
//! through `send_if_modified` closures that first check the session is still
//! open, so nothing lands in the log after `close`.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use agrigenius_core::domain::{
    AdviceRequest, ChatMessage, DeliveryStatus, FarmLocation, ImageAttachment, SensorReading,
    WeatherSnapshot,
};
use agrigenius_core::ports::{
    Capability, CropAdvisor, ForecastService, ProfileGateway, RecognitionEvent, RecognitionEvents,
    SpeechRecognizer, SpeechSynthesizer,
};
use agrigenius_core::voice::{classify_capture_error, utterance_for, CaptureFault};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::refresh::RefreshJob;
use super::sensor_poller::SensorState;
use super::weather_refresher::{ForecastJob, WeatherState};
use crate::session::SessionContext;

/// The services a chat session talks to.
#[derive(Clone)]
pub struct ConversationServices {
    pub advisor: Arc<dyn CropAdvisor>,
    pub profiles: Arc<dyn ProfileGateway>,
    pub forecasts: Arc<dyn ForecastService>,
    pub recognizer: Capability<dyn SpeechRecognizer>,
    pub synthesizer: Capability<dyn SpeechSynthesizer>,
}

/// Live data published by the other controllers, when they are running.
#[derive(Clone, Default)]
pub struct LiveFeeds {
    pub sensor: Option<watch::Receiver<SensorState>>,
    pub weather: Option<watch::Receiver<WeatherState>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub open: bool,
    pub messages: Vec<ChatMessage>,
    pub input: String,
    pub attachment: Option<ImageAttachment>,
    /// At least one advisor request is in flight.
    pub pending: bool,
    pub listening: bool,
    /// The message currently being read aloud.
    pub speaking: Option<Uuid>,
    pub speech_error: Option<String>,
    pub tts_error: Option<String>,
}

struct Inner {
    session: SessionContext,
    services: ConversationServices,
    feeds: LiveFeeds,
    state: watch::Sender<ChatState>,
    location: Mutex<Option<FarmLocation>>,
    /// Forecast fetched at open when no live weather feed was supplied.
    fallback_weather: Mutex<Option<WeatherSnapshot>>,
    in_flight: AtomicUsize,
    /// Bumped on every capture start and stop; stale capture events are dropped.
    capture_generation: AtomicU64,
    capture_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

pub struct ConversationController {
    inner: Arc<Inner>,
}

impl ConversationController {
    /// Opens a session: seeds the welcome message and loads the farm context.
    pub async fn open(session: SessionContext, services: ConversationServices, feeds: LiveFeeds) -> Self {
        let welcome = ChatMessage::bot(
            session.t("yourAIFarmAssistant"),
            Some(session.language.speech_tag()),
        );
        let (state, _) = watch::channel(ChatState {
            open: true,
            messages: vec![welcome],
            ..Default::default()
        });

        let controller = Self {
            inner: Arc::new(Inner {
                session,
                services,
                feeds,
                state,
                location: Mutex::new(None),
                fallback_weather: Mutex::new(None),
                in_flight: AtomicUsize::new(0),
                capture_generation: AtomicU64::new(0),
                capture_task: std::sync::Mutex::new(None),
            }),
        };
        controller.inner.load_context().await;
        controller
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> ChatState {
        self.inner.state.borrow().clone()
    }

    pub fn set_input(&self, text: &str) {
        self.inner.state.send_if_modified(|s| {
            if !s.open {
                return false;
            }
            s.input = text.to_string();
            true
        });
    }

    /// Stages an image and its data-URL preview for the next send.
    pub fn attach(&self, file_name: &str, mime_type: &str, bytes: Bytes) {
        let preview = format!("data:{};base64,{}", mime_type, STANDARD.encode(&bytes));
        let attachment = ImageAttachment {
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
            preview,
        };
        self.inner.state.send_if_modified(|s| {
            if !s.open {
                return false;
            }
            s.attachment = Some(attachment);
            true
        });
    }

    pub fn clear_attachment(&self) {
        self.inner.state.send_if_modified(|s| s.attachment.take().is_some());
    }

    /// Sends the current input (and staged image). Returns the handle of the
    /// background request, or `None` when there was nothing to send.
    pub fn send(&self) -> Option<JoinHandle<()>> {
        self.submit(None)
    }

    /// Sends `text` instead of the input box, as the suggestion chips do.
    pub fn send_text(&self, text: &str) -> Option<JoinHandle<()>> {
        self.submit(Some(text))
    }

    fn submit(&self, text: Option<&str>) -> Option<JoinHandle<()>> {
        let inner = &self.inner;
        let mut outgoing = None;

        inner.state.send_if_modified(|s| {
            if !s.open {
                return false;
            }
            let prompt = text.unwrap_or(&s.input).trim().to_string();
            if prompt.is_empty() && s.attachment.is_none() {
                return false;
            }
            let image = s.attachment.take();
            let message = ChatMessage::user(prompt.clone(), image.as_ref().map(|a| a.preview.clone()));
            outgoing = Some((message.id, prompt, image));

            s.messages.push(message);
            s.input.clear();
            inner.in_flight.fetch_add(1, Ordering::SeqCst);
            s.pending = true;
            true
        });

        let (message_id, prompt, image) = outgoing?;
        let inner = self.inner.clone();
        Some(tokio::spawn(async move {
            inner.deliver(message_id, prompt, image).await;
        }))
    }

    /// Starts or stops continuous speech capture in the display language.
    pub async fn toggle_capture(&self) {
        let inner = &self.inner;
        let Some(recognizer) = inner.services.recognizer.get().cloned() else {
            let message = inner.session.t("speechNotSupported");
            inner.state.send_modify(|s| s.speech_error = Some(message));
            return;
        };

        if inner.state.borrow().listening {
            inner.stop_capture().await;
            return;
        }

        let generation = inner.capture_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let tag = inner.session.language.speech_tag();
        match recognizer.start(&tag).await {
            Ok(events) => {
                let started = inner.state.send_if_modified(|s| {
                    if !s.open || inner.capture_generation.load(Ordering::SeqCst) != generation {
                        return false;
                    }
                    s.listening = true;
                    s.speech_error = None;
                    true
                });
                if !started {
                    recognizer.stop().await;
                    return;
                }
                info!("Speech capture started ({})", tag);
                let task = tokio::spawn(run_capture(inner.clone(), recognizer, events, generation, tag));
                inner.replace_capture_task(Some(task));
            }
            Err(e) => {
                warn!("Error starting speech recognition: {}", e);
                let message = inner.session.t("speechStartError");
                inner.state.send_modify(|s| {
                    s.listening = false;
                    s.speech_error = Some(message);
                });
            }
        }
    }

    /// Reads a message aloud, or stops it if it is already playing. Returns
    /// the handle of the playback task when playback starts.
    pub fn toggle_speech(&self, message_id: Uuid) -> Option<JoinHandle<()>> {
        let inner = &self.inner;
        let Some(synthesizer) = inner.services.synthesizer.get().cloned() else {
            let message = inner.session.t("ttsNotSupported");
            inner.state.send_modify(|s| s.tts_error = Some(message));
            return None;
        };

        let (speaking, message) = {
            let s = inner.state.borrow();
            let message = s.messages.iter().find(|m| m.id == message_id).cloned();
            (s.speaking, message)
        };

        if speaking == Some(message_id) {
            synthesizer.cancel();
            inner.state.send_modify(|s| s.speaking = None);
            return None;
        }
        let message = message?;

        synthesizer.cancel();
        let utterance = utterance_for(
            &message.text,
            message.language_tag.as_deref(),
            &synthesizer.voices(),
        );
        inner.state.send_modify(|s| {
            s.tts_error = None;
            s.speaking = Some(message_id);
        });

        let inner = self.inner.clone();
        Some(tokio::spawn(async move {
            let result = synthesizer.speak(utterance).await;
            let failure = result.err().map(|e| {
                error!("Speech playback error: {}", e);
                inner.session.t_with("ttsError", &[("error", e.to_string().as_str())])
            });
            inner.state.send_if_modified(|s| {
                if s.speaking != Some(message_id) {
                    return false;
                }
                s.speaking = None;
                if failure.is_some() {
                    s.tts_error = failure;
                }
                true
            });
        }))
    }

    /// Ends the session: stops playback and capture and drops the log.
    /// Responses that arrive later are discarded.
    pub async fn close(&self) {
        let inner = &self.inner;
        inner.shut_down();
        if let Some(recognizer) = inner.services.recognizer.get() {
            recognizer.stop().await;
        }
        info!("Chat session closed");
    }
}

impl Drop for ConversationController {
    fn drop(&mut self) {
        if !self.inner.state.borrow().open {
            return;
        }
        self.inner.shut_down();
        if let (Some(recognizer), Ok(handle)) = (
            self.inner.services.recognizer.get().cloned(),
            tokio::runtime::Handle::try_current(),
        ) {
            handle.spawn(async move { recognizer.stop().await });
        }
    }
}

impl Inner {
    async fn load_context(&self) {
        let Some(identity) = &self.session.identity else {
            return;
        };
        let location = match self.services.profiles.get_profile(identity).await {
            Ok(profile) => profile.farm_location,
            Err(e) => {
                warn!("Could not load the farm location for chat: {}", e);
                None
            }
        };
        *self.location.lock().await = location;

        if let (Some(location), None) = (location, &self.feeds.weather) {
            let job = ForecastJob {
                forecasts: self.services.forecasts.clone(),
                location,
                language: self.session.language,
            };
            match job.fetch().await {
                Ok(snapshot) => *self.fallback_weather.lock().await = Some(snapshot),
                Err(e) => error!("Failed to fetch weather for chat: {}", e),
            }
        }
    }

    fn latest_sensor(&self) -> Option<SensorReading> {
        self.feeds.sensor.as_ref().and_then(|rx| rx.borrow().value)
    }

    async fn latest_weather(&self) -> Option<WeatherSnapshot> {
        match &self.feeds.weather {
            Some(rx) => rx.borrow().value.clone(),
            None => self.fallback_weather.lock().await.clone(),
        }
    }

    async fn deliver(&self, message_id: Uuid, prompt: String, image: Option<ImageAttachment>) {
        let location = *self.location.lock().await;
        let weather = self.latest_weather().await;
        let request = AdviceRequest {
            prompt,
            image,
            sensor: self.latest_sensor(),
            location,
            weather,
            language: self.session.language,
        };

        let result = self.services.advisor.advise(request).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let generic_error = self.session.t("genericError");
        let error_tag = self.session.language.speech_tag();
        self.state.send_if_modified(|s| {
            if !s.open {
                return false;
            }
            match result {
                Ok(reply) => {
                    if let Some(sent) = s.messages.iter_mut().find(|m| m.id == message_id) {
                        sent.status = Some(DeliveryStatus::Delivered);
                    }
                    s.messages
                        .push(ChatMessage::bot(reply.text, Some(reply.language_tag)));
                }
                Err(e) => {
                    error!("Advisor request failed: {}", e);
                    s.messages.push(ChatMessage::bot(generic_error, Some(error_tag)));
                }
            }
            s.pending = self.in_flight.load(Ordering::SeqCst) > 0;
            true
        });
    }

    fn replace_capture_task(&self, task: Option<JoinHandle<()>>) {
        let previous = {
            let mut guard = self.capture_task.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::replace(&mut *guard, task)
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    async fn stop_capture(&self) {
        self.state.send_modify(|s| {
            self.capture_generation.fetch_add(1, Ordering::SeqCst);
            s.listening = false;
        });
        self.replace_capture_task(None);
        if let Some(recognizer) = self.services.recognizer.get() {
            recognizer.stop().await;
        }
        info!("Speech capture stopped");
    }

    /// Capture went away on its own. `message` is shown when present.
    fn end_capture(&self, generation: u64, message: Option<String>) {
        self.state.send_if_modified(|s| {
            if self.capture_generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            s.listening = false;
            if message.is_some() {
                s.speech_error = message;
            }
            true
        });
    }

    /// The synchronous part of closing, shared with `Drop`.
    fn shut_down(&self) {
        self.state.send_modify(|s| {
            self.capture_generation.fetch_add(1, Ordering::SeqCst);
            s.open = false;
            s.messages.clear();
            s.input.clear();
            s.attachment = None;
            s.pending = false;
            s.listening = false;
            s.speaking = None;
        });
        if let Some(synthesizer) = self.services.synthesizer.get() {
            synthesizer.cancel();
        }
        self.replace_capture_task(None);
    }
}

/// Applies recognition events until capture stops, restarting the engine
/// when it ends on its own.
async fn run_capture(
    inner: Arc<Inner>,
    recognizer: Arc<dyn SpeechRecognizer>,
    mut events: RecognitionEvents,
    generation: u64,
    tag: String,
) {
    loop {
        let event = events.next().await.unwrap_or(RecognitionEvent::Ended);
        match event {
            RecognitionEvent::Transcript(transcript) => {
                inner.state.send_if_modified(|s| {
                    if !s.listening || inner.capture_generation.load(Ordering::SeqCst) != generation {
                        return false;
                    }
                    s.input = transcript;
                    s.speech_error = None;
                    true
                });
            }
            RecognitionEvent::Error(code) => {
                warn!("Speech recognition error: {}", code);
                let message = match classify_capture_error(&code) {
                    CaptureFault::PermissionDenied => Some(inner.session.t("speechPermissionError")),
                    CaptureFault::Silent => None,
                    CaptureFault::Other(code) => Some(
                        inner
                            .session
                            .t_with("speechRecognitionError", &[("error", code.as_str())]),
                    ),
                };
                inner.end_capture(generation, message);
                return;
            }
            RecognitionEvent::Ended => {
                if inner.capture_generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                match recognizer.start(&tag).await {
                    Ok(restarted) => {
                        info!("Speech capture restarted");
                        events = restarted;
                    }
                    Err(e) => {
                        error!("Error restarting speech recognition: {}", e);
                        inner.end_capture(generation, None);
                        return;
                    }
                }
            }
        }
    }
}
