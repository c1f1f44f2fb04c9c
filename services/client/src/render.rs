//! services/client/src/render.rs
//!
//! Plain-text renditions of each screen's view state for the terminal shell.

use std::fmt::Write as _;

use agrigenius_core::advice::assess;
use agrigenius_core::domain::{DeliveryStatus, Sender};
use agrigenius_core::market::{AGRI_INPUTS, CROP_PRICES, SEED_SCHEMES};
use agrigenius_core::ports::PortError;
use chrono::{DateTime, Local, Utc};

use crate::controllers::{
    ChatState, LoginForm, LoginMode, MarketView, ProfileState, SensorState, WeatherState,
};
use crate::session::SessionContext;

fn clock(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// "Last updated" line under the live readings. A failure after an earlier
/// success is reported as a connection issue.
pub fn status_line(session: &SessionContext, state: &SensorState) -> Option<String> {
    let time = clock(state.last_success?);
    let key = if state.error.is_some() {
        "connectionIssue"
    } else {
        "lastUpdated"
    };
    Some(session.t_with(key, &[("time", time.as_str())]))
}

pub fn dashboard(session: &SessionContext, state: &SensorState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", session.t("farmOverview"));

    if state.loading {
        let _ = writeln!(out, "{}", session.t("fetchingLiveData"));
        return out;
    }

    match (&state.value, &state.error) {
        (None, Some(error)) => {
            let _ = writeln!(out, "{}", session.describe_error(error));
            if matches!(error, PortError::NotConfigured(_)) {
                let _ = writeln!(out, "{} (:profile)", session.t("goToSettings"));
            }
        }
        (Some(r), _) => {
            let _ = writeln!(out, "-- {} --", session.t("liveData"));
            let rows = [
                ("nitrogen", format!("{:.1}", r.nitrogen)),
                ("phosphorus", format!("{:.1}", r.phosphorus)),
                ("potassium", format!("{:.1}", r.potassium)),
                ("temperature", format!("{:.1} °C", r.temperature)),
                ("humidity", format!("{:.1} %", r.humidity)),
                ("moisture", format!("{:.1} %", r.moisture)),
            ];
            for (key, value) in rows {
                let _ = writeln!(out, "  {:<14}{}", session.t(key), value);
            }
            if let Some(line) = status_line(session, state) {
                let _ = writeln!(out, "{}", line);
            }
        }
        (None, None) => {}
    }

    let _ = writeln!(out, "-- {} --", session.t("todaysAdvice"));
    for tip in assess(state.value.as_ref()) {
        let _ = writeln!(out, "  * {}", session.t(tip.key()));
    }
    out
}

pub fn weather(session: &SessionContext, state: &WeatherState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", session.t("weatherForecast"));

    if state.loading {
        let _ = writeln!(out, "{}", session.t("fetchingLiveData"));
        return out;
    }

    let Some(snapshot) = &state.value else {
        match &state.error {
            Some(PortError::NotConfigured(_)) => {
                let _ = writeln!(out, "{}", session.t("setFarmLocationPrompt"));
                let _ = writeln!(out, "{} (:profile)", session.t("goToProfile"));
            }
            Some(error) => {
                let _ = writeln!(out, "{} {}", session.t("weatherError"), session.describe_error(error));
                let _ = writeln!(out, "{} (:refetch)", session.t("tryAgain"));
            }
            None => {}
        }
        return out;
    };

    let current = &snapshot.current;
    let _ = writeln!(
        out,
        "{}: {:.0}°C, {} | {} {:.0}% | {} {:.1} km/h",
        session.t("now"),
        current.temperature,
        current.condition,
        session.t("humidity"),
        current.humidity,
        session.t("wind"),
        current.wind_speed
    );

    let _ = writeln!(out, "-- {} --", session.t("hourlyForecast"));
    for hour in &snapshot.hourly {
        let _ = writeln!(out, "  {:>6}  {:>4.0}°C  {}", hour.time, hour.temperature, hour.condition);
    }

    let _ = writeln!(out, "-- {} --", session.t("dailyForecast"));
    for day in &snapshot.daily {
        let _ = writeln!(
            out,
            "  {:<10} {:>4.0}° / {:>4.0}°  {}",
            day.day, day.max_temp, day.min_temp, day.condition
        );
    }

    if state.error.is_some() {
        if let Some(time) = state.last_success.map(clock) {
            let _ = writeln!(out, "{}", session.t_with("connectionIssue", &[("time", time.as_str())]));
        }
    }
    out
}

pub fn market(session: &SessionContext, view: MarketView) -> String {
    let mut out = String::new();
    match view {
        MarketView::Main => {
            let _ = writeln!(out, "== {} ==", session.t("marketHub"));
            let options = [
                ("prices", "liveCropPrices", "liveCropPricesDesc"),
                ("buy", "buyAgriInputs", "buyAgriInputsDesc"),
                ("sell", "sellCropResidue", "sellCropResidueDesc"),
            ];
            for (command, title, desc) in options {
                let _ = writeln!(out, "  :market {:<7} {} - {}", command, session.t(title), session.t(desc));
            }
        }
        MarketView::Prices => {
            let _ = writeln!(out, "== {} ==", session.t("liveCropPrices"));
            let _ = writeln!(
                out,
                "  {:<14}{:<18}{}",
                session.t("crop"),
                session.t("price"),
                session.t("trend")
            );
            for item in CROP_PRICES {
                let _ = writeln!(out, "  {:<14}{:<18}{}", session.t(item.name_key), item.price, item.trend.arrow());
            }
            let today = Local::now().format("%d %b %Y").to_string();
            let _ = writeln!(out, "{}", session.t_with("pricesDisclaimer", &[("time", today.as_str())]));
        }
        MarketView::Buy => {
            let _ = writeln!(out, "== {} ==", session.t("buyAgriInputs"));
            for item in AGRI_INPUTS {
                let _ = writeln!(out, "  {:<22}{}", session.t(item.name_key), item.link);
            }
            let _ = writeln!(out, "-- {} --", session.t("govSeedSchemes"));
            for item in SEED_SCHEMES {
                let _ = writeln!(out, "  {:<22}{}", session.t(item.name_key), item.scheme);
            }
        }
        MarketView::Sell => {
            let _ = writeln!(out, "== {} ==", session.t("sellCropResidue"));
            let _ = writeln!(out, "{}", session.t("stubbleSloganTitle"));
            let _ = writeln!(out, "{}", session.t("stubbleSloganDesc"));
            let _ = writeln!(out, "{}: {}", session.t("listYourResidue"), session.t("featureComingSoon"));
        }
    }
    if view != MarketView::Main {
        let _ = writeln!(out, "{} (:market)", session.t("goBackToOptions"));
    }
    out
}

pub fn profile(session: &SessionContext, state: &ProfileState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", session.t("profile"));
    if state.loading {
        let _ = writeln!(out, "{}", session.t("fetchingLiveData"));
        return out;
    }

    let form = &state.form;
    let not_set = session.t("locationNotSet");
    let location = form
        .location
        .map(|l| format!("{:.4}, {:.4}", l.lat(), l.lon()))
        .unwrap_or_else(|| not_set.clone());
    let email = state.profile.as_ref().map(|p| p.email.as_str()).unwrap_or("");

    let _ = writeln!(out, "  {:<20}{}", session.t("username"), form.name);
    let _ = writeln!(out, "  {:<20}{}", session.t("emailAddress"), email);
    let _ = writeln!(out, "  {:<20}{}", session.t("farmSize"), or_dash(&form.farm_size));
    let _ = writeln!(out, "  {:<20}{}", session.t("location"), location);
    let _ = writeln!(out, "  {:<20}{}", session.t("sensorConfig"), or_dash(&form.script_url));
    let _ = writeln!(
        out,
        "  {:<20}{}",
        session.t("languageSettings"),
        form.language.native_name()
    );
    if let Some(image) = &form.staged_image {
        let _ = writeln!(out, "  {}", session.t_with("imageAttached", &[("name", image.file_name.as_str())]));
    }
    if let Some(error) = &state.error {
        let _ = writeln!(out, "! {}", error);
    }
    if let Some(notice) = &state.notice {
        let _ = writeln!(out, "{}", notice);
    }
    out
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

/// The chat log, numbered so messages can be addressed by `:speak <n>`.
pub fn chat(session: &SessionContext, state: &ChatState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", session.t("agriGeniusAssistant"));

    for (n, message) in state.messages.iter().enumerate() {
        let who = match message.sender {
            Sender::User => "you",
            Sender::Bot => "bot",
        };
        let status = match message.status {
            Some(DeliveryStatus::Sent) => " ✓",
            Some(DeliveryStatus::Delivered) => " ✓✓",
            None => "",
        };
        let playing = if state.speaking == Some(message.id) { " ♪" } else { "" };
        let _ = writeln!(
            out,
            "[{}] {} {}: {}{}{}",
            n + 1,
            message.timestamp.with_timezone(&Local).format("%H:%M"),
            who,
            message.text,
            status,
            playing
        );
        if message.image.is_some() {
            let _ = writeln!(out, "    [image]");
        }
    }

    if let Some(image) = &state.attachment {
        let _ = writeln!(out, "{}", session.t_with("imageAttached", &[("name", image.file_name.as_str())]));
    }
    if state.pending {
        let _ = writeln!(out, "{}", session.t("sending"));
    }
    if state.listening {
        let _ = writeln!(out, "{}", session.t("listening"));
    }
    for error in [&state.speech_error, &state.tts_error].into_iter().flatten() {
        let _ = writeln!(out, "! {}", error);
    }
    out
}

pub fn login(session: &SessionContext, form: &LoginForm) -> String {
    let mut out = String::new();
    let (title, other) = match form.mode {
        LoginMode::SignIn => ("welcomeBack", "noAccount"),
        LoginMode::Register => ("createAccount", "haveAccount"),
    };
    let _ = writeln!(out, "== {} ==", session.t(title));
    if let Some(error) = &form.error {
        let _ = writeln!(out, "! {}", error);
    }
    let _ = writeln!(out, "({} :switch)", session.t(other));
    out
}
