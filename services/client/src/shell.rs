//! services/client/src/shell.rs
//!
//! The line-oriented terminal front end: parses `:commands`, drives the view
//! router and prints the active screen.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use agrigenius_core::domain::Identity;
use agrigenius_core::language::LanguageCode;
use agrigenius_core::ports::AuthService;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::controllers::{
    ChatState, LoginController, LoginMode, MarketView, ProfileController, Screen, View,
    ViewRouter,
};
use crate::error::ClientError;
use crate::render;
use crate::session::{LanguageSettings, SessionContext};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Navigate(View),
    Refetch,
    OpenChat,
    CloseChat,
    Attach(PathBuf),
    Unattach,
    Mic,
    Speak(usize),
    Language(String),
    Location(String, String),
    Url(String),
    Help,
    Quit,
    /// Free text, sent to the assistant when the chat is open.
    Message(String),
    Unknown(String),
}

/// Parses one input line.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix(':') else {
        return Command::Message(line.to_string());
    };
    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or("");
    let args: Vec<&str> = parts.collect();

    match (name, args.as_slice()) {
        ("home", []) => Command::Navigate(View::Dashboard),
        ("weather", []) => Command::Navigate(View::Weather),
        ("market", []) => Command::Navigate(View::Market(MarketView::Main)),
        ("market", ["prices"]) => Command::Navigate(View::Market(MarketView::Prices)),
        ("market", ["buy"]) => Command::Navigate(View::Market(MarketView::Buy)),
        ("market", ["sell"]) => Command::Navigate(View::Market(MarketView::Sell)),
        ("profile", []) => Command::Navigate(View::Profile),
        ("refetch", []) => Command::Refetch,
        ("chat", []) => Command::OpenChat,
        ("close", []) => Command::CloseChat,
        ("attach", [_, ..]) => {
            let path = rest.trim_start_matches("attach").trim();
            Command::Attach(PathBuf::from(path))
        }
        ("unattach", []) => Command::Unattach,
        ("mic", []) => Command::Mic,
        ("speak", [n]) => match n.parse::<usize>() {
            Ok(n) if n > 0 => Command::Speak(n),
            _ => Command::Unknown(line.to_string()),
        },
        ("lang", [code]) => Command::Language(code.to_string()),
        ("location", [lat, lon]) => Command::Location(lat.to_string(), lon.to_string()),
        ("url", [endpoint]) => Command::Url(endpoint.to_string()),
        ("url", []) => Command::Url(String::new()),
        ("help", []) => Command::Help,
        ("quit", []) | ("q", []) => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

/// Best-effort image type from the file extension.
pub fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

pub enum Flow {
    Continue(String),
    Quit,
}

//=========================================================================================
// Shell
//=========================================================================================

pub struct Shell {
    router: ViewRouter,
    language: LanguageSettings,
}

impl Shell {
    pub fn new(router: ViewRouter, language: LanguageSettings) -> Self {
        Self { router, language }
    }

    fn session(&self) -> &SessionContext {
        self.router.session()
    }

    /// Renders the active screen, with the chat underneath when it is open.
    pub fn render(&self) -> String {
        let session = self.session();
        let mut out = match self.router.screen() {
            Screen::Dashboard(poller) => render::dashboard(session, &poller.state()),
            Screen::Weather(refresher) => render::weather(session, &refresher.state()),
            Screen::Market(view) => render::market(session, *view),
            Screen::Profile(profile) => render::profile(session, profile.state()),
        };
        if let Some(chat) = self.router.chat() {
            out.push_str(&render::chat(session, &chat.state()));
        }
        out
    }

    fn chat_updates(&self) -> Option<watch::Receiver<ChatState>> {
        self.router.chat().map(|chat| chat.subscribe())
    }

    pub async fn handle_line(&mut self, line: &str) -> Flow {
        let command = parse_command(line);
        match command {
            Command::Quit => return Flow::Quit,
            Command::Help => return Flow::Continue(self.session().t("shellHelp")),
            Command::Unknown(text) => {
                let message = self.session().t_with("unknownCommand", &[("command", text.as_str())]);
                return Flow::Continue(message);
            }
            Command::Message(text) if text.is_empty() => {}
            Command::Message(text) => match self.router.chat() {
                Some(chat) => {
                    chat.set_input(&text);
                    chat.send();
                }
                None => return Flow::Continue(self.session().t("shellHelp")),
            },
            Command::Navigate(view) => self.router.navigate(view).await,
            Command::Refetch => self.refetch().await,
            Command::OpenChat => self.router.open_chat().await,
            Command::CloseChat => self.router.close_chat().await,
            Command::Attach(path) => {
                if let Err(e) = self.attach(&path).await {
                    warn!("Could not attach {}: {}", path.display(), e);
                    return Flow::Continue(e.to_string());
                }
            }
            Command::Unattach => {
                if let Some(chat) = self.router.chat() {
                    chat.clear_attachment();
                }
            }
            Command::Mic => {
                if let Some(chat) = self.router.chat() {
                    chat.toggle_capture().await;
                }
            }
            Command::Speak(n) => {
                if let Some(chat) = self.router.chat() {
                    if let Some(message) = chat.state().messages.get(n - 1) {
                        chat.toggle_speech(message.id);
                    }
                }
            }
            Command::Language(code) => match code.parse::<LanguageCode>() {
                Ok(language) => return Flow::Continue(self.apply_language(language).await),
                Err(_) => {
                    let message = self.session().t_with("unknownCommand", &[("command", code.as_str())]);
                    return Flow::Continue(message);
                }
            },
            Command::Location(lat, lon) => {
                self.edit_profile(|profile| profile.set_location(&lat, &lon)).await;
            }
            Command::Url(endpoint) => {
                self.edit_profile(|profile| {
                    profile.form_mut().script_url = endpoint;
                    true
                })
                .await;
            }
        }
        Flow::Continue(self.render())
    }

    async fn refetch(&mut self) {
        match self.router.screen_mut() {
            Screen::Dashboard(poller) => poller.refetch().await,
            Screen::Weather(refresher) => refresher.retry().await,
            Screen::Profile(profile) => profile.load().await,
            Screen::Market(_) => {}
        }
    }

    async fn attach(&mut self, path: &Path) -> Result<(), ClientError> {
        let bytes = Bytes::from(tokio::fs::read(path).await?);
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();
        let mime_type = mime_for(path);

        if let Some(chat) = self.router.chat() {
            chat.attach(&file_name, mime_type, bytes);
            return Ok(());
        }
        // Outside the chat an image becomes the new profile picture.
        self.edit_profile(|profile| {
            profile.stage_image(&file_name, mime_type, bytes);
            true
        })
        .await;
        Ok(())
    }

    /// Applies an edit to the profile form and saves it, opening the profile
    /// screen first when needed.
    async fn edit_profile<F>(&mut self, edit: F)
    where
        F: FnOnce(&mut ProfileController) -> bool,
    {
        self.router.navigate(View::Profile).await;
        let Screen::Profile(profile) = self.router.screen_mut() else {
            return;
        };
        if !edit(profile) {
            return;
        }
        let outcome = profile.save().await;
        if let Some(language) = outcome.and_then(|o| o.language_changed) {
            self.apply_language(language).await;
        }
    }

    async fn apply_language(&mut self, language: LanguageCode) -> String {
        // The profile update runs in the background; its failure is logged there.
        let _ = self.language.set_language(language);
        self.router.replace_session(self.language.context()).await;
        self.session()
            .t_with("languageChanged", &[("name", language.native_name())])
    }

    /// Reads commands until `:quit` or end of input. Chat updates that arrive
    /// in the background are printed as they land.
    pub async fn run(&mut self, lines: &mut Lines<BufReader<Stdin>>) -> Result<(), ClientError> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(self.render().as_bytes()).await?;
        stdout.write_all(self.session().t("shellHelp").as_bytes()).await?;
        stdout.write_all(b"\n").await?;

        loop {
            let mut updates = self.chat_updates();
            let changed = async {
                match updates.as_mut() {
                    Some(rx) => rx.changed().await.is_ok(),
                    None => std::future::pending::<bool>().await,
                }
            };

            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match self.handle_line(&line).await {
                        Flow::Quit => break,
                        Flow::Continue(output) => {
                            stdout.write_all(output.as_bytes()).await?;
                            stdout.write_all(b"\n").await?;
                        }
                    }
                }
                true = changed => {
                    if let Some(chat) = self.router.chat() {
                        let text = render::chat(self.session(), &chat.state());
                        stdout.write_all(text.as_bytes()).await?;
                    }
                }
            }
            stdout.flush().await?;
        }

        self.router.shutdown().await;
        info!("Shell closed");
        Ok(())
    }
}

//=========================================================================================
// Sign-in
//=========================================================================================

async fn prompt(
    stdout: &mut tokio::io::Stdout,
    lines: &mut Lines<BufReader<Stdin>>,
    label: &str,
) -> Result<Option<String>, ClientError> {
    stdout.write_all(format!("{}: ", label).as_bytes()).await?;
    stdout.flush().await?;
    Ok(lines.next_line().await?)
}

/// Runs the login form on the terminal until it yields an identity. Returns
/// `None` when input ends first.
pub async fn sign_in(
    auth: Arc<dyn AuthService>,
    session: &SessionContext,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<Option<Identity>, ClientError> {
    let mut stdout = tokio::io::stdout();
    let mut login = LoginController::new(auth);

    loop {
        stdout
            .write_all(render::login(session, login.form()).as_bytes())
            .await?;

        if login.form().mode == LoginMode::Register {
            let Some(name) = prompt(&mut stdout, lines, &session.t("fullName")).await? else {
                return Ok(None);
            };
            if name.trim() == ":switch" {
                login.switch_mode();
                continue;
            }
            login.form_mut().name = name;
        }
        let Some(email) = prompt(&mut stdout, lines, &session.t("emailAddress")).await? else {
            return Ok(None);
        };
        if email.trim() == ":switch" {
            login.switch_mode();
            continue;
        }
        let Some(password) = prompt(&mut stdout, lines, &session.t("password")).await? else {
            return Ok(None);
        };
        login.form_mut().email = email;
        login.form_mut().password = password;

        if let Some(identity) = login.submit().await {
            return Ok(Some(identity));
        }
    }
}
