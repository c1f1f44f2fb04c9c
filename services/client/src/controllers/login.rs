//! services/client/src/controllers/login.rs
//!
//! The sign-in / registration form.

use std::sync::Arc;

use agrigenius_core::domain::{Credentials, Identity, Registration};
use agrigenius_core::ports::{AuthService, PortError};
use tracing::{info, warn};

const MISSING_CREDENTIALS: &str = "Please enter email and password.";
const MISSING_FIELDS: &str = "Please fill in all fields.";
const INVALID_CREDENTIALS: &str = "Error: Invalid Credentials";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginMode {
    #[default]
    SignIn,
    Register,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginForm {
    pub mode: LoginMode,
    pub name: String,
    pub email: String,
    pub password: String,
    pub busy: bool,
    pub error: Option<String>,
}

pub struct LoginController {
    auth: Arc<dyn AuthService>,
    form: LoginForm,
}

impl LoginController {
    pub fn new(auth: Arc<dyn AuthService>) -> Self {
        Self {
            auth,
            form: LoginForm::default(),
        }
    }

    pub fn form(&self) -> &LoginForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut LoginForm {
        &mut self.form
    }

    pub fn switch_mode(&mut self) {
        self.form.mode = match self.form.mode {
            LoginMode::SignIn => LoginMode::Register,
            LoginMode::Register => LoginMode::SignIn,
        };
        self.form.error = None;
    }

    /// Validates the form and calls the auth provider. On failure the message
    /// to show is left in `form.error`.
    pub async fn submit(&mut self) -> Option<Identity> {
        let email = self.form.email.trim().to_string();
        let password = self.form.password.clone();
        let name = self.form.name.trim().to_string();

        let missing = match self.form.mode {
            LoginMode::SignIn => (email.is_empty() || password.is_empty()).then_some(MISSING_CREDENTIALS),
            LoginMode::Register => (name.is_empty() || email.is_empty() || password.is_empty())
                .then_some(MISSING_FIELDS),
        };
        if let Some(message) = missing {
            self.form.error = Some(message.to_string());
            return None;
        }

        self.form.busy = true;
        self.form.error = None;
        let result = match self.form.mode {
            LoginMode::SignIn => self.auth.sign_in(&Credentials { email, password }).await,
            LoginMode::Register => {
                self.auth
                    .sign_up(&Registration {
                        name,
                        email,
                        password,
                    })
                    .await
            }
        };
        self.form.busy = false;

        match result {
            Ok(identity) => {
                info!("Signed in as {}", identity.email);
                self.form.password.clear();
                Some(identity)
            }
            Err(e) => {
                warn!("Authentication failed: {}", e);
                self.form.error = Some(match e {
                    PortError::InvalidCredentials => INVALID_CREDENTIALS.to_string(),
                    PortError::Unexpected(message) => message,
                    other => other.to_string(),
                });
                None
            }
        }
    }
}
