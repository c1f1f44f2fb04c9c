//! services/client/src/controllers/profile.rs
//!
//! The profile screen: shows the stored profile and edits it through a form
//! that is only written back on save.

use std::sync::Arc;

use agrigenius_core::domain::{FarmLocation, Identity, ImageAttachment, ProfilePatch, UserProfile};
use agrigenius_core::language::LanguageCode;
use agrigenius_core::ports::{Capability, LocationProvider, PortError, ProfileGateway};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use tracing::{error, info, warn};

use crate::session::SessionContext;

/// The editable copy of the profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileForm {
    pub name: String,
    pub farm_size: String,
    pub script_url: String,
    pub location: Option<FarmLocation>,
    pub language: LanguageCode,
    /// A new profile picture, uploaded on save.
    pub staged_image: Option<ImageAttachment>,
}

impl ProfileForm {
    /// `language` stands in when the record carries no supported language.
    fn from_profile(profile: &UserProfile, language: LanguageCode) -> Self {
        Self {
            name: profile.name.clone(),
            farm_size: profile.farm_size.clone().unwrap_or_default(),
            script_url: profile.script_url.clone().unwrap_or_default(),
            location: profile.farm_location,
            language: profile.preferred_language.unwrap_or(language),
            staged_image: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileState {
    pub profile: Option<UserProfile>,
    pub form: ProfileForm,
    pub editing: bool,
    pub loading: bool,
    pub saving: bool,
    pub error: Option<String>,
    pub notice: Option<String>,
}

/// What a successful save changed outside the profile record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    pub language_changed: Option<LanguageCode>,
}

pub struct ProfileController {
    session: SessionContext,
    profiles: Arc<dyn ProfileGateway>,
    positions: Capability<dyn LocationProvider>,
    state: ProfileState,
}

impl ProfileController {
    pub fn new(
        session: SessionContext,
        profiles: Arc<dyn ProfileGateway>,
        positions: Capability<dyn LocationProvider>,
    ) -> Self {
        Self {
            session,
            profiles,
            positions,
            state: ProfileState::default(),
        }
    }

    pub fn state(&self) -> &ProfileState {
        &self.state
    }

    pub fn form_mut(&mut self) -> &mut ProfileForm {
        &mut self.state.form
    }

    pub async fn load(&mut self) {
        let Some(identity) = self.session.identity.clone() else {
            self.state.error = Some(self.session.t("errorNoUser"));
            return;
        };
        self.state.loading = true;
        match self.profiles.get_profile(&identity).await {
            Ok(profile) => {
                self.state.form = ProfileForm::from_profile(&profile, self.session.language);
                self.state.profile = Some(profile);
                self.state.error = None;
            }
            Err(e) => {
                error!("Failed to load profile: {}", e);
                self.state.error = Some(self.session.describe_error(&e));
            }
        }
        self.state.loading = false;
    }

    /// Enters edit mode, or leaves it discarding unsaved changes.
    pub fn toggle_edit(&mut self) {
        self.state.editing = !self.state.editing;
        if !self.state.editing {
            if let Some(profile) = &self.state.profile {
                self.state.form = ProfileForm::from_profile(profile, self.session.language);
            }
        }
        self.state.notice = None;
    }

    pub fn stage_image(&mut self, file_name: &str, mime_type: &str, bytes: Bytes) {
        let preview = format!("data:{};base64,{}", mime_type, STANDARD.encode(&bytes));
        self.state.form.staged_image = Some(ImageAttachment {
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
            preview,
        });
    }

    /// Validates the manual latitude/longitude fields into the form.
    pub fn set_location(&mut self, lat: &str, lon: &str) -> bool {
        match FarmLocation::parse(lat, lon) {
            Ok(location) => {
                self.state.form.location = Some(location);
                self.state.error = None;
                true
            }
            Err(_) => {
                self.state.error = Some(self.session.t("invalidCoordinates"));
                false
            }
        }
    }

    pub fn clear_location(&mut self) {
        self.state.form.location = None;
    }

    /// Fills the location from a position fix.
    pub async fn use_current_position(&mut self) {
        let Some(provider) = self.positions.get().cloned() else {
            self.state.error = Some(self.session.t("locationError"));
            return;
        };
        match provider.current_position().await {
            Ok(location) => {
                self.state.form.location = Some(location);
                self.state.error = None;
            }
            Err(e) => {
                warn!("Could not get a position fix: {}", e);
                self.state.error = Some(self.session.t("locationError"));
            }
        }
    }

    /// Uploads a staged image, then writes the whole form back as one merge
    /// patch. Returns `None` when nothing was saved.
    ///
    /// The form only mirrors a loaded profile; without one nothing is written.
    pub async fn save(&mut self) -> Option<SaveOutcome> {
        let Some(identity) = self.session.identity.clone() else {
            self.state.error = Some(self.session.t("errorNoUser"));
            return None;
        };
        if self.state.profile.is_none() {
            warn!("Refusing to save a profile that was never loaded");
            self.state.error = Some(self.session.t("profileNotLoaded"));
            return None;
        }
        self.state.saving = true;
        let result = self.write_back(&identity).await;
        self.state.saving = false;

        match result {
            Ok(outcome) => {
                info!("Profile saved");
                self.state.editing = false;
                self.state.error = None;
                self.state.notice = Some(self.session.t("profileSaved"));
                Some(outcome)
            }
            Err(e) => {
                error!("Failed to save profile: {}", e);
                self.state.error = Some(self.session.t("profileSaveError"));
                None
            }
        }
    }

    async fn write_back(&mut self, identity: &Identity) -> Result<SaveOutcome, PortError> {
        let form = self.state.form.clone();
        let previous_image = self
            .state
            .profile
            .as_ref()
            .and_then(|p| p.profile_image.clone());

        let image = match &form.staged_image {
            Some(staged) => Some(
                self.profiles
                    .upload_image(identity, &staged.file_name, &staged.mime_type, staged.bytes.clone())
                    .await?,
            ),
            None => previous_image,
        };

        let patch = ProfilePatch {
            name: Some(form.name.trim().to_string()),
            farm_size: Some(form.farm_size.trim().to_string()),
            script_url: Some(form.script_url.trim().to_string()),
            farm_location: Some(form.location),
            profile_image: Some(image.unwrap_or_default()),
            preferred_language: Some(form.language),
        };
        self.profiles.save_profile(identity, &patch).await?;

        if let Some(profile) = self.state.profile.as_mut() {
            profile.apply(&patch);
        }
        if let Some(profile) = &self.state.profile {
            self.state.form = ProfileForm::from_profile(profile, self.session.language);
        }

        let language_changed = (form.language != self.session.language).then_some(form.language);
        Ok(SaveOutcome { language_changed })
    }
}
