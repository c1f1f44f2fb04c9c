//! Profile editing: location entry, image upload and the save patch.

mod common;

use std::sync::Arc;

use agrigenius_core::domain::FarmLocation;
use agrigenius_core::language::LanguageCode;
use agrigenius_core::ports::{Capability, LocationProvider, PortError};
use bytes::Bytes;
use client_lib::controllers::ProfileController;
use client_lib::session::SessionContext;
use common::{profile, signed_in, unavailable, FakeProfiles, FixedPosition};

fn controller(profiles: Arc<FakeProfiles>) -> ProfileController {
    ProfileController::new(signed_in(), profiles, unavailable::<dyn LocationProvider>())
}

fn hindi_session() -> SessionContext {
    let mut session = signed_in();
    session.language = LanguageCode::Hi;
    session
}

#[tokio::test]
async fn saved_location_reloads_with_the_same_coordinates() {
    let profiles = FakeProfiles::with(profile());
    let mut editor = controller(profiles.clone());
    editor.load().await;
    editor.toggle_edit();

    assert!(editor.set_location("40.0", "-75.0"));
    assert!(editor.save().await.is_some());

    let mut reloaded = controller(profiles);
    reloaded.load().await;
    let location = reloaded.state().profile.as_ref().unwrap().farm_location.unwrap();
    assert!((location.lat() - 40.0).abs() < 1e-6);
    assert!((location.lon() + 75.0).abs() < 1e-6);
    assert!(!editor.state().editing);
    assert_eq!(editor.state().notice.as_deref(), Some("Profile saved."));
}

#[tokio::test]
async fn out_of_range_coordinates_are_rejected() {
    let mut editor = controller(FakeProfiles::with(profile()));
    editor.load().await;

    assert!(!editor.set_location("91", "10"));
    assert!(!editor.set_location("north", "east"));
    assert_eq!(editor.state().form.location, None);
    assert!(editor.state().error.as_deref().unwrap().contains("valid latitude"));
}

#[tokio::test]
async fn unset_fields_are_written_as_empty_and_null() {
    let profiles = FakeProfiles::with(profile());
    let mut editor = controller(profiles.clone());
    editor.load().await;

    editor.save().await.unwrap();

    let patches = profiles.patches.lock().unwrap();
    let patch = &patches[0];
    assert_eq!(patch.farm_size.as_deref(), Some(""));
    assert_eq!(patch.script_url.as_deref(), Some(""));
    assert_eq!(patch.profile_image.as_deref(), Some(""));
    assert_eq!(patch.farm_location, Some(None));
    assert_eq!(patch.preferred_language, Some(LanguageCode::En));
}

#[tokio::test]
async fn staged_image_is_uploaded_before_the_patch() {
    let profiles = FakeProfiles::with(profile());
    let mut editor = controller(profiles.clone());
    editor.load().await;

    editor.stage_image("me.png", "image/png", Bytes::from_static(b"png"));
    editor.form_mut().script_url = " https://script.example/exec ".to_string();
    editor.save().await.unwrap();

    assert_eq!(*profiles.uploads.lock().unwrap(), vec!["me.png".to_string()]);
    let stored = profiles.stored().unwrap();
    assert_eq!(stored.profile_image.as_deref(), Some("https://storage.example/me.png"));
    assert_eq!(stored.script_url.as_deref(), Some("https://script.example/exec"));
    assert_eq!(editor.state().form.staged_image, None);
}

#[tokio::test]
async fn language_change_is_reported_to_the_caller() {
    let mut editor = controller(FakeProfiles::with(profile()));
    editor.load().await;

    editor.form_mut().language = LanguageCode::Hi;
    let outcome = editor.save().await.unwrap();

    assert_eq!(outcome.language_changed, Some(LanguageCode::Hi));
}

#[tokio::test]
async fn failed_save_keeps_editing_and_reports() {
    let profiles = FakeProfiles::with(profile());
    *profiles.save_error.lock().unwrap() = Some(PortError::PermissionDenied("rules".into()));
    let mut editor = controller(profiles);
    editor.load().await;
    editor.toggle_edit();

    assert!(editor.save().await.is_none());
    assert!(editor.state().editing);
    assert_eq!(
        editor.state().error.as_deref(),
        Some("Could not save your profile.")
    );
}

#[tokio::test]
async fn position_fix_fills_the_location() {
    let here = FarmLocation::new(26.8467, 80.9462).unwrap();
    let positions: Capability<dyn LocationProvider> =
        Capability::Available(Arc::new(FixedPosition(here)));
    let mut editor = ProfileController::new(signed_in(), FakeProfiles::with(profile()), positions);

    editor.use_current_position().await;
    assert_eq!(editor.state().form.location, Some(here));

    let mut without = controller(FakeProfiles::with(profile()));
    without.use_current_position().await;
    assert_eq!(without.state().error.as_deref(), Some("Could not get your location."));
}

#[tokio::test]
async fn nothing_is_written_when_the_profile_failed_to_load() {
    let profiles = FakeProfiles::with(profile());
    *profiles.read_error.lock().unwrap() = Some(PortError::Network {
        message: "connection reset".into(),
        likely_cors: false,
    });
    let mut editor =
        ProfileController::new(hindi_session(), profiles.clone(), unavailable::<dyn LocationProvider>());
    editor.load().await;
    assert!(editor.state().profile.is_none());

    editor.form_mut().script_url = "https://script.example/exec".to_string();
    assert!(editor.save().await.is_none());

    assert!(profiles.patches.lock().unwrap().is_empty());
    assert!(profiles.uploads.lock().unwrap().is_empty());
    assert_eq!(profiles.stored(), Some(profile()));
    assert!(editor
        .state()
        .error
        .as_deref()
        .unwrap()
        .contains("nothing was saved"));
}

#[tokio::test]
async fn missing_profile_language_keeps_the_display_language() {
    let mut stored = profile();
    stored.preferred_language = None;
    let profiles = FakeProfiles::with(stored);
    let mut editor =
        ProfileController::new(hindi_session(), profiles.clone(), unavailable::<dyn LocationProvider>());
    editor.load().await;
    assert_eq!(editor.state().form.language, LanguageCode::Hi);

    editor.form_mut().farm_size = "3 acres".to_string();
    let outcome = editor.save().await.unwrap();

    assert_eq!(outcome.language_changed, None);
    assert_eq!(
        profiles.patches.lock().unwrap()[0].preferred_language,
        Some(LanguageCode::Hi)
    );
}
