//! services/client/src/adapters/firebase.rs
//!
//! This module contains the remote data gateway: the concrete implementation of
//! the `AuthService` and `ProfileGateway` ports from the `core` crate. It talks to
//! the hosted backend over plain REST (Identity Toolkit for accounts, the
//! Realtime Database for `users/<uid>` records, Storage for profile images).
//!
//! ID tokens live for an hour. The adapter keeps each signed-in user's refresh
//! token and exchanges it shortly before expiry, or once after a 401.

use agrigenius_core::domain::{
    non_empty, Credentials, FarmLocation, Identity, ProfilePatch, Registration, UserProfile,
};
use agrigenius_core::language::LanguageCode;
use agrigenius_core::ports::{AuthService, PortError, PortResult, ProfileGateway};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::network_error;

const IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const STORAGE_BASE_URL: &str = "https://firebasestorage.googleapis.com/v0";
const SECURE_TOKEN_BASE_URL: &str = "https://securetoken.googleapis.com/v1";

/// Tokens this close to expiry are exchanged before use.
const REFRESH_MARGIN_SECS: i64 = 300;
/// Lifetime assumed when the provider omits or garbles `expiresIn`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Auth provider error codes that all mean "wrong email or password".
const CREDENTIAL_ERRORS: [&str; 4] = [
    "INVALID_LOGIN_CREDENTIALS",
    "INVALID_PASSWORD",
    "EMAIL_NOT_FOUND",
    "INVALID_EMAIL",
];

/// Project settings for the hosted backend.
#[derive(Clone, Debug)]
pub struct FirebaseSettings {
    pub api_key: String,
    /// Realtime Database root, without a trailing slash.
    pub database_url: String,
    pub storage_bucket: String,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A gateway adapter that implements the `AuthService` and `ProfileGateway` ports.
#[derive(Clone)]
pub struct FirebaseAdapter {
    client: Client,
    settings: FirebaseSettings,
    identity_base_url: String,
    storage_base_url: String,
    secure_token_base_url: String,
    /// Live token grants, keyed by user id.
    tokens: Arc<Mutex<HashMap<String, TokenGrant>>>,
}

impl FirebaseAdapter {
    /// Creates a new `FirebaseAdapter` against the production endpoints.
    pub fn new(client: Client, settings: FirebaseSettings) -> Self {
        Self {
            client,
            settings,
            identity_base_url: IDENTITY_BASE_URL.to_string(),
            storage_base_url: STORAGE_BASE_URL.to_string(),
            secure_token_base_url: SECURE_TOKEN_BASE_URL.to_string(),
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Points the account, storage and token calls at other hosts (local emulators).
    pub fn with_base_urls(
        mut self,
        identity_base_url: &str,
        storage_base_url: &str,
        secure_token_base_url: &str,
    ) -> Self {
        self.identity_base_url = identity_base_url.trim_end_matches('/').to_string();
        self.storage_base_url = storage_base_url.trim_end_matches('/').to_string();
        self.secure_token_base_url = secure_token_base_url.trim_end_matches('/').to_string();
        self
    }

    fn user_url(&self, identity: &Identity) -> String {
        format!("{}/users/{}.json", self.settings.database_url, identity.user_id)
    }

    async fn account_request(&self, action: &str, body: Value) -> PortResult<Identity> {
        let url = format!("{}/accounts:{}", self.identity_base_url, action);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.settings.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(auth_error(&body));
        }

        let record: AccountRecord = response
            .json()
            .await
            .map_err(|e| PortError::MalformedResponse(format!("account response: {}", e)))?;
        let (identity, grant) = record.to_domain(Utc::now());
        match grant {
            Some(grant) => {
                self.tokens.lock().await.insert(identity.user_id.clone(), grant);
            }
            None => warn!("No refresh token for {}; its session ends with the ID token", identity.user_id),
        }
        Ok(identity)
    }

    /// The token to send for `identity`, exchanged first when close to expiry.
    /// Identities this adapter never signed in use their own token as-is.
    async fn bearer(&self, identity: &Identity) -> PortResult<String> {
        let mut tokens = self.tokens.lock().await;
        let Some(grant) = tokens.get(&identity.user_id) else {
            return Ok(identity.id_token.clone());
        };
        if !grant.expires_soon(Utc::now()) {
            return Ok(grant.id_token.clone());
        }
        debug!("ID token for {} is about to expire", identity.user_id);
        let fresh = self.exchange(&grant.refresh_token).await?;
        let token = fresh.id_token.clone();
        tokens.insert(identity.user_id.clone(), fresh);
        Ok(token)
    }

    /// Exchanges unconditionally after the backend rejected the current token.
    /// `None` when there is no refresh token to exchange.
    async fn force_refresh(&self, identity: &Identity) -> PortResult<Option<String>> {
        let mut tokens = self.tokens.lock().await;
        let Some(grant) = tokens.get(&identity.user_id) else {
            return Ok(None);
        };
        let fresh = self.exchange(&grant.refresh_token).await?;
        let token = fresh.id_token.clone();
        tokens.insert(identity.user_id.clone(), fresh);
        Ok(Some(token))
    }

    async fn exchange(&self, refresh_token: &str) -> PortResult<TokenGrant> {
        let url = format!("{}/token", self.secure_token_base_url);
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.settings.api_key.as_str())])
            .form(&params)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Token refresh failed with status {}: {}", status.as_u16(), body);
            return Err(PortError::NotAuthenticated);
        }

        let record: RefreshRecord = response
            .json()
            .await
            .map_err(|e| PortError::MalformedResponse(format!("token response: {}", e)))?;
        info!("Refreshed ID token");
        Ok(record.to_grant(Utc::now()))
    }

    /// Sends the request `build` makes for the current token. A 401 triggers one
    /// token exchange and one resend.
    async fn send_authorized<F>(&self, identity: &Identity, build: F) -> PortResult<Response>
    where
        F: Fn(&str) -> RequestBuilder + Send + Sync,
    {
        let token = self.bearer(identity).await?;
        let response = build(&token).send().await.map_err(network_error)?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        match self.force_refresh(identity).await? {
            Some(token) => {
                info!("ID token rejected; retrying with a refreshed one");
                build(&token).send().await.map_err(network_error)
            }
            None => Ok(response),
        }
    }
}

/// An ID token with what is needed to renew it.
#[derive(Debug, Clone, PartialEq)]
struct TokenGrant {
    id_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}
impl TokenGrant {
    fn expires_soon(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) >= self.expires_at
    }
}

/// `expiresIn` arrives as a string of seconds.
fn expiry(now: DateTime<Utc>, expires_in: Option<&str>) -> DateTime<Utc> {
    let secs = expires_in
        .and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    now + Duration::seconds(secs)
}

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecord {
    local_id: String,
    #[serde(default)]
    email: String,
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<String>,
}
impl AccountRecord {
    fn to_domain(self, now: DateTime<Utc>) -> (Identity, Option<TokenGrant>) {
        let grant = self.refresh_token.map(|refresh_token| TokenGrant {
            id_token: self.id_token.clone(),
            refresh_token,
            expires_at: expiry(now, self.expires_in.as_deref()),
        });
        let identity = Identity {
            user_id: self.local_id,
            email: self.email,
            id_token: self.id_token,
        };
        (identity, grant)
    }
}

/// The Secure Token exchange response. Unlike the account calls it is snake_case.
#[derive(Deserialize)]
struct RefreshRecord {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}
impl RefreshRecord {
    fn to_grant(self, now: DateTime<Utc>) -> TokenGrant {
        TokenGrant {
            expires_at: expiry(now, self.expires_in.as_deref()),
            id_token: self.id_token,
            refresh_token: self.refresh_token,
        }
    }
}

#[derive(Deserialize)]
struct AuthErrorBody {
    error: AuthErrorDetail,
}

#[derive(Deserialize)]
struct AuthErrorDetail {
    message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct LocationRecord {
    lat: f64,
    lon: f64,
}

/// The `users/<uid>` node. Unset text fields are stored as empty strings.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uid: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(default)]
    farm_size: Option<String>,
    #[serde(default)]
    script_url: Option<String>,
    #[serde(default)]
    farm_location: Option<LocationRecord>,
    #[serde(default)]
    profile_image: Option<String>,
    #[serde(default)]
    language: Option<String>,
}
impl ProfileRecord {
    /// The record written at registration.
    fn initial(identity: &Identity, name: &str) -> Self {
        Self {
            uid: Some(identity.user_id.clone()),
            name: name.to_string(),
            email: identity.email.clone(),
            created_at: Some(Utc::now().to_rfc3339()),
            farm_size: Some(String::new()),
            script_url: Some(String::new()),
            farm_location: None,
            profile_image: Some(String::new()),
            language: Some(LanguageCode::En.code().to_string()),
        }
    }

    fn to_domain(self) -> UserProfile {
        let farm_location = self.farm_location.and_then(|loc| {
            FarmLocation::new(loc.lat, loc.lon)
                .map_err(|_| warn!("Ignoring stored farm location {:?}", loc))
                .ok()
        });
        let preferred_language = self
            .language
            .as_deref()
            .and_then(|code| code.parse().ok());

        UserProfile {
            name: self.name,
            email: self.email,
            farm_size: self.farm_size.as_deref().and_then(non_empty),
            script_url: self.script_url.as_deref().and_then(non_empty),
            farm_location,
            profile_image: self.profile_image.as_deref().and_then(non_empty),
            preferred_language,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadRecord {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

//=========================================================================================
// Request Helpers
//=========================================================================================

/// Maps an Identity Toolkit error body onto a port error.
fn auth_error(body: &str) -> PortError {
    let message = match serde_json::from_str::<AuthErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => return PortError::Unexpected(format!("auth request failed: {}", body)),
    };
    // Messages look like "WEAK_PASSWORD : Password should be at least 6 characters".
    let code = message.split(" : ").next().unwrap_or(&message).trim();
    if CREDENTIAL_ERRORS.contains(&code) {
        PortError::InvalidCredentials
    } else {
        PortError::Unexpected(message)
    }
}

/// Builds the merge body for a PATCH. Unset text fields become `""` and an
/// unset location becomes an explicit `null`, matching the stored defaults.
fn patch_body(patch: &ProfilePatch) -> Value {
    let mut body = Map::new();
    if let Some(name) = &patch.name {
        body.insert("name".into(), json!(name));
    }
    if let Some(size) = &patch.farm_size {
        body.insert("farmSize".into(), json!(size.trim()));
    }
    if let Some(url) = &patch.script_url {
        body.insert("scriptUrl".into(), json!(url.trim()));
    }
    if let Some(location) = patch.farm_location {
        let value = match location {
            Some(loc) => json!({ "lat": loc.lat(), "lon": loc.lon() }),
            None => Value::Null,
        };
        body.insert("farmLocation".into(), value);
    }
    if let Some(image) = &patch.profile_image {
        body.insert("profileImage".into(), json!(image));
    }
    if let Some(language) = patch.preferred_language {
        body.insert("language".into(), json!(language.code()));
    }
    Value::Object(body)
}

/// Turns a database response status into a port error.
async fn database_status(response: Response) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PortError::PermissionDenied(body)),
        _ => Err(PortError::Network {
            message: format!("database request failed with status {}: {}", status.as_u16(), body),
            likely_cors: false,
        }),
    }
}

fn download_url(base: &str, bucket: &str, object_name: &str, token: Option<&str>) -> PortResult<String> {
    let mut url = Url::parse(&format!("{}/b/{}/o", base, bucket))
        .map_err(|e| PortError::Unexpected(format!("invalid storage url: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| PortError::Unexpected("storage url cannot take a path".to_string()))?
        .push(object_name);
    url.query_pairs_mut().append_pair("alt", "media");
    if let Some(token) = token {
        url.query_pairs_mut().append_pair("token", token);
    }
    Ok(url.to_string())
}

//=========================================================================================
// `AuthService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthService for FirebaseAdapter {
    async fn sign_in(&self, credentials: &Credentials) -> PortResult<Identity> {
        let body = json!({
            "email": credentials.email,
            "password": credentials.password,
            "returnSecureToken": true,
        });
        let identity = self.account_request("signInWithPassword", body).await?;
        info!("Signed in user {}", identity.user_id);
        Ok(identity)
    }

    async fn sign_up(&self, registration: &Registration) -> PortResult<Identity> {
        let body = json!({
            "email": registration.email,
            "password": registration.password,
            "returnSecureToken": true,
        });
        let identity = self.account_request("signUp", body).await?;

        let record = ProfileRecord::initial(&identity, &registration.name);
        let response = self
            .client
            .put(self.user_url(&identity))
            .query(&[("auth", identity.id_token.as_str())])
            .json(&record)
            .send()
            .await
            .map_err(network_error)?;
        database_status(response).await?;

        info!("Registered user {} with a default profile", identity.user_id);
        Ok(identity)
    }
}

//=========================================================================================
// `ProfileGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileGateway for FirebaseAdapter {
    async fn get_profile(&self, identity: &Identity) -> PortResult<UserProfile> {
        let url = self.user_url(identity);
        let response = self
            .send_authorized(identity, |token| self.client.get(&url).query(&[("auth", token)]))
            .await?;
        let response = database_status(response).await?;

        // A missing node comes back as a literal `null`.
        let record: Option<ProfileRecord> = response
            .json()
            .await
            .map_err(|e| PortError::MalformedResponse(format!("profile record: {}", e)))?;
        match record {
            Some(record) => Ok(record.to_domain()),
            None => {
                warn!("No user data found for UID: {}", identity.user_id);
                Err(PortError::NotFound(format!("profile for {}", identity.user_id)))
            }
        }
    }

    async fn save_profile(&self, identity: &Identity, patch: &ProfilePatch) -> PortResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let url = self.user_url(identity);
        let body = patch_body(patch);
        let response = self
            .send_authorized(identity, |token| {
                self.client.patch(&url).query(&[("auth", token)]).json(&body)
            })
            .await?;
        database_status(response).await?;
        Ok(())
    }

    async fn upload_image(
        &self,
        identity: &Identity,
        file_name: &str,
        mime_type: &str,
        bytes: Bytes,
    ) -> PortResult<String> {
        let object_name = format!(
            "profile_images/{}/{}_{}",
            identity.user_id,
            Utc::now().timestamp_millis(),
            file_name
        );
        let url = format!("{}/b/{}/o", self.storage_base_url, self.settings.storage_bucket);

        let response = self
            .send_authorized(identity, |token| {
                self.client
                    .post(&url)
                    .query(&[("uploadType", "media"), ("name", object_name.as_str())])
                    .header(header::AUTHORIZATION, format!("Firebase {}", token))
                    .header(header::CONTENT_TYPE, mime_type)
                    .body(bytes.clone())
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::PermissionDenied(body),
                _ => PortError::Unexpected(format!("image upload failed with status {}", status.as_u16())),
            });
        }

        let record: UploadRecord = response
            .json()
            .await
            .map_err(|e| PortError::MalformedResponse(format!("upload response: {}", e)))?;
        download_url(
            &self.storage_base_url,
            &self.settings.storage_bucket,
            &record.name,
            record.download_tokens.as_deref(),
        )
    }
}
