//! Request and response types
//!
//! Successful responses are wrapped as `{"data": ...}` and errors as
//! `{"message": ...}`; [`ApiResponse`] carries the status code alongside.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use zust_accounts::{Account, ProfileUpdate};
use zust_auth::TokenPair;

use crate::assets::MAX_IMAGE_BYTES;
use crate::error::{ApiError, ApiResult};

/// Maximum email length accepted at registration.
pub const MAX_EMAIL_LEN: usize = 40;

/// Maximum username length accepted at registration.
pub const MAX_USERNAME_LEN: usize = 20;

/// Status code and JSON body of a handler response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// JSON body
    pub body: Value,
}

impl ApiResponse {
    /// 200 with `{"data": data}`.
    pub fn ok<T: Serialize>(data: T) -> Self {
        Self::with_status(200, data)
    }

    /// Any status with `{"data": data}`.
    pub fn with_status<T: Serialize>(status: u16, data: T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                status,
                body: json!({ "data": value }),
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response body");
                Self::error(&ApiError::internal())
            }
        }
    }

    /// Error status with `{"message": message}`.
    pub fn error(err: &ApiError) -> Self {
        Self {
            status: err.status,
            body: json!({ "message": err.message }),
        }
    }

    /// Render a handler result.
    pub fn from_result<T: Serialize>(result: ApiResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::error(&err),
        }
    }

    /// The `data` member, for successful responses.
    pub fn data(&self) -> Option<&Value> {
        self.body.get("data")
    }

    /// The `message` member, for error responses.
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }
}

impl From<ApiError> for ApiResponse {
    fn from(err: ApiError) -> Self {
        Self::error(&err)
    }
}

/// Body of `POST /auth/login`.
#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    /// Username, or email address when it contains `@`
    pub username: String,
    /// Plaintext password
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl LoginRequest {
    /// Check required fields.
    pub fn validate(&self) -> ApiResult<()> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(ApiError::invalid_body());
        }
        Ok(())
    }
}

/// Body of `POST /auth/register`.
#[derive(Clone, Deserialize)]
pub struct RegisterRequest {
    /// Email address
    pub email: String,
    /// Username
    pub username: String,
    /// Plaintext password
    pub password: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl RegisterRequest {
    /// Check required fields, lengths and email shape.
    ///
    /// Usernames may not contain `@`; login reads such identifiers as emails.
    pub fn validate(&self) -> ApiResult<()> {
        let email = self.email.trim();
        let username = self.username.trim();

        let email_ok = !email.is_empty()
            && email.chars().count() <= MAX_EMAIL_LEN
            && is_plausible_email(email);
        let username_ok = !username.is_empty()
            && username.chars().count() <= MAX_USERNAME_LEN
            && !username.contains('@');

        if !email_ok || !username_ok || self.password.is_empty() {
            return Err(ApiError::invalid_body());
        }
        Ok(())
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Body of `PUT /accounts/{id}`, decoded from the multipart form.
///
/// Empty or missing fields keep the stored values.
#[derive(Clone, Default, Deserialize)]
pub struct EditProfileRequest {
    /// New username
    #[serde(default)]
    pub username: Option<String>,
    /// New description
    #[serde(default)]
    pub description: Option<String>,
    /// New avatar image
    #[serde(default)]
    pub avatar: Option<Vec<u8>>,
    /// New cover image
    #[serde(default)]
    pub cover: Option<Vec<u8>>,
}

impl std::fmt::Debug for EditProfileRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditProfileRequest")
            .field("username", &self.username)
            .field("description", &self.description)
            .field("avatar_bytes", &self.avatar.as_ref().map(Vec::len))
            .field("cover_bytes", &self.cover.as_ref().map(Vec::len))
            .finish()
    }
}

impl EditProfileRequest {
    /// Check the new username and image sizes.
    pub fn validate(&self) -> ApiResult<()> {
        if let Some(username) = non_empty(&self.username) {
            if username.chars().count() > MAX_USERNAME_LEN || username.contains('@') {
                return Err(ApiError::invalid_body());
            }
        }
        if !image_ok(&self.avatar) {
            return Err(ApiError::bad_request("Invalid avatar file"));
        }
        if !image_ok(&self.cover) {
            return Err(ApiError::bad_request("Invalid cover file"));
        }
        Ok(())
    }

    /// The store update for the text fields.
    pub fn profile_update(&self) -> ProfileUpdate {
        ProfileUpdate {
            username: non_empty(&self.username).map(str::to_string),
            description: non_empty(&self.description).map(str::to_string),
        }
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn image_ok(image: &Option<Vec<u8>>) -> bool {
    image
        .as_ref()
        .map_or(true, |bytes| !bytes.is_empty() && bytes.len() <= MAX_IMAGE_BYTES)
}

/// Query of `GET /oauth2/callback`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code
    pub code: Option<String>,
    /// Provider tag
    pub state: Option<String>,
}

/// Tokens and account summary returned by password and OAuth login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Account ID
    pub id: Uuid,
    /// Username
    pub username: String,
    /// Email address
    pub email: String,
    /// Avatar media link
    pub avatar: String,
    /// Access token
    pub access_token: String,
    /// Refresh token
    pub refresh_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

impl LoginResponse {
    /// Combine an account, its avatar link and a token pair.
    pub fn new(account: &Account, avatar: String, tokens: TokenPair) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            avatar,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
        }
    }
}

/// Result of `GET /oauth2/authorize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    /// Provider tag
    pub provider: String,
    /// URL to redirect the user to
    pub url: String,
}
