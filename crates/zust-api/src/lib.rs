//! # Zust API
//!
//! Framework-agnostic route handlers for authentication and account status
//! on the Zust backend.
//!
//! ## Overview
//!
//! The zust-api crate handles:
//! - **Auth routes**: Password login and registration, email verification,
//!   OAuth2 authorize/callback, token refresh and logout
//! - **Account routes**: Profile lookup and edits, lock, unlock and ban
//! - **Media route**: Profile images behind opaque link IDs
//! - **Bearer extraction**: Path-aware token verification for protected routes
//! - **Collaborators**: Mail delivery and profile media behind traits, with
//!   in-memory implementations
//!
//! Routing, body decoding and the HTTP server itself belong to the
//! embedding application. Handlers take decoded inputs and return
//! [`ApiResult`]; [`ApiResponse`] renders it as `{"data": ...}` or
//! `{"message": ...}` with the matching status code.
//!
//! ## Routes
//!
//! | Route | Handler | Auth |
//! |---|---|---|
//! | `POST /auth/login` | [`AuthHandlers::login`] | none |
//! | `POST /auth/register` | [`AuthHandlers::register`] | none |
//! | `GET /auth/verification?token=` | [`AuthHandlers::verify_email`] | none |
//! | `POST /auth/verification/resend?email=` | [`AuthHandlers::resend_verification`] | none |
//! | `GET /oauth2/authorize?provider=` | [`AuthHandlers::oauth_authorize`] | none |
//! | `GET /oauth2/callback?code=&state=` | [`AuthHandlers::oauth_callback`] | none |
//! | `POST /auth/token/refresh` | [`AuthHandlers::refresh`] | refresh token |
//! | `POST /auth/logout` | [`AuthHandlers::logout`] | access token |
//! | `GET /accounts/{id}` | [`AccountHandlers::get_profile`] | none |
//! | `PUT /accounts/{id}` | [`AccountHandlers::edit_profile`] | access token (owner) |
//! | `GET /media/{id}` | [`MediaHandlers::get_media`] | none |
//! | `POST /accounts/{id}/lock` | [`AccountHandlers::lock`] | access token |
//! | `POST /accounts/{id}/unlock` | [`AccountHandlers::unlock`] | admin |
//! | `POST /accounts/{id}/ban` | [`AccountHandlers::ban`] | admin |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zust_accounts::MemoryAccountStore;
//! use zust_api::{ApiResponse, ApiState, AuthHandlers, LoginRequest, MemoryMailer};
//! use zust_auth::AuthConfig;
//!
//! # async fn example() -> zust_auth::AuthResult<()> {
//! let config = AuthConfig::new("your-secret-key");
//! let state = Arc::new(ApiState::new(
//!     config,
//!     Arc::new(MemoryAccountStore::new()),
//!     Arc::new(MemoryMailer::new()),
//! )?);
//! let auth = AuthHandlers::new(state.clone());
//!
//! // Public route
//! let body: LoginRequest = serde_json::from_str(r#"{"username":"a","password":"pw"}"#)
//!     .map_err(|e| zust_auth::AuthError::Internal(e.to_string()))?;
//! let response = ApiResponse::from_result(auth.login(body).await);
//! println!("{} {}", response.status, response.body);
//!
//! // Protected route
//! let header = Some("Bearer eyJ...");
//! match state.authenticate((), "/auth/logout", header).await {
//!     Ok(request) => {
//!         let response = ApiResponse::from_result(auth.logout(request).await);
//!         println!("{}", response.status);
//!     }
//!     Err(err) => println!("{}", ApiResponse::from(err).status),
//! }
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod state;
pub mod types;
pub mod verification;

// Re-export main types
pub use assets::{
    AccountAssets, MediaError, MediaFile, MediaKind, MediaLinks, MediaStore, MemoryMediaStore,
    MAX_IMAGE_BYTES,
};
pub use error::{ApiError, ApiResult};
pub use handlers::{AccountHandlers, AuthHandlers, MediaHandlers, REGISTERED_WITHOUT_EMAIL};
pub use mailer::{EmailMessage, MailError, Mailer, MemoryMailer};
pub use state::ApiState;
pub use types::{
    ApiResponse, AuthorizeResponse, CallbackQuery, EditProfileRequest, LoginRequest, LoginResponse,
    RegisterRequest, MAX_EMAIL_LEN, MAX_USERNAME_LEN,
};
pub use verification::{EmailVerifier, VERIFICATION_PATH, VERIFICATION_SUBJECT};
