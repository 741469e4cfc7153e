//! Error types for authentication operations
//!
//! This module defines all error types that can occur during authentication,
//! token validation, session handling, and identity provider interactions.

use thiserror::Error;
use zust_accounts::StoreError;

/// Message returned for any credential mismatch, whichever field was wrong.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid username or password";

/// Account field that collided with an existing account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    /// Email already registered
    Email,
    /// Username already registered
    Username,
}

impl ConflictField {
    /// Classify a store error by the constraint it names.
    pub fn from_store_error(err: &StoreError) -> Option<Self> {
        if err.violates(zust_accounts::EMAIL_CONSTRAINT) {
            Some(ConflictField::Email)
        } else if err.violates(zust_accounts::USERNAME_CONSTRAINT) {
            Some(ConflictField::Username)
        } else {
            None
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ConflictField::Email => "Email is already taken",
            ConflictField::Username => "Username is already taken",
        }
    }
}

/// Authentication error types.
///
/// These errors cover credential checks, token validation, session
/// invalidation, provider errors and persistence failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Username or password did not match
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Federated account tried to log in with a password
    #[error("Account does not have a password")]
    PasswordNotSet,

    /// Account exists but is not active
    #[error("Account is not active")]
    AccountNotActive,

    /// Account referenced by the request does not exist
    #[error("Account does not exist")]
    AccountNotFound,

    /// Caller is authenticated but not allowed to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Authorization header missing or not a bearer token
    #[error("Missing bearer token")]
    MissingCredentials,

    /// JWT token has expired
    #[error("Token has expired")]
    TokenExpired,

    /// Token is not a well-formed JWT
    #[error("Token is malformed")]
    MalformedToken,

    /// Signature mismatch or unexpected signing algorithm
    #[error("Invalid token signature")]
    BadSignature,

    /// Token decoded but its claims are unacceptable
    #[error("Invalid token claims: {0}")]
    InvalidClaims(String),

    /// Token kind is neither access nor refresh
    #[error("Invalid token kind: {0}")]
    InvalidKind(String),

    /// Token version no longer matches the account's version
    #[error("Token version is no longer valid")]
    StaleVersion,

    /// Token kind not accepted on this endpoint
    #[error("Unsuitable token type for this request")]
    WrongTokenKind,

    /// OAuth state names a provider that is not configured
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// OAuth callback without an authorization code
    #[error("Missing authorization code")]
    MissingAuthorizationCode,

    /// Authorization code exchange failed upstream
    #[error("Token exchange failed: {0}")]
    ExternalExchangeFailed(String),

    /// Profile fetch failed upstream
    #[error("User fetch failed: {0}")]
    ExternalFetchFailed(String),

    /// Email or username already registered
    #[error("Conflict: {0:?}")]
    Conflict(ConflictField),

    /// Password hashing failed
    #[error("Hashing error: {0}")]
    Hashing(String),

    /// Persistence failure other than "not found"
    #[error("Storage error: {0}")]
    Store(#[source] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Check if this error should be logged at error level.
    ///
    /// Some errors (like invalid credentials) are expected and
    /// should not be logged as errors.
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Check if the client may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Store(_))
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::TokenExpired
            | AuthError::StaleVersion
            | AuthError::MissingCredentials => 401,

            AuthError::InvalidCredentials
            | AuthError::PasswordNotSet
            | AuthError::AccountNotFound
            | AuthError::MalformedToken
            | AuthError::BadSignature
            | AuthError::InvalidClaims(_)
            | AuthError::InvalidKind(_)
            | AuthError::WrongTokenKind
            | AuthError::UnknownProvider(_)
            | AuthError::MissingAuthorizationCode
            | AuthError::Conflict(_) => 400,

            AuthError::AccountNotActive | AuthError::Forbidden(_) => 403,

            AuthError::ExternalExchangeFailed(_)
            | AuthError::ExternalFetchFailed(_)
            | AuthError::Hashing(_)
            | AuthError::Store(_)
            | AuthError::ConfigError(_)
            | AuthError::Internal(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::PasswordNotSet => "PASSWORD_NOT_SET",
            AuthError::AccountNotActive => "ACCOUNT_NOT_ACTIVE",
            AuthError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            AuthError::Forbidden(_) => "FORBIDDEN",
            AuthError::MissingCredentials => "MISSING_CREDENTIALS",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::MalformedToken => "MALFORMED_TOKEN",
            AuthError::BadSignature => "BAD_SIGNATURE",
            AuthError::InvalidClaims(_) => "INVALID_CLAIMS",
            AuthError::InvalidKind(_) => "INVALID_KIND",
            AuthError::StaleVersion => "STALE_VERSION",
            AuthError::WrongTokenKind => "WRONG_TOKEN_KIND",
            AuthError::UnknownProvider(_) => "UNKNOWN_PROVIDER",
            AuthError::MissingAuthorizationCode => "MISSING_AUTHORIZATION_CODE",
            AuthError::ExternalExchangeFailed(_) => "EXTERNAL_EXCHANGE_FAILED",
            AuthError::ExternalFetchFailed(_) => "EXTERNAL_FETCH_FAILED",
            AuthError::Conflict(_) => "CONFLICT",
            AuthError::Hashing(_) => "HASHING_ERROR",
            AuthError::Store(_) => "STORAGE_ERROR",
            AuthError::ConfigError(_) => "CONFIG_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to return to clients.
    ///
    /// Server-side details (store messages, upstream bodies) stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => INVALID_CREDENTIALS_MESSAGE.to_string(),
            AuthError::PasswordNotSet => {
                "Account does not have a password, please login with OAuth provider".to_string()
            }
            AuthError::AccountNotActive => "Account is not active".to_string(),
            AuthError::AccountNotFound => "Account does not exist".to_string(),
            AuthError::Forbidden(reason) => reason.clone(),
            AuthError::MissingCredentials => "Missing request header".to_string(),
            AuthError::TokenExpired => "Access token expired".to_string(),
            AuthError::MalformedToken => "Invalid access token: token is malformed".to_string(),
            AuthError::BadSignature => "Invalid access token: signature is invalid".to_string(),
            AuthError::InvalidClaims(reason) => format!("Invalid access token: {}", reason),
            AuthError::InvalidKind(kind) => format!("Invalid token type: {}", kind),
            AuthError::StaleVersion => "Invalid access token: token version is not valid".to_string(),
            AuthError::WrongTokenKind => {
                "Invalid access token: unsuitable token type for this request".to_string()
            }
            AuthError::UnknownProvider(_) => "Unknown provider".to_string(),
            AuthError::MissingAuthorizationCode => "Missing authorization code".to_string(),
            AuthError::ExternalExchangeFailed(_) => "Failed to exchange token".to_string(),
            AuthError::ExternalFetchFailed(_) => "Failed to fetch user data".to_string(),
            AuthError::Conflict(field) => field.message().to_string(),
            AuthError::Hashing(_)
            | AuthError::Store(_)
            | AuthError::ConfigError(_)
            | AuthError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// Map a store error where "not found" means the account is gone.
    pub fn from_account_lookup(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AuthError::AccountNotFound,
            other => AuthError::Store(other),
        }
    }
}
