//! Authentication configuration.
//!
//! Built once at startup (usually from environment variables) and shared by
//! reference with every component that needs the signing key, token
//! lifetimes or provider credentials.

use chrono::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Bearer token settings.
#[derive(Clone)]
pub struct TokenConfig {
    /// Symmetric HMAC signing key
    pub secret: String,

    /// Issuer tag written to and required in every token
    pub issuer: String,

    /// Access token lifetime
    pub access_token_duration: Duration,

    /// Refresh token lifetime
    pub refresh_token_duration: Duration,

    /// Clock-skew tolerance applied to expiry checks, in seconds
    pub leeway_secs: u64,

    /// Email verification link lifetime
    pub verification_token_duration: Duration,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("access_token_duration", &self.access_token_duration)
            .field("refresh_token_duration", &self.refresh_token_duration)
            .field("leeway_secs", &self.leeway_secs)
            .field("verification_token_duration", &self.verification_token_duration)
            .finish()
    }
}

impl TokenConfig {
    /// Default issuer tag.
    pub const DEFAULT_ISSUER: &'static str = "Zust";

    /// Create token settings with default lifetimes.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: Self::DEFAULT_ISSUER.to_string(),
            access_token_duration: Duration::minutes(15),
            refresh_token_duration: Duration::days(7),
            leeway_secs: 30,
            verification_token_duration: Duration::hours(24),
        }
    }
}

/// OAuth client credentials for one provider.
#[derive(Clone)]
pub struct ProviderCredentials {
    /// Client ID
    pub client_id: String,

    /// Client secret
    pub client_secret: String,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Top-level authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Token settings
    pub token: TokenConfig,

    /// Public base URL of the API (e.g. "http://localhost:8080")
    pub public_url: String,

    /// GitHub OAuth credentials, provider disabled when absent
    pub github: Option<ProviderCredentials>,

    /// Google OAuth credentials, provider disabled when absent
    pub google: Option<ProviderCredentials>,

    /// Attempts made to download a federated avatar
    pub avatar_download_attempts: u32,
}

impl AuthConfig {
    /// Create a configuration with a signing secret and defaults elsewhere.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            token: TokenConfig::with_secret(secret),
            public_url: "http://localhost:8080".to_string(),
            github: None,
            google: None,
            avatar_download_attempts: 3,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SECRET_KEY`: HMAC signing key (required)
    /// - `TOKEN_EXPIRATION`: Access token lifetime in minutes (default: 15)
    /// - `REFRESH_TOKEN_EXPIRATION`: Refresh token lifetime in minutes (default: 10080)
    /// - `TOKEN_ISSUER`: Issuer tag (default: Zust)
    /// - `DOMAIN`: Public host name (default: localhost)
    /// - `PORT`: Public port (default: 8080)
    /// - `GITHUB_CLIENT_ID` / `GITHUB_CLIENT_SECRET`: GitHub OAuth app
    /// - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`: Google OAuth app
    /// - `AVATAR_DOWNLOAD_ATTEMPTS`: Avatar download attempts (default: 3)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("SECRET_KEY")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("SECRET_KEY".to_string()))?;

        let mut config = Self::new(secret);

        if let Some(minutes) = parse_var::<i64, _>(&lookup, "TOKEN_EXPIRATION")? {
            config.token.access_token_duration = positive_minutes("TOKEN_EXPIRATION", minutes)?;
        }
        if let Some(minutes) = parse_var::<i64, _>(&lookup, "REFRESH_TOKEN_EXPIRATION")? {
            config.token.refresh_token_duration =
                positive_minutes("REFRESH_TOKEN_EXPIRATION", minutes)?;
        }
        if let Some(issuer) = lookup("TOKEN_ISSUER") {
            config.token.issuer = issuer;
        }
        if let Some(attempts) = parse_var::<u32, _>(&lookup, "AVATAR_DOWNLOAD_ATTEMPTS")? {
            config.avatar_download_attempts = attempts.max(1);
        }

        let domain = lookup("DOMAIN").unwrap_or_else(|| "localhost".to_string());
        let port = lookup("PORT").unwrap_or_else(|| "8080".to_string());
        config.public_url = format!("http://{}:{}", domain, port);

        config.github = credentials(&lookup, "GITHUB");
        config.google = credentials(&lookup, "GOOGLE");

        Ok(config)
    }

    /// Build a full URL by appending a path to the public base URL.
    pub fn url(&self, path: &str) -> String {
        let base = self.public_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Redirect URL registered with OAuth providers.
    pub fn oauth_redirect_url(&self) -> String {
        self.url("/oauth2/callback")
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
    }
}

/// Longest accepted token lifetime: ten years.
const MAX_TOKEN_MINUTES: i64 = 10 * 366 * 24 * 60;

fn positive_minutes(key: &str, minutes: i64) -> Result<Duration, ConfigError> {
    if !(1..=MAX_TOKEN_MINUTES).contains(&minutes) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be between 1 and {} minutes", MAX_TOKEN_MINUTES),
        });
    }
    Duration::try_minutes(minutes).ok_or_else(|| ConfigError::InvalidValue {
        key: key.to_string(),
        message: "duration out of range".to_string(),
    })
}

fn credentials<F>(lookup: &F, prefix: &str) -> Option<ProviderCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    let client_id = lookup(&format!("{}_CLIENT_ID", prefix)).filter(|s| !s.is_empty())?;
    let client_secret = lookup(&format!("{}_CLIENT_SECRET", prefix)).filter(|s| !s.is_empty())?;
    Some(ProviderCredentials {
        client_id,
        client_secret,
    })
}
