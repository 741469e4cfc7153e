//! OAuth 2.0 identity federation
//!
//! This module drives the authorization-code flow against external identity
//! providers and reconciles the identities they report with local accounts.
//!
//! - [`IdentityProvider`]: the capability set of one provider
//! - [`GitHubProvider`] / [`GoogleProvider`]: built-in implementations
//! - [`ProviderRegistry`]: provider tag to provider instance
//! - [`FederationBroker`]: callback handling, login-or-register

mod broker;
mod github;
mod google;
mod registry;

pub use broker::{FederatedLogin, FederationBroker, ProfileAssets};
pub use github::GitHubProvider;
pub use google::GoogleProvider;
pub use registry::ProviderRegistry;

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl,
    RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ProviderCredentials;
use crate::error::{AuthError, AuthResult};

/// Supported OAuth providers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OAuthProvider {
    /// GitHub OAuth
    GitHub,
    /// Google OAuth
    Google,
}

impl OAuthProvider {
    /// Provider tag, also used as the OAuth `state` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::GitHub => "github",
            OAuthProvider::Google => "google",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "github" => Some(OAuthProvider::GitHub),
            "google" => Some(OAuthProvider::Google),
            _ => None,
        }
    }

    /// Default authorization URL.
    pub fn auth_url(&self) -> &'static str {
        match self {
            OAuthProvider::GitHub => "https://github.com/login/oauth/authorize",
            OAuthProvider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
        }
    }

    /// Default token URL.
    pub fn token_url(&self) -> &'static str {
        match self {
            OAuthProvider::GitHub => "https://github.com/login/oauth/access_token",
            OAuthProvider::Google => "https://oauth2.googleapis.com/token",
        }
    }

    /// Default base URL of the provider's user API.
    pub fn api_url(&self) -> &'static str {
        match self {
            OAuthProvider::GitHub => "https://api.github.com",
            OAuthProvider::Google => "https://www.googleapis.com",
        }
    }

    /// Default scopes.
    pub fn default_scopes(&self) -> Vec<&'static str> {
        match self {
            OAuthProvider::GitHub => vec!["read:user", "user:email"],
            OAuthProvider::Google => vec!["openid", "email", "profile"],
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// OAuth provider configuration.
#[derive(Clone)]
pub struct OAuthConfig {
    /// Provider type
    pub provider: OAuthProvider,

    /// Client ID
    pub client_id: String,

    /// Client secret
    pub client_secret: String,

    /// Authorization URL override
    pub auth_url: Option<String>,

    /// Token URL override
    pub token_url: Option<String>,

    /// User API base URL override
    pub api_url: Option<String>,

    /// Redirect URL
    pub redirect_url: String,

    /// Scopes to request
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("api_url", &self.api_url)
            .field("redirect_url", &self.redirect_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl OAuthConfig {
    /// Create a new OAuth configuration with the provider's default endpoints.
    pub fn new(
        provider: OAuthProvider,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: None,
            token_url: None,
            api_url: None,
            redirect_url: redirect_url.into(),
            scopes: provider
                .default_scopes()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Create from configured client credentials.
    pub fn from_credentials(
        provider: OAuthProvider,
        credentials: &ProviderCredentials,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self::new(
            provider,
            credentials.client_id.clone(),
            credentials.client_secret.clone(),
            redirect_url,
        )
    }

    /// Point every provider endpoint at one base URL (used against mock servers).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.auth_url = Some(format!("{}/login/oauth/authorize", base));
        self.token_url = Some(format!("{}/login/oauth/access_token", base));
        self.api_url = Some(base.to_string());
        self
    }

    /// Get the authorization URL.
    pub fn get_auth_url(&self) -> &str {
        self.auth_url
            .as_deref()
            .unwrap_or_else(|| self.provider.auth_url())
    }

    /// Get the token URL.
    pub fn get_token_url(&self) -> &str {
        self.token_url
            .as_deref()
            .unwrap_or_else(|| self.provider.token_url())
    }

    /// Build a URL on the provider's user API.
    pub fn api_endpoint(&self, path: &str) -> String {
        let base = self
            .api_url
            .as_deref()
            .unwrap_or_else(|| self.provider.api_url())
            .trim_end_matches('/');
        format!("{}/{}", base, path.trim_start_matches('/'))
    }

    /// Build the `oauth2` client for this provider.
    ///
    /// Client credentials are sent in the form body of the token request.
    pub fn client(&self) -> AuthResult<BasicClient> {
        let auth_url = AuthUrl::new(self.get_auth_url().to_string())
            .map_err(|e| AuthError::ConfigError(format!("Invalid authorization URL: {}", e)))?;
        let token_url = TokenUrl::new(self.get_token_url().to_string())
            .map_err(|e| AuthError::ConfigError(format!("Invalid token URL: {}", e)))?;
        let redirect_url = RedirectUrl::new(self.redirect_url.clone())
            .map_err(|e| AuthError::ConfigError(format!("Invalid redirect URL: {}", e)))?;

        Ok(BasicClient::new(
            ClientId::new(self.client_id.clone()),
            Some(ClientSecret::new(self.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody)
        .set_redirect_uri(redirect_url))
    }

    /// Build the URL the user is sent to, with `state` set to the provider tag.
    pub fn authorization_url(&self) -> AuthResult<String> {
        let state = self.provider.as_str().to_string();
        let (url, _) = self
            .client()?
            .authorize_url(|| CsrfToken::new(state))
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .url();
        Ok(url.to_string())
    }
}

/// Access token returned by a provider's token endpoint.
#[derive(Clone)]
pub struct ProviderToken {
    /// Access token for the provider's user API
    pub access_token: String,

    /// Lifetime in seconds, when reported
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for ProviderToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Identity reported by a provider for the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    /// Provider-assigned user ID
    pub provider_id: String,

    /// Display name, used as the username on registration
    pub display_name: String,

    /// Avatar image URL
    pub avatar_url: Option<String>,

    /// Email address
    pub email: String,
}

/// Trait for identity provider implementations.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider tag, e.g. "github".
    fn name(&self) -> &str;

    /// Exchange an authorization code for a provider access token.
    async fn exchange_code(&self, code: &str) -> AuthResult<ProviderToken>;

    /// Fetch the identity of the user the access token belongs to.
    async fn fetch_user(&self, access_token: &str) -> AuthResult<ExternalIdentity>;
}

/// Run the authorization-code exchange through `oauth2`.
pub(crate) async fn exchange_with(
    client: &BasicClient,
    provider: &str,
    code: &str,
) -> AuthResult<ProviderToken> {
    let token = client
        .exchange_code(AuthorizationCode::new(code.to_string()))
        .request_async(async_http_client)
        .await
        .map_err(|e| {
            let detail = match &e {
                RequestTokenError::ServerResponse(response) => {
                    serde_json::to_string(response).unwrap_or_else(|_| response.to_string())
                }
                RequestTokenError::Parse(err, body) => {
                    format!("{}: {}", err, String::from_utf8_lossy(body))
                }
                RequestTokenError::Request(err) => err.to_string(),
                RequestTokenError::Other(message) => message.clone(),
            };
            warn!(provider, upstream = %detail, "Token exchange failed");
            AuthError::ExternalExchangeFailed(detail)
        })?;

    Ok(ProviderToken {
        access_token: token.access_token().secret().clone(),
        expires_in: token.expires_in().map(|d| d.as_secs()),
    })
}

/// GET a JSON document from a provider's user API.
pub(crate) async fn fetch_json<T>(
    http: &reqwest::Client,
    provider: &str,
    url: &str,
    access_token: &str,
) -> AuthResult<T>
where
    T: for<'de> Deserialize<'de>,
{
    let response = http
        .get(url)
        .bearer_auth(access_token)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| {
            warn!(provider, error = %e, "User fetch request failed");
            AuthError::ExternalFetchFailed(e.to_string())
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        warn!(provider, status = status.as_u16(), upstream = %body, "User fetch failed");
        return Err(AuthError::ExternalFetchFailed(format!("{}: {}", status, body)));
    }

    response.json().await.map_err(|e| {
        warn!(provider, error = %e, "User fetch returned an unexpected body");
        AuthError::ExternalFetchFailed(e.to_string())
    })
}

/// HTTP client shared by provider implementations.
pub(crate) fn http_client() -> AuthResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("zust/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(15))
        .build()
        .map_err(|e| AuthError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OAuthConfig {
        OAuthConfig::new(
            OAuthProvider::GitHub,
            "client-id",
            "client-secret",
            "http://localhost:8080/oauth2/callback",
        )
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!(OAuthProvider::parse("github"), Some(OAuthProvider::GitHub));
        assert_eq!(OAuthProvider::parse("Google"), Some(OAuthProvider::Google));
        assert_eq!(OAuthProvider::parse("gitlab"), None);
        assert_eq!(OAuthProvider::Google.to_string(), "google");
    }

    #[test]
    fn test_default_endpoints() {
        let config = config();

        assert_eq!(config.get_token_url(), "https://github.com/login/oauth/access_token");
        assert_eq!(config.api_endpoint("/user"), "https://api.github.com/user");
        assert_eq!(config.scopes, vec!["read:user", "user:email"]);
    }

    #[test]
    fn test_base_url_override() {
        let config = config().with_base_url("http://127.0.0.1:4000/");

        assert_eq!(config.get_auth_url(), "http://127.0.0.1:4000/login/oauth/authorize");
        assert_eq!(config.api_endpoint("user/emails"), "http://127.0.0.1:4000/user/emails");
    }

    #[test]
    fn test_authorization_url() {
        let url = config().authorization_url().unwrap();

        assert!(url.starts_with("https://github.com/login/oauth/authorize?"));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("state=github"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Foauth2%2Fcallback"));
        assert!(!url.contains("client-secret"));
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let mut config = config();
        config.token_url = Some("not a url".to_string());

        assert!(matches!(config.client(), Err(AuthError::ConfigError(_))));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let token = ProviderToken {
            access_token: "gho_secret".to_string(),
            expires_in: None,
        };

        assert!(!format!("{:?}", token).contains("gho_secret"));
        assert!(!format!("{:?}", config()).contains("client-secret"));
    }
}
