//! GitHub identity provider.

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{exchange_with, fetch_json, http_client, ExternalIdentity, IdentityProvider, OAuthConfig, ProviderToken};
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    avatar_url: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

/// GitHub OAuth app.
#[derive(Debug, Clone)]
pub struct GitHubProvider {
    config: OAuthConfig,
    client: BasicClient,
    http: reqwest::Client,
}

impl GitHubProvider {
    /// Create a provider from its configuration.
    pub fn new(config: OAuthConfig) -> AuthResult<Self> {
        let client = config.client()?;
        let http = http_client()?;
        Ok(Self {
            config,
            client,
            http,
        })
    }

    /// Primary verified address, for accounts that keep their profile email private.
    async fn primary_email(&self, access_token: &str) -> AuthResult<String> {
        let url = self.config.api_endpoint("/user/emails");
        let emails: Vec<GitHubEmail> = fetch_json(&self.http, self.name(), &url, access_token).await?;

        emails
            .into_iter()
            .find(|e| e.primary && e.verified)
            .map(|e| e.email)
            .ok_or_else(|| AuthError::ExternalFetchFailed("no verified primary email".to_string()))
    }
}

#[async_trait]
impl IdentityProvider for GitHubProvider {
    fn name(&self) -> &str {
        "github"
    }

    #[instrument(skip(self, code))]
    async fn exchange_code(&self, code: &str) -> AuthResult<ProviderToken> {
        exchange_with(&self.client, self.name(), code).await
    }

    #[instrument(skip(self, access_token))]
    async fn fetch_user(&self, access_token: &str) -> AuthResult<ExternalIdentity> {
        let url = self.config.api_endpoint("/user");
        let user: GitHubUser = fetch_json(&self.http, self.name(), &url, access_token).await?;

        let email = match user.email.filter(|e| !e.is_empty()) {
            Some(email) => email,
            None => {
                debug!(github_id = user.id, "Profile email is private, reading email list");
                self.primary_email(access_token).await?
            }
        };

        Ok(ExternalIdentity {
            provider_id: user.id.to_string(),
            display_name: user.login,
            avatar_url: user.avatar_url.filter(|u| !u.is_empty()),
            email,
        })
    }
}
