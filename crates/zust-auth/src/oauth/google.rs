//! Google identity provider.

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use serde::Deserialize;
use tracing::instrument;

use super::{exchange_with, fetch_json, http_client, ExternalIdentity, IdentityProvider, OAuthConfig, ProviderToken};
use crate::error::{AuthError, AuthResult};

/// Response of the v2 userinfo endpoint.
#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: String,
    name: Option<String>,
    picture: Option<String>,
    email: Option<String>,
}

/// Google OAuth client.
#[derive(Debug, Clone)]
pub struct GoogleProvider {
    config: OAuthConfig,
    client: BasicClient,
    http: reqwest::Client,
}

impl GoogleProvider {
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
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    #[instrument(skip(self, code))]
    async fn exchange_code(&self, code: &str) -> AuthResult<ProviderToken> {
        exchange_with(&self.client, self.name(), code).await
    }

    #[instrument(skip(self, access_token))]
    async fn fetch_user(&self, access_token: &str) -> AuthResult<ExternalIdentity> {
        let url = self.config.api_endpoint("/oauth2/v2/userinfo");
        let user: GoogleUser = fetch_json(&self.http, self.name(), &url, access_token).await?;

        let email = user
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AuthError::ExternalFetchFailed("userinfo has no email".to_string()))?;
        // Accounts without a profile name fall back to the email local part
        let display_name = user
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or(&email).to_string());

        Ok(ExternalIdentity {
            provider_id: user.id,
            display_name,
            avatar_url: user.picture.filter(|u| !u.is_empty()),
            email,
        })
    }
}
