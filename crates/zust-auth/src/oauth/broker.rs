//! Federation broker
//!
//! Handles the OAuth callback: resolves the provider from `state`, exchanges
//! the code, fetches the external identity and logs in or registers the
//! matching local account.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use zust_accounts::{Account, AccountStore, NewOAuthAccount, OAuthLink, StoreError, OAUTH_CONSTRAINT};

use super::{ExternalIdentity, ProviderRegistry};
use crate::error::{AuthError, AuthResult, ConflictField};
use crate::jwt::TokenPair;
use crate::retry::{with_retry, RetryConfig};
use crate::session::SessionAuthority;

/// Per-account media initialised when an account is created.
#[async_trait]
pub trait ProfileAssets: Send + Sync {
    /// Create the account's default avatar and cover images.
    async fn create_default_assets(&self, account_id: Uuid) -> AuthResult<()>;

    /// Replace the account's avatar with the image at `avatar_url`.
    async fn download_avatar(&self, account_id: Uuid, avatar_url: &str) -> AuthResult<()>;
}

/// Outcome of a successful callback.
#[derive(Debug, Clone)]
pub struct FederatedLogin {
    /// The local account
    pub account: Account,
    /// Freshly issued tokens
    pub tokens: TokenPair,
    /// True when this callback registered the account
    pub created: bool,
}

/// Reconciles external identities with local accounts.
#[derive(Clone)]
pub struct FederationBroker {
    registry: Arc<ProviderRegistry>,
    accounts: Arc<dyn AccountStore>,
    sessions: SessionAuthority,
    assets: Option<Arc<dyn ProfileAssets>>,
    avatar_retry: RetryConfig,
}

impl std::fmt::Debug for FederationBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederationBroker")
            .field("registry", &self.registry)
            .field("sessions", &self.sessions)
            .field("avatar_retry", &self.avatar_retry)
            .finish_non_exhaustive()
    }
}

impl FederationBroker {
    /// Create a broker.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        accounts: Arc<dyn AccountStore>,
        sessions: SessionAuthority,
    ) -> Self {
        Self {
            registry,
            accounts,
            sessions,
            assets: None,
            avatar_retry: RetryConfig::default(),
        }
    }

    /// Initialise profile assets for accounts created by this broker.
    pub fn with_assets(mut self, assets: Arc<dyn ProfileAssets>) -> Self {
        self.assets = Some(assets);
        self
    }

    /// Set the retry policy for avatar downloads.
    pub fn with_avatar_retry(mut self, retry: RetryConfig) -> Self {
        self.avatar_retry = retry;
        self
    }

    /// Get the provider registry.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Handle `GET /oauth2/callback?code=&state=`.
    ///
    /// # Errors
    ///
    /// - `UnknownProvider` if `state` names no registered provider
    /// - `MissingAuthorizationCode` if `code` is empty
    /// - `ExternalExchangeFailed` / `ExternalFetchFailed` on provider errors
    /// - `AccountNotActive` if the linked account is not active
    /// - `Conflict` if the reported email or username is taken by another account
    #[instrument(skip(self, code))]
    pub async fn handle_callback(&self, code: &str, state: &str) -> AuthResult<FederatedLogin> {
        let provider = self.registry.get(state)?;
        if code.trim().is_empty() {
            return Err(AuthError::MissingAuthorizationCode);
        }

        let token = provider.exchange_code(code).await?;
        let identity = provider.fetch_user(&token.access_token).await?;
        debug!(provider = provider.name(), provider_id = %identity.provider_id, "External identity fetched");

        self.reconcile(provider.name(), identity).await
    }

    /// Log in the account linked to `identity`, registering it on first sight.
    pub async fn reconcile(&self, provider: &str, identity: ExternalIdentity) -> AuthResult<FederatedLogin> {
        let registered = self
            .accounts
            .is_account_registered(provider, &identity.provider_id)
            .await
            .map_err(AuthError::Store)?;

        if registered {
            return self.login(provider, &identity.provider_id).await;
        }

        let params = NewOAuthAccount {
            email: identity.email.clone(),
            username: identity.display_name.clone(),
            link: OAuthLink::new(provider, identity.provider_id.clone()),
        };

        match self.accounts.create_account_with_oauth(params).await {
            Ok(account) => {
                let tokens = self.sessions.issue(&account)?;
                info!(account_id = %account.id, provider, "Account registered through OAuth");
                self.spawn_asset_setup(account.id, identity.avatar_url);
                Ok(FederatedLogin {
                    account,
                    tokens,
                    created: true,
                })
            }
            // A concurrent callback registered the same identity first
            Err(e) if e.violates(OAUTH_CONSTRAINT) => {
                debug!(provider, provider_id = %identity.provider_id, "Identity registered concurrently");
                self.login(provider, &identity.provider_id).await
            }
            Err(e) => Err(match ConflictField::from_store_error(&e) {
                Some(field) => AuthError::Conflict(field),
                None => AuthError::Store(e),
            }),
        }
    }

    async fn login(&self, provider: &str, provider_id: &str) -> AuthResult<FederatedLogin> {
        let account = self
            .accounts
            .login_with_oauth(provider, provider_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AuthError::AccountNotFound,
                other => AuthError::Store(other),
            })?;
        let tokens = self.sessions.issue(&account)?;
        debug!(account_id = %account.id, provider, "OAuth login");

        Ok(FederatedLogin {
            account,
            tokens,
            created: false,
        })
    }

    fn spawn_asset_setup(&self, account_id: Uuid, avatar_url: Option<String>) {
        let Some(assets) = self.assets.clone() else {
            return;
        };
        let retry = self.avatar_retry.clone();

        tokio::spawn(async move {
            if let Err(e) = assets.create_default_assets(account_id).await {
                warn!(account_id = %account_id, error = %e, "Failed to create default profile assets");
            }

            let Some(url) = avatar_url else {
                return;
            };
            let download = with_retry(&retry, || {
                let assets = assets.clone();
                let url = url.clone();
                async move { assets.download_avatar(account_id, &url).await }
            });
            match download.await {
                Ok(()) => debug!(account_id = %account_id, "Provider avatar downloaded"),
                Err(e) => {
                    warn!(account_id = %account_id, error = %e, "Keeping default avatar after failed download")
                }
            }
        });
    }
}
