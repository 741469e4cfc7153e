//! Shared handler state
//!
//! Built once at startup and shared behind an `Arc` by every handler.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;
use zust_accounts::{AccountStore, VersionStore};
use zust_auth::{
    AuthConfig, AuthenticatedRequest, Endpoint, FederationBroker, ProfileAssets, ProviderRegistry,
    RetryConfig, SessionAuthority, TokenCodec,
};

use crate::assets::{MediaKind, MediaLinks, MediaStore};
use crate::error::{ApiError, ApiResult};
use crate::mailer::Mailer;
use crate::verification::EmailVerifier;

/// Everything the handlers need.
#[derive(Clone)]
pub struct ApiState {
    config: Arc<AuthConfig>,
    accounts: Arc<dyn AccountStore>,
    sessions: SessionAuthority,
    registry: Arc<ProviderRegistry>,
    broker: FederationBroker,
    verifier: EmailVerifier,
    assets: Option<Arc<dyn ProfileAssets>>,
    media: Option<Arc<dyn MediaStore>>,
    media_links: MediaLinks,
}

impl std::fmt::Debug for ApiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiState")
            .field("public_url", &self.config.public_url)
            .field("providers", &self.registry.names())
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

impl ApiState {
    /// Create handler state.
    ///
    /// Providers with credentials in `config` are registered right away.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an empty signing secret or a provider
    /// client that cannot be built.
    pub fn new<S>(config: AuthConfig, store: Arc<S>, mailer: Arc<dyn Mailer>) -> zust_auth::AuthResult<Self>
    where
        S: AccountStore + 'static,
    {
        let codec = Arc::new(TokenCodec::new(config.token.clone())?);
        let versions: Arc<dyn VersionStore> = store.clone();
        let accounts: Arc<dyn AccountStore> = store;
        let sessions = SessionAuthority::new(codec.clone(), versions);
        let registry = Arc::new(ProviderRegistry::from_config(&config)?);
        let verifier = EmailVerifier::new(codec, mailer, &config);
        let media_links = MediaLinks::new(&config.public_url);
        let broker = FederationBroker::new(registry.clone(), accounts.clone(), sessions.clone())
            .with_avatar_retry(RetryConfig::with_attempts(config.avatar_download_attempts));

        info!(providers = ?registry.names(), "Handler state initialized");

        Ok(Self {
            config: Arc::new(config),
            accounts,
            sessions,
            registry,
            broker,
            verifier,
            assets: None,
            media: None,
            media_links,
        })
    }

    /// Replace the provider registry.
    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Arc::new(registry);
        self.rebuild_broker();
        self
    }

    /// Create profile media for new accounts.
    pub fn with_assets(mut self, assets: Arc<dyn ProfileAssets>) -> Self {
        self.assets = Some(assets);
        self.rebuild_broker();
        self
    }

    /// Serve and overwrite profile media from `media`.
    pub fn with_media(mut self, media: Arc<dyn MediaStore>) -> Self {
        self.media = Some(media);
        self
    }

    fn rebuild_broker(&mut self) {
        let mut broker = FederationBroker::new(self.registry.clone(), self.accounts.clone(), self.sessions.clone())
            .with_avatar_retry(RetryConfig::with_attempts(self.config.avatar_download_attempts));
        if let Some(assets) = &self.assets {
            broker = broker.with_assets(assets.clone());
        }
        self.broker = broker;
    }

    /// Get the configuration.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Get the account store.
    pub fn accounts(&self) -> &dyn AccountStore {
        self.accounts.as_ref()
    }

    /// Get the session authority.
    pub fn sessions(&self) -> &SessionAuthority {
        &self.sessions
    }

    /// Get the federation broker.
    pub fn broker(&self) -> &FederationBroker {
        &self.broker
    }

    /// Get the email verifier.
    pub fn verifier(&self) -> &EmailVerifier {
        &self.verifier
    }

    /// Get the media store, if one is configured.
    pub fn media(&self) -> Option<&dyn MediaStore> {
        self.media.as_deref()
    }

    /// Public link to an account's avatar.
    pub fn avatar_link(&self, account_id: Uuid) -> String {
        self.media_links.link(account_id, MediaKind::Avatar)
    }

    /// Overwrite one of an account's media files.
    pub(crate) async fn put_media(&self, account_id: Uuid, kind: MediaKind, bytes: Vec<u8>) -> ApiResult<()> {
        let key = kind.key(account_id);
        let Some(media) = self.media() else {
            warn!(key = %key, "No media store configured");
            return Err(ApiError::internal());
        };
        media.put(&key, bytes).await.map_err(|e| ApiError::media(&key, e))
    }

    /// Create default media for a new account in the background.
    pub(crate) fn spawn_default_assets(&self, account_id: Uuid) {
        let Some(assets) = self.assets.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = assets.create_default_assets(account_id).await {
                warn!(account_id = %account_id, error = %e, "Failed to create default profile assets");
            }
        });
    }

    /// Verify the bearer token of a request to `path`.
    ///
    /// The refresh endpoint accepts refresh tokens; every other path
    /// accepts access tokens.
    pub async fn authenticate<R>(
        &self,
        request: R,
        path: &str,
        authorization: Option<&str>,
    ) -> ApiResult<AuthenticatedRequest<R>> {
        let authenticated = self
            .sessions
            .authenticate(request, authorization, Endpoint::from_path(path))
            .await?;
        Ok(authenticated)
    }
}
