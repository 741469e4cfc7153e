//! Provider registry.

use std::collections::HashMap;
use std::sync::Arc;

use super::{GitHubProvider, GoogleProvider, IdentityProvider, OAuthConfig, OAuthProvider};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

/// Maps a provider tag (the OAuth `state` value) to a provider instance.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn IdentityProvider>>,
    configs: HashMap<String, OAuthConfig>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry with every provider that has credentials configured.
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        let mut registry = Self::new();
        let redirect = config.oauth_redirect_url();

        if let Some(credentials) = &config.github {
            registry.register_configured(OAuthConfig::from_credentials(
                OAuthProvider::GitHub,
                credentials,
                redirect.clone(),
            ))?;
        }
        if let Some(credentials) = &config.google {
            registry.register_configured(OAuthConfig::from_credentials(
                OAuthProvider::Google,
                credentials,
                redirect,
            ))?;
        }

        tracing::info!(providers = ?registry.names(), "OAuth providers registered");
        Ok(registry)
    }

    /// Register a built-in provider from its configuration.
    ///
    /// The configuration is kept so authorization URLs can be built for it.
    pub fn register_configured(&mut self, config: OAuthConfig) -> AuthResult<&mut Self> {
        let provider: Arc<dyn IdentityProvider> = match config.provider {
            OAuthProvider::GitHub => Arc::new(GitHubProvider::new(config.clone())?),
            OAuthProvider::Google => Arc::new(GoogleProvider::new(config.clone())?),
        };
        self.configs.insert(provider.name().to_string(), config);
        Ok(self.register(provider))
    }

    /// Register an arbitrary provider under its own name.
    pub fn register(&mut self, provider: Arc<dyn IdentityProvider>) -> &mut Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }

    /// Look up a provider by tag.
    pub fn get(&self, tag: &str) -> AuthResult<Arc<dyn IdentityProvider>> {
        self.providers
            .get(tag.trim())
            .cloned()
            .ok_or_else(|| AuthError::UnknownProvider(tag.to_string()))
    }

    /// Build the authorization URL for a provider.
    pub fn authorization_url(&self, tag: &str) -> AuthResult<String> {
        self.configs
            .get(tag.trim())
            .ok_or_else(|| AuthError::UnknownProvider(tag.to_string()))?
            .authorization_url()
    }

    /// Registered provider tags, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}
