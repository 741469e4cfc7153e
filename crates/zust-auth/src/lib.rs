//! # Zust Authentication
//!
//! This crate provides the authentication core of the Zust backend: password
//! credentials, bearer token sessions and OAuth2 identity federation.
//!
//! ## Overview
//!
//! - **Passwords**: Argon2id hashing and verification
//! - **JWT**: HS256 token issuance and validation
//! - **Sessions**: Token pairs tied to a per-account version counter;
//!   incrementing the version invalidates every outstanding token
//! - **OAuth 2.0**: GitHub and Google authorization-code flow, with
//!   login-or-register reconciliation of external identities
//!
//! ## Features
//!
//! - `jwt` (default): token codec and session authority using jsonwebtoken
//! - `oauth` (default): identity federation using oauth2 and reqwest
//! - `full`: All features enabled
//!
//! ## Usage
//!
//! ### Sessions
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zust_accounts::MemoryAccountStore;
//! use zust_auth::{Endpoint, SessionAuthority, TokenCodec};
//!
//! # async fn example(account: zust_accounts::Account) -> zust_auth::AuthResult<()> {
//! let codec = Arc::new(TokenCodec::with_secret("your-secret-key")?);
//! let sessions = SessionAuthority::new(codec, Arc::new(MemoryAccountStore::new()));
//!
//! // Issue tokens at login
//! let pair = sessions.issue(&account)?;
//!
//! // Verify on every protected request
//! let claims = sessions.verify(&pair.access_token, Endpoint::Protected).await?;
//!
//! // Logout invalidates every token of the account
//! sessions.logout(&claims).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### OAuth 2.0
//!
//! ```rust,no_run
//! use zust_auth::{AuthConfig, ProviderRegistry};
//!
//! # fn example() -> zust_auth::AuthResult<()> {
//! let config = AuthConfig::from_env().map_err(|e| zust_auth::AuthError::ConfigError(e.to_string()))?;
//! let registry = ProviderRegistry::from_config(&config)?;
//!
//! // Redirect the user here; the callback carries `state=github`
//! let url = registry.authorization_url("github")?;
//! # Ok(())
//! # }
//! ```

pub mod claims;
pub mod config;
pub mod error;
#[cfg(feature = "jwt")]
pub mod jwt;
#[cfg(all(feature = "jwt", feature = "oauth"))]
pub mod oauth;
pub mod password;
pub mod retry;
#[cfg(feature = "jwt")]
pub mod session;

// Re-export main types
pub use claims::{Claims, TokenClaims, TokenKind, VerificationClaims};
pub use config::{AuthConfig, ConfigError, ProviderCredentials, TokenConfig};
pub use error::{AuthError, AuthResult, ConflictField, INVALID_CREDENTIALS_MESSAGE};
pub use password::{hash_password, verify_password};
pub use retry::{with_retry, with_retry_if, RetryConfig};

#[cfg(feature = "jwt")]
pub use jwt::{TokenCodec, TokenPair};

#[cfg(feature = "jwt")]
pub use session::{bearer_token, AuthenticatedRequest, Endpoint, SessionAuthority, REFRESH_PATH};

#[cfg(all(feature = "jwt", feature = "oauth"))]
pub use oauth::{
    ExternalIdentity, FederatedLogin, FederationBroker, GitHubProvider, GoogleProvider,
    IdentityProvider, OAuthConfig, OAuthProvider, ProfileAssets, ProviderRegistry, ProviderToken,
};
