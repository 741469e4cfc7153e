//! Session lifecycle
//!
//! There is no server-side session object. A session is a pair of signed
//! tokens stamped with the account's `token_version`; it stays valid until
//! that version moves. Logout, refresh, lock and ban all end sessions the
//! same way, by incrementing the version in the store.

use std::sync::Arc;

use tracing::{debug, instrument, warn};
use uuid::Uuid;
use zust_accounts::{Account, Role, StoreError, VersionStore};

use crate::claims::{Claims, TokenKind};
use crate::error::{AuthError, AuthResult};
use crate::jwt::{TokenCodec, TokenPair};

/// Path of the token refresh endpoint.
pub const REFRESH_PATH: &str = "/auth/token/refresh";

/// Endpoint class used to decide which token kinds are acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// The refresh endpoint; accepts refresh tokens only
    TokenRefresh,
    /// Any other protected endpoint; accepts access tokens only
    Protected,
}

impl Endpoint {
    /// Classify a request path.
    pub fn from_path(path: &str) -> Self {
        let path = path.split('?').next().unwrap_or(path);
        if path.trim_end_matches('/') == REFRESH_PATH {
            Endpoint::TokenRefresh
        } else {
            Endpoint::Protected
        }
    }

    /// Check whether a token kind may be used on this endpoint.
    pub fn accepts(&self, kind: TokenKind) -> bool {
        matches!(
            (self, kind),
            (Endpoint::TokenRefresh, TokenKind::Refresh) | (Endpoint::Protected, TokenKind::Access)
        )
    }
}

/// A request whose bearer token has been verified.
#[derive(Debug, Clone)]
pub struct AuthenticatedRequest<R> {
    /// The original request value
    pub request: R,
    /// Verified claims of the presented token
    pub claims: Claims,
}

impl<R> AuthenticatedRequest<R> {
    /// Account the token belongs to.
    pub fn account_id(&self) -> Uuid {
        self.claims.subject
    }

    /// Role recorded in the token.
    pub fn role(&self) -> Role {
        self.claims.role
    }

    /// Split into request and claims.
    pub fn into_parts(self) -> (R, Claims) {
        (self.request, self.claims)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(authorization: Option<&str>) -> AuthResult<&str> {
    authorization
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingCredentials)
}

/// Issues, verifies and invalidates bearer token sessions.
#[derive(Clone)]
pub struct SessionAuthority {
    codec: Arc<TokenCodec>,
    versions: Arc<dyn VersionStore>,
}

impl std::fmt::Debug for SessionAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthority")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl SessionAuthority {
    /// Create a session authority.
    pub fn new(codec: Arc<TokenCodec>, versions: Arc<dyn VersionStore>) -> Self {
        Self { codec, versions }
    }

    /// Get the token codec.
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Issue an access/refresh token pair for an account.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotActive` unless the account status is active.
    pub fn issue(&self, account: &Account) -> AuthResult<TokenPair> {
        if !account.status.is_active() {
            debug!(account_id = %account.id, status = %account.status, "Refusing tokens for inactive account");
            return Err(AuthError::AccountNotActive);
        }
        self.mint(account.id, account.role, account.token_version)
    }

    /// Verify a bearer token for the given endpoint.
    ///
    /// The signature and expiry are checked first, then the embedded
    /// version is compared with the account's current version, then the
    /// token kind is checked against the endpoint.
    #[instrument(skip(self, token))]
    pub async fn verify(&self, token: &str, endpoint: Endpoint) -> AuthResult<Claims> {
        let claims = self.codec.parse(token)?;

        let current = match self.versions.get_token_version(claims.subject).await {
            Ok(version) => version,
            Err(StoreError::NotFound) => {
                debug!(account_id = %claims.subject, "Token subject no longer exists");
                return Err(AuthError::StaleVersion);
            }
            Err(e) => {
                warn!(account_id = %claims.subject, error = %e, "Token version lookup failed");
                return Err(AuthError::Store(e));
            }
        };

        if current != claims.version {
            debug!(
                account_id = %claims.subject,
                token_version = claims.version,
                current_version = current,
                "Token version is stale"
            );
            return Err(AuthError::StaleVersion);
        }

        if !endpoint.accepts(claims.kind) {
            debug!(account_id = %claims.subject, kind = %claims.kind, "Token kind not accepted here");
            return Err(AuthError::WrongTokenKind);
        }

        Ok(claims)
    }

    /// Authenticate a request from its `Authorization` header value.
    pub async fn authenticate<R>(
        &self,
        request: R,
        authorization: Option<&str>,
        endpoint: Endpoint,
    ) -> AuthResult<AuthenticatedRequest<R>> {
        let token = bearer_token(authorization)?;
        let claims = self.verify(token, endpoint).await?;
        Ok(AuthenticatedRequest { request, claims })
    }

    /// Invalidate every outstanding token of an account.
    ///
    /// # Returns
    ///
    /// The new token version
    #[instrument(skip(self))]
    pub async fn invalidate(&self, account_id: Uuid) -> AuthResult<i64> {
        let version = self
            .versions
            .increment_token_version(account_id)
            .await
            .map_err(AuthError::from_account_lookup)?;
        debug!(account_id = %account_id, version, "Sessions invalidated");
        Ok(version)
    }

    /// Exchange a verified refresh token for a new token pair.
    ///
    /// The presented refresh token is burned by the version increment. If
    /// the increment does not land exactly one past the presented version,
    /// another refresh consumed the same token concurrently and this one
    /// fails with `StaleVersion`.
    #[instrument(skip(self, claims), fields(account_id = %claims.subject))]
    pub async fn refresh(&self, claims: &Claims) -> AuthResult<TokenPair> {
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::WrongTokenKind);
        }

        let version = self.invalidate(claims.subject).await?;
        if version != claims.version + 1 {
            warn!(
                account_id = %claims.subject,
                token_version = claims.version,
                new_version = version,
                "Refresh token reused concurrently"
            );
            return Err(AuthError::StaleVersion);
        }

        self.mint(claims.subject, claims.role, version)
    }

    /// End every session of the token's account.
    #[instrument(skip(self, claims), fields(account_id = %claims.subject))]
    pub async fn logout(&self, claims: &Claims) -> AuthResult<()> {
        self.invalidate(claims.subject).await.map(|_| ())
    }

    fn mint(&self, subject: Uuid, role: Role, version: i64) -> AuthResult<TokenPair> {
        let config = self.codec.config();
        let access_token = self.codec.issue(
            subject,
            role,
            TokenKind::Access,
            version,
            config.access_token_duration,
        )?;
        let refresh_token = self.codec.issue(
            subject,
            role,
            TokenKind::Refresh,
            version,
            config.refresh_token_duration,
        )?;

        Ok(TokenPair::new(
            access_token,
            refresh_token,
            config.access_token_duration.num_seconds(),
        ))
    }
}
