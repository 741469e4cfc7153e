//! JWT token generation and validation
//!
//! This module provides the token codec using the jsonwebtoken crate.
//! Tokens are signed with HS256 under a single symmetric key; on parse only
//! the HMAC family is accepted, which rules out algorithm-substitution
//! tricks such as presenting an RS256 header to an HMAC verifier.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zust_accounts::Role;

use crate::claims::{Claims, TokenClaims, TokenKind, VerificationClaims};
use crate::config::TokenConfig;
use crate::error::{AuthError, AuthResult};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

/// Token codec for issuing and parsing signed tokens.
pub struct TokenCodec {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("config", &self.config)
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

impl TokenCodec {
    /// Create a new codec with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ConfigError` if the secret is empty.
    pub fn new(config: TokenConfig) -> AuthResult<Self> {
        if config.secret.is_empty() {
            return Err(AuthError::ConfigError("Secret required for HMAC".to_string()));
        }
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Ok(Self {
            config,
            encoding_key,
            decoding_key,
        })
    }

    /// Create with a simple secret and default lifetimes.
    pub fn with_secret(secret: impl Into<String>) -> AuthResult<Self> {
        Self::new(TokenConfig::with_secret(secret))
    }

    /// Get the configuration.
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Issue a bearer token.
    ///
    /// # Arguments
    ///
    /// * `subject` - Account ID
    /// * `role` - Account role
    /// * `kind` - Access or refresh
    /// * `version` - Account token version observed at issuance
    /// * `ttl` - Token lifetime, must be positive
    ///
    /// # Returns
    ///
    /// Encoded JWT token string
    pub fn issue(
        &self,
        subject: Uuid,
        role: Role,
        kind: TokenKind,
        version: i64,
        ttl: Duration,
    ) -> AuthResult<String> {
        if ttl <= Duration::zero() {
            return Err(AuthError::InvalidClaims(
                "token lifetime must be positive".to_string(),
            ));
        }
        let claims = TokenClaims::new(subject, role, kind, version, &self.config.issuer, ttl);
        self.encode_claims(&claims)
    }

    /// Sign arbitrary claims with the codec's key.
    pub fn encode_claims<T: Serialize>(&self, claims: &T) -> AuthResult<String> {
        let header = Header::new(Algorithm::HS256);
        encode(&header, claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Token encoding failed: {}", e)))
    }

    /// Validate and decode a bearer token.
    ///
    /// # Errors
    ///
    /// - `TokenExpired` past expiry plus leeway
    /// - `MalformedToken` when the token is not a decodable JWT
    /// - `BadSignature` on signature mismatch or a non-HMAC algorithm
    /// - `InvalidClaims` on a wrong issuer or unusable claim values
    pub fn parse(&self, token: &str) -> AuthResult<Claims> {
        let raw: TokenClaims = self.decode_checked(token)?;
        Claims::try_from(raw)
    }

    /// Issue an email verification token for an account.
    pub fn issue_verification(&self, account_id: Uuid) -> AuthResult<String> {
        let claims = VerificationClaims::new(
            account_id,
            &self.config.issuer,
            self.config.verification_token_duration,
        );
        self.encode_claims(&claims)
    }

    /// Validate an email verification token and return the account ID.
    pub fn parse_verification(&self, token: &str) -> AuthResult<Uuid> {
        let claims: VerificationClaims = self.decode_checked(token)?;
        if claims.purpose != VerificationClaims::PURPOSE {
            return Err(AuthError::InvalidClaims("not a verification token".to_string()));
        }
        Ok(claims.sub)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = self.config.leeway_secs;
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_aud = false;
        validation
    }

    fn decode_checked<T>(&self, token: &str) -> AuthResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        decode::<T>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName
                | ErrorKind::MissingAlgorithm => AuthError::BadSignature,
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => AuthError::MalformedToken,
                ErrorKind::InvalidIssuer => AuthError::InvalidClaims("invalid issuer".to_string()),
                ErrorKind::MissingRequiredClaim(claim) => {
                    AuthError::InvalidClaims(format!("missing claim {}", claim))
                }
                ErrorKind::ImmatureSignature => {
                    AuthError::InvalidClaims("token is not valid yet".to_string())
                }
                _ => AuthError::InvalidClaims(e.to_string()),
            })
    }
}

/// Token pair containing access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access token (short-lived)
    pub access_token: String,

    /// Refresh token (long-lived)
    pub refresh_token: String,

    /// Token type (always "Bearer")
    pub token_type: String,

    /// Access token expiration in seconds
    pub expires_in: i64,
}

impl TokenPair {
    /// Create a new token pair.
    pub fn new(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}
