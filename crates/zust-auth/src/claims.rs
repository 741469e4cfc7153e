//! Bearer token claims
//!
//! [`TokenClaims`] is the wire shape signed into every JWT. Parsing turns it
//! into [`Claims`], whose fields are already validated and typed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use zust_accounts::Role;

use crate::error::AuthError;

/// Token kind enumeration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Access token (short-lived)
    #[serde(rename = "access-token")]
    Access,

    /// Refresh token (long-lived, accepted only on the refresh endpoint)
    #[serde(rename = "refresh-token")]
    Refresh,
}

impl TokenKind {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access-token",
            TokenKind::Refresh => "refresh-token",
        }
    }
}

impl FromStr for TokenKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "access-token" => Ok(TokenKind::Access),
            "refresh-token" => Ok(TokenKind::Refresh),
            other => Err(AuthError::InvalidKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// JWT claims as they appear on the wire.
///
/// String-typed on purpose: a token with an unknown kind or a non-UUID
/// subject still decodes, and is then rejected with `InvalidClaims` instead
/// of being reported as malformed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    // Standard JWT claims (RFC 7519)
    /// Subject (account ID)
    pub sub: String,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    // Zust claims
    /// Account role
    pub role: String,

    /// Token kind ("access-token" or "refresh-token")
    pub token_type: String,

    /// Account token version at issuance
    pub version: i64,
}

impl TokenClaims {
    /// Create wire claims for a subject.
    pub fn new(
        subject: Uuid,
        role: Role,
        kind: TokenKind,
        version: i64,
        issuer: impl Into<String>,
        duration: chrono::Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: subject.to_string(),
            iss: issuer.into(),
            iat: now.timestamp(),
            exp: expiry(now, duration),
            role: role.as_str().to_string(),
            token_type: kind.as_str().to_string(),
            version,
        }
    }
}

// Saturates instead of overflowing for lifetimes past the calendar range.
fn expiry(now: DateTime<Utc>, duration: chrono::Duration) -> i64 {
    now.timestamp().saturating_add(duration.num_seconds())
}

/// Validated claims of a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Account the token was issued to
    pub subject: Uuid,

    /// Account role at issuance
    pub role: Role,

    /// Token kind
    pub kind: TokenKind,

    /// Account token version at issuance
    pub version: i64,

    /// Issuer tag
    pub issuer: String,

    /// Issued at
    pub issued_at: DateTime<Utc>,

    /// Expires at
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    /// Check if the token is past its expiry (without leeway).
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

impl TryFrom<TokenClaims> for Claims {
    type Error = AuthError;

    fn try_from(raw: TokenClaims) -> Result<Self, Self::Error> {
        let subject = Uuid::parse_str(&raw.sub)
            .map_err(|_| AuthError::InvalidClaims("invalid account ID in token".to_string()))?;
        let kind = raw
            .token_type
            .parse::<TokenKind>()
            .map_err(|_| AuthError::InvalidClaims("invalid token type".to_string()))?;
        let role = Role::parse(&raw.role)
            .ok_or_else(|| AuthError::InvalidClaims("invalid role".to_string()))?;
        let issued_at = DateTime::from_timestamp(raw.iat, 0)
            .ok_or_else(|| AuthError::InvalidClaims("invalid issued-at".to_string()))?;
        let expires_at = DateTime::from_timestamp(raw.exp, 0)
            .ok_or_else(|| AuthError::InvalidClaims("invalid expiry".to_string()))?;

        Ok(Self {
            subject,
            role,
            kind,
            version: raw.version,
            issuer: raw.iss,
            issued_at,
            expires_at,
        })
    }
}

/// Claims of an email verification link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationClaims {
    /// Account to activate
    pub sub: Uuid,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Always [`VerificationClaims::PURPOSE`]
    pub purpose: String,
}

impl VerificationClaims {
    /// Purpose tag distinguishing verification links from other tokens.
    pub const PURPOSE: &'static str = "email-verification";

    /// Create verification claims for an account.
    pub fn new(account_id: Uuid, issuer: impl Into<String>, duration: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: account_id,
            iss: issuer.into(),
            iat: now.timestamp(),
            exp: expiry(now, duration),
            purpose: Self::PURPOSE.to_string(),
        }
    }
}
