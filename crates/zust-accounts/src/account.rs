//! Account domain models
//!
//! An account is either a password account (registered through
//! `POST /auth/register`, inactive until its email is verified) or a
//! federated account (created on the first OAuth callback, active at once).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::roles::Role;

/// Lifecycle status of an account.
///
/// Only `Active` accounts may obtain tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Registered but email not verified yet
    #[default]
    Inactive,
    /// Normal state
    Active,
    /// Banned by an admin
    Banned,
    /// Locked by the owner or an admin
    Locked,
}

impl AccountStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Banned => "banned",
            Self::Locked => "locked",
        }
    }

    /// Check whether the account may log in.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reference to the external identity an account was federated from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct OAuthLink {
    /// Provider tag (e.g. "github", "google")
    pub provider: String,

    /// Identifier assigned by the provider
    pub provider_id: String,
}

impl OAuthLink {
    /// Create a new link.
    pub fn new(provider: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            provider_id: provider_id.into(),
        }
    }
}

/// A platform account.
///
/// # Invariants
///
/// - `token_version` starts at 1 and never decreases.
/// - An account carries a password hash or an OAuth link, never both.
#[derive(Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: Uuid,

    /// Email address (unique)
    pub email: String,

    /// Username (unique)
    pub username: String,

    /// Password digest, absent for federated accounts
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    /// Free-form profile description
    pub description: Option<String>,

    /// Platform role
    pub role: Role,

    /// Lifecycle status
    pub status: AccountStatus,

    /// External identity for federated accounts
    pub oauth: Option<OAuthLink>,

    /// Revocation counter embedded in every issued token
    pub token_version: i64,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "[REDACTED]"))
            .field("role", &self.role)
            .field("status", &self.status)
            .field("oauth", &self.oauth)
            .field("token_version", &self.token_version)
            .finish()
    }
}

impl Account {
    /// Initial value of `token_version` for new accounts.
    pub const INITIAL_TOKEN_VERSION: i64 = 1;

    /// Build an inactive password account.
    pub fn with_password(params: NewPasswordAccount) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            email: params.email,
            username: params.username,
            password_hash: Some(params.password_hash),
            description: None,
            role: Role::User,
            status: AccountStatus::Inactive,
            oauth: None,
            token_version: Self::INITIAL_TOKEN_VERSION,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build an active federated account.
    ///
    /// The provider already verified the email, so no activation step is needed.
    pub fn with_oauth(params: NewOAuthAccount) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            email: params.email,
            username: params.username,
            password_hash: None,
            description: None,
            role: Role::User,
            status: AccountStatus::Active,
            oauth: Some(params.link),
            token_version: Self::INITIAL_TOKEN_VERSION,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the account is federated.
    pub fn is_federated(&self) -> bool {
        self.oauth.is_some()
    }

    /// Public view of the account.
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id,
            username: self.username.clone(),
            description: self.description.clone(),
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// Parameters for `create_account_with_password`.
#[derive(Clone)]
pub struct NewPasswordAccount {
    /// Email address
    pub email: String,
    /// Username
    pub username: String,
    /// Already-hashed password
    pub password_hash: String,
}

impl std::fmt::Debug for NewPasswordAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewPasswordAccount")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// Parameters for `create_account_with_oauth`.
#[derive(Debug, Clone)]
pub struct NewOAuthAccount {
    /// Email address reported by the provider
    pub email: String,
    /// Username, taken from the provider display name
    pub username: String,
    /// External identity
    pub link: OAuthLink,
}

/// Parameters for `update_profile`. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// New username
    pub username: Option<String>,
    /// New description
    pub description: Option<String>,
}

impl ProfileUpdate {
    /// Check whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.description.is_none()
    }
}

/// Field used to look up an account for password login or verification resend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialField {
    /// Look up by username
    Username(String),
    /// Look up by email
    Email(String),
}

/// Public profile returned by `GET /accounts/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    /// Account ID
    pub id: Uuid,
    /// Username
    pub username: String,
    /// Description
    pub description: Option<String>,
    /// Status
    pub status: AccountStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
}
