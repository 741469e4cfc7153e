//! Persistence contract
//!
//! The authentication core never talks to a database directly. It consumes
//! these traits, which a SQL backend implements with one query per method.
//! [`MemoryAccountStore`](crate::memory::MemoryAccountStore) is the
//! in-process implementation used for development and tests.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::account::{
    Account, AccountStatus, CredentialField, NewOAuthAccount, NewPasswordAccount, ProfileUpdate,
};

/// Unique constraint on `accounts.email`.
pub const EMAIL_CONSTRAINT: &str = "accounts_email_key";

/// Unique constraint on `accounts.username`.
pub const USERNAME_CONSTRAINT: &str = "accounts_username_key";

/// Unique constraint on `(accounts.oauth_provider, accounts.oauth_provider_id)`.
pub const OAUTH_CONSTRAINT: &str = "accounts_oauth_key";

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row matched the query
    #[error("Record not found")]
    NotFound,

    /// A unique constraint was violated; the message names the constraint
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Connection, timeout or any other backend failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Check if this is the "no rows" signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }

    /// Check if this error is a violation of the given constraint.
    ///
    /// Backends report constraint names inside their error text, so the check
    /// is a substring match on the message.
    pub fn violates(&self, constraint: &str) -> bool {
        match self {
            StoreError::UniqueViolation(message) => message.contains(constraint),
            _ => false,
        }
    }
}

/// Per-account token version counter.
///
/// Implementations must make `increment_token_version` atomic: two
/// concurrent increments always advance the counter by two.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Current token version of an account.
    async fn get_token_version(&self, account_id: Uuid) -> StoreResult<i64>;

    /// Increment the token version and return the new value.
    async fn increment_token_version(&self, account_id: Uuid) -> StoreResult<i64>;
}

/// Account persistence operations consumed by the auth core and handlers.
#[async_trait]
pub trait AccountStore: VersionStore {
    /// Look up an account by username or email.
    async fn get_account_by_credential(&self, field: &CredentialField) -> StoreResult<Account>;

    /// Look up an account by ID.
    async fn get_account(&self, account_id: Uuid) -> StoreResult<Account>;

    /// Create an inactive password account.
    async fn create_account_with_password(&self, params: NewPasswordAccount) -> StoreResult<Account>;

    /// Create an active federated account.
    async fn create_account_with_oauth(&self, params: NewOAuthAccount) -> StoreResult<Account>;

    /// Check whether an external identity already has a local account.
    async fn is_account_registered(&self, provider: &str, provider_id: &str) -> StoreResult<bool>;

    /// Fetch the account linked to an external identity.
    async fn login_with_oauth(&self, provider: &str, provider_id: &str) -> StoreResult<Account>;

    /// Mark an account active after email verification.
    async fn activate_account(&self, account_id: Uuid) -> StoreResult<()>;

    /// Change an account's status and return the updated account.
    async fn set_account_status(&self, account_id: Uuid, status: AccountStatus) -> StoreResult<Account>;

    /// Apply a profile edit and return the updated account.
    ///
    /// A username taken by another account violates [`USERNAME_CONSTRAINT`].
    async fn update_profile(&self, account_id: Uuid, update: ProfileUpdate) -> StoreResult<Account>;
}
