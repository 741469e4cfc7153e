//! # Zust Accounts
//!
//! Account model and persistence contract for the Zust backend.
//!
//! ## Overview
//!
//! The zust-accounts crate handles:
//! - **Accounts**: Password and federated accounts with lifecycle status
//! - **Roles**: Platform roles carried inside bearer tokens
//! - **Store**: The persistence traits consumed by the auth core
//! - **Memory store**: An in-process implementation (feature `memory`)
//!
//! ## Architecture
//!
//! ```text
//! Account
//!   ├─ AccountStatus (inactive | active | banned | locked)
//!   ├─ Role (user | admin)
//!   ├─ OAuthLink (provider, provider_id)   federated accounts only
//!   └─ token_version                       sole revocation mechanism
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use zust_accounts::{AccountStore, MemoryAccountStore, NewPasswordAccount, VersionStore};
//!
//! # async fn example() -> zust_accounts::StoreResult<()> {
//! let store = MemoryAccountStore::new();
//! let account = store
//!     .create_account_with_password(NewPasswordAccount {
//!         email: "a@x.com".to_string(),
//!         username: "a".to_string(),
//!         password_hash: "digest".to_string(),
//!     })
//!     .await?;
//!
//! let version = store.increment_token_version(account.id).await?;
//! assert_eq!(version, 2);
//! # Ok(())
//! # }
//! ```

pub mod account;
#[cfg(feature = "memory")]
pub mod memory;
pub mod roles;
pub mod store;

// Re-export main types for convenience
pub use account::{
    Account, AccountStatus, CredentialField, NewOAuthAccount, NewPasswordAccount, OAuthLink, Profile,
    ProfileUpdate,
};
#[cfg(feature = "memory")]
pub use memory::MemoryAccountStore;
pub use roles::Role;
pub use store::{
    AccountStore, StoreError, StoreResult, VersionStore, EMAIL_CONSTRAINT, OAUTH_CONSTRAINT,
    USERNAME_CONSTRAINT,
};
