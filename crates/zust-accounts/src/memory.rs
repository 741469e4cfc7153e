//! In-memory account store
//!
//! Suitable for single-process deployments and testing. Every mutation runs
//! inside one write-lock critical section, which gives the same atomicity a
//! SQL backend gets from a single `UPDATE ... RETURNING` statement.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::account::{
    Account, AccountStatus, CredentialField, NewOAuthAccount, NewPasswordAccount, ProfileUpdate,
};
use crate::store::{
    AccountStore, StoreError, StoreResult, VersionStore, EMAIL_CONSTRAINT, OAUTH_CONSTRAINT,
    USERNAME_CONSTRAINT,
};

/// In-memory implementation of [`AccountStore`].
#[derive(Clone, Default)]
pub struct MemoryAccountStore {
    accounts: Arc<RwLock<HashMap<Uuid, Account>>>,
}

impl std::fmt::Debug for MemoryAccountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAccountStore").finish_non_exhaustive()
    }
}

impl MemoryAccountStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully built account, enforcing the same unique constraints
    /// as the create operations. Used to seed fixtures and admin accounts.
    pub async fn insert(&self, account: Account) -> StoreResult<Account> {
        let mut accounts = self.accounts.write().await;
        check_unique(&accounts, &account)?;
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    /// Number of stored accounts.
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

fn unique_violation(constraint: &str) -> StoreError {
    StoreError::UniqueViolation(format!(
        "duplicate key value violates unique constraint \"{}\"",
        constraint
    ))
}

// The external identity is checked first so a duplicate federated sign-up
// reports the identity conflict even when email and username also collide.
fn check_unique(accounts: &HashMap<Uuid, Account>, candidate: &Account) -> StoreResult<()> {
    if candidate.oauth.is_some() && accounts.values().any(|a| a.oauth == candidate.oauth) {
        return Err(unique_violation(OAUTH_CONSTRAINT));
    }
    for existing in accounts.values() {
        if existing.email.eq_ignore_ascii_case(&candidate.email) {
            return Err(unique_violation(EMAIL_CONSTRAINT));
        }
        if existing.username == candidate.username {
            return Err(unique_violation(USERNAME_CONSTRAINT));
        }
    }
    Ok(())
}

#[async_trait]
impl VersionStore for MemoryAccountStore {
    async fn get_token_version(&self, account_id: Uuid) -> StoreResult<i64> {
        self.accounts
            .read()
            .await
            .get(&account_id)
            .map(|a| a.token_version)
            .ok_or(StoreError::NotFound)
    }

    async fn increment_token_version(&self, account_id: Uuid) -> StoreResult<i64> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&account_id).ok_or(StoreError::NotFound)?;
        account.token_version += 1;
        account.updated_at = Utc::now();
        Ok(account.token_version)
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get_account_by_credential(&self, field: &CredentialField) -> StoreResult<Account> {
        let accounts = self.accounts.read().await;
        accounts
            .values()
            .find(|a| match field {
                CredentialField::Username(username) => &a.username == username,
                CredentialField::Email(email) => a.email.eq_ignore_ascii_case(email),
            })
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_account(&self, account_id: Uuid) -> StoreResult<Account> {
        self.accounts
            .read()
            .await
            .get(&account_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_account_with_password(&self, params: NewPasswordAccount) -> StoreResult<Account> {
        self.insert(Account::with_password(params)).await
    }

    async fn create_account_with_oauth(&self, params: NewOAuthAccount) -> StoreResult<Account> {
        self.insert(Account::with_oauth(params)).await
    }

    async fn is_account_registered(&self, provider: &str, provider_id: &str) -> StoreResult<bool> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().any(|a| {
            a.oauth
                .as_ref()
                .is_some_and(|l| l.provider == provider && l.provider_id == provider_id)
        }))
    }

    async fn login_with_oauth(&self, provider: &str, provider_id: &str) -> StoreResult<Account> {
        let accounts = self.accounts.read().await;
        accounts
            .values()
            .find(|a| {
                a.oauth
                    .as_ref()
                    .is_some_and(|l| l.provider == provider && l.provider_id == provider_id)
            })
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn activate_account(&self, account_id: Uuid) -> StoreResult<()> {
        self.set_account_status(account_id, AccountStatus::Active)
            .await
            .map(|_| ())
    }

    async fn set_account_status(&self, account_id: Uuid, status: AccountStatus) -> StoreResult<Account> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&account_id).ok_or(StoreError::NotFound)?;
        account.status = status;
        account.updated_at = Utc::now();
        tracing::debug!(account_id = %account_id, status = %status, "Account status changed");
        Ok(account.clone())
    }

    async fn update_profile(&self, account_id: Uuid, update: ProfileUpdate) -> StoreResult<Account> {
        let mut accounts = self.accounts.write().await;
        if !accounts.contains_key(&account_id) {
            return Err(StoreError::NotFound);
        }
        if let Some(username) = &update.username {
            if accounts
                .values()
                .any(|a| a.id != account_id && &a.username == username)
            {
                return Err(unique_violation(USERNAME_CONSTRAINT));
            }
        }

        let account = accounts.get_mut(&account_id).ok_or(StoreError::NotFound)?;
        if let Some(username) = update.username {
            account.username = username;
        }
        if let Some(description) = update.description {
            account.description = Some(description);
        }
        account.updated_at = Utc::now();
        Ok(account.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::OAuthLink;

    fn password_account(email: &str, username: &str) -> NewPasswordAccount {
        NewPasswordAccount {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "digest".to_string(),
        }
    }

    fn oauth_account(email: &str, username: &str, provider_id: &str) -> NewOAuthAccount {
        NewOAuthAccount {
            email: email.to_string(),
            username: username.to_string(),
            link: OAuthLink::new("github", provider_id),
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup_by_credential() {
        let store = MemoryAccountStore::new();
        let created = store
            .create_account_with_password(password_account("a@x.com", "a"))
            .await
            .unwrap();

        let by_name = store
            .get_account_by_credential(&CredentialField::Username("a".to_string()))
            .await
            .unwrap();
        let by_email = store
            .get_account_by_credential(&CredentialField::Email("A@X.com".to_string()))
            .await
            .unwrap();

        assert_eq!(by_name.id, created.id);
        assert_eq!(by_email.id, created.id);
    }

    #[tokio::test]
    async fn test_unique_constraints() {
        let store = MemoryAccountStore::new();
        store
            .create_account_with_password(password_account("a@x.com", "a"))
            .await
            .unwrap();

        let dup_email = store
            .create_account_with_password(password_account("a@x.com", "b"))
            .await
            .unwrap_err();
        assert!(dup_email.violates(EMAIL_CONSTRAINT));

        let dup_name = store
            .create_account_with_password(password_account("b@x.com", "a"))
            .await
            .unwrap_err();
        assert!(dup_name.violates(USERNAME_CONSTRAINT));

        store
            .create_account_with_oauth(oauth_account("c@x.com", "c", "7"))
            .await
            .unwrap();
        let dup_link = store
            .create_account_with_oauth(oauth_account("d@x.com", "d", "7"))
            .await
            .unwrap_err();
        assert!(dup_link.violates(OAUTH_CONSTRAINT));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_token_version_increments() {
        let store = MemoryAccountStore::new();
        let account = store
            .create_account_with_password(password_account("a@x.com", "a"))
            .await
            .unwrap();

        assert_eq!(store.get_token_version(account.id).await.unwrap(), 1);
        assert_eq!(store.increment_token_version(account.id).await.unwrap(), 2);
        assert_eq!(store.get_token_version(account.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = MemoryAccountStore::new();
        let account = store
            .create_account_with_password(password_account("a@x.com", "a"))
            .await
            .unwrap();

        let id = account.id;
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.increment_token_version(id).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get_token_version(account.id).await.unwrap(), 51);
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let store = MemoryAccountStore::new();
        let id = Uuid::now_v7();

        assert!(store.get_token_version(id).await.unwrap_err().is_not_found());
        assert!(store.increment_token_version(id).await.unwrap_err().is_not_found());
        assert!(store.activate_account(id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_oauth_registration_lookup() {
        let store = MemoryAccountStore::new();
        assert!(!store.is_account_registered("github", "7").await.unwrap());

        let created = store
            .create_account_with_oauth(oauth_account("c@x.com", "c", "7"))
            .await
            .unwrap();

        assert!(store.is_account_registered("github", "7").await.unwrap());
        assert!(!store.is_account_registered("google", "7").await.unwrap());
        assert_eq!(store.login_with_oauth("github", "7").await.unwrap().id, created.id);
    }

    #[tokio::test]
    async fn test_activate_account() {
        let store = MemoryAccountStore::new();
        let account = store
            .create_account_with_password(password_account("a@x.com", "a"))
            .await
            .unwrap();

        store.activate_account(account.id).await.unwrap();

        let reloaded = store.get_account(account.id).await.unwrap();
        assert_eq!(reloaded.status, AccountStatus::Active);
    }

    #[tokio::test]
    async fn test_update_profile() {
        let store = MemoryAccountStore::new();
        let alice = store
            .create_account_with_password(password_account("a@x.com", "alice"))
            .await
            .unwrap();
        store
            .create_account_with_password(password_account("b@x.com", "bob"))
            .await
            .unwrap();

        let err = store
            .update_profile(
                alice.id,
                ProfileUpdate {
                    username: Some("bob".to_string()),
                    description: Some("taken".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert!(err.violates(USERNAME_CONSTRAINT));
        let unchanged = store.get_account(alice.id).await.unwrap();
        assert_eq!(unchanged.username, "alice");
        assert_eq!(unchanged.description, None);

        // Keeping one's own username is not a conflict.
        let updated = store
            .update_profile(
                alice.id,
                ProfileUpdate {
                    username: Some("alice".to_string()),
                    description: Some("hello".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.description.as_deref(), Some("hello"));

        let renamed = store
            .update_profile(
                alice.id,
                ProfileUpdate {
                    username: Some("alicia".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.username, "alicia");
        assert_eq!(renamed.description.as_deref(), Some("hello"));

        let missing = store
            .update_profile(Uuid::now_v7(), ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(missing.is_not_found());
    }
}
