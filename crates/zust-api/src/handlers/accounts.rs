//! Account handlers
//!
//! Profile lookup, profile edits and status changes. Locking and banning end
//! every session of the target account before its status changes, so a
//! failed status write never leaves sessions alive.

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;
use zust_accounts::{Account, AccountStatus, Profile, ProfileUpdate, StoreError, USERNAME_CONSTRAINT};
use zust_auth::{AuthError, AuthenticatedRequest};

use crate::assets::MediaKind;
use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;
use crate::types::EditProfileRequest;

/// Handlers for `/accounts/{id}` and its status routes.
#[derive(Debug, Clone)]
pub struct AccountHandlers {
    state: Arc<ApiState>,
}

impl AccountHandlers {
    /// Create the handlers.
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }

    /// `GET /accounts/{id}`
    #[instrument(skip(self))]
    pub async fn get_profile(&self, id: &str) -> ApiResult<Profile> {
        let account = self.load(parse_id(id)?).await?;
        if !account.status.is_active() {
            return Err(AuthError::AccountNotActive.into());
        }
        Ok(account.profile())
    }

    /// `PUT /accounts/{id}`
    ///
    /// Only the owner of an active account may edit it. Empty fields keep
    /// their stored values. Images replace the account's avatar or cover
    /// after the profile row is updated.
    #[instrument(skip(self, request, body), fields(caller = %request.account_id()))]
    pub async fn edit_profile(
        &self,
        request: AuthenticatedRequest<()>,
        id: &str,
        body: EditProfileRequest,
    ) -> ApiResult<Profile> {
        let account_id = owned_id(&request, id)?;
        let account = self.load(account_id).await?;
        if !account.status.is_active() {
            return Err(AuthError::AccountNotActive.into());
        }
        body.validate()?;

        let update = body.profile_update();
        let account = if update.is_empty() {
            account
        } else {
            match self.state.accounts().update_profile(account_id, update).await {
                Ok(account) => account,
                Err(e) if e.violates(USERNAME_CONSTRAINT) => {
                    return Err(ApiError::conflict("Username is already taken"));
                }
                Err(StoreError::NotFound) => return Err(ApiError::not_found("Account not found")),
                Err(e) => return Err(ApiError::store("update_profile", e)),
            }
        };

        if let Some(avatar) = body.avatar {
            self.state.put_media(account_id, MediaKind::Avatar, avatar).await?;
        }
        if let Some(cover) = body.cover {
            self.state.put_media(account_id, MediaKind::Cover, cover).await?;
        }

        info!(account_id = %account_id, "Profile updated");
        Ok(account.profile())
    }

    /// `POST /accounts/{id}/lock`
    ///
    /// Only the owner may lock an account, and only while it is active.
    #[instrument(skip(self, request), fields(caller = %request.account_id()))]
    pub async fn lock(&self, request: AuthenticatedRequest<()>, id: &str) -> ApiResult<String> {
        let account_id = owned_id(&request, id)?;
        let account = self.load(account_id).await?;
        if !account.status.is_active() {
            return Err(AuthError::AccountNotActive.into());
        }

        self.state.sessions().invalidate(account_id).await?;
        self.set_status(account_id, AccountStatus::Locked).await?;
        info!(account_id = %account_id, "Account locked");
        Ok(format!("Account with ID {} locked successfully", account_id))
    }

    /// `POST /accounts/{id}/unlock` (admin)
    #[instrument(skip(self, request), fields(caller = %request.account_id()))]
    pub async fn unlock(&self, request: AuthenticatedRequest<()>, id: &str) -> ApiResult<String> {
        require_admin(&request)?;
        let account_id = parse_id(id)?;

        let account = self.load(account_id).await?;
        if account.status != AccountStatus::Locked {
            return Err(ApiError::bad_request(format!("Account is {}", account.status)));
        }

        self.set_status(account_id, AccountStatus::Active).await?;
        info!(account_id = %account_id, "Account unlocked");
        Ok(format!("Account with ID {} unlocked successfully", account_id))
    }

    /// `POST /accounts/{id}/ban` (admin)
    #[instrument(skip(self, request), fields(caller = %request.account_id()))]
    pub async fn ban(&self, request: AuthenticatedRequest<()>, id: &str) -> ApiResult<String> {
        require_admin(&request)?;
        let account_id = parse_id(id)?;

        let account = self.load(account_id).await?;
        if account.status == AccountStatus::Banned {
            return Err(ApiError::bad_request("Account is banned"));
        }

        self.state.sessions().invalidate(account_id).await?;
        self.set_status(account_id, AccountStatus::Banned).await?;
        info!(account_id = %account_id, "Account banned");
        Ok(format!("Account with ID {} banned successfully", account_id))
    }

    async fn load(&self, account_id: Uuid) -> ApiResult<Account> {
        match self.state.accounts().get_account(account_id).await {
            Ok(account) => Ok(account),
            Err(StoreError::NotFound) => Err(ApiError::not_found("Account not found")),
            Err(e) => Err(ApiError::store("get_account", e)),
        }
    }

    async fn set_status(&self, account_id: Uuid, status: AccountStatus) -> ApiResult<Account> {
        match self.state.accounts().set_account_status(account_id, status).await {
            Ok(account) => Ok(account),
            Err(StoreError::NotFound) => Err(ApiError::not_found("Account not found")),
            Err(e) => Err(ApiError::store("set_account_status", e)),
        }
    }
}

fn parse_id(id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id.trim()).map_err(|_| ApiError::bad_request("Invalid account ID"))
}

fn owned_id<R>(request: &AuthenticatedRequest<R>, id: &str) -> ApiResult<Uuid> {
    let account_id = parse_id(id)?;
    if account_id != request.account_id() {
        return Err(ApiError::bad_request(
            "Account ID not match with the ID from access token",
        ));
    }
    Ok(account_id)
}

fn require_admin<R>(request: &AuthenticatedRequest<R>) -> ApiResult<()> {
    if request.role().is_admin() {
        Ok(())
    } else {
        Err(AuthError::Forbidden("Admin role required".to_string()).into())
    }
}
