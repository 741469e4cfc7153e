//! Authentication handlers
//!
//! Password login and registration, email verification, the OAuth2
//! redirect and callback, token refresh and logout.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};
use zust_accounts::{AccountStatus, CredentialField, NewPasswordAccount, StoreError};
use zust_auth::{hash_password, verify_password, AuthError, AuthenticatedRequest, ConflictField};

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;
use crate::types::{AuthorizeResponse, CallbackQuery, LoginRequest, LoginResponse, RegisterRequest};

/// Message returned when the account exists but the verification email failed.
pub const REGISTERED_WITHOUT_EMAIL: &str = "Account created successfully, but failed to send verification email";

/// Handlers for `/auth/*` and `/oauth2/*`.
#[derive(Debug, Clone)]
pub struct AuthHandlers {
    state: Arc<ApiState>,
}

impl AuthHandlers {
    /// Create the handlers.
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }

    /// `POST /auth/login`
    ///
    /// The username field may hold an email address. Unknown accounts and
    /// wrong passwords get the same response.
    #[instrument(skip(self, body), fields(username = %body.username))]
    pub async fn login(&self, body: LoginRequest) -> ApiResult<LoginResponse> {
        body.validate()?;

        let identifier = body.username.trim();
        let field = if identifier.contains('@') {
            CredentialField::Email(identifier.to_string())
        } else {
            CredentialField::Username(identifier.to_string())
        };

        let account = match self.state.accounts().get_account_by_credential(&field).await {
            Ok(account) => account,
            Err(StoreError::NotFound) => {
                debug!("Login for unknown account");
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(ApiError::store("get_account_by_credential", e)),
        };

        let digest = account.password_hash.clone().ok_or(AuthError::PasswordNotSet)?;
        let password = body.password;
        let matched = tokio::task::spawn_blocking(move || verify_password(&digest, &password))
            .await
            .map_err(join_error)?;
        if !matched {
            debug!(account_id = %account.id, "Wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        // Status is checked by issue, after the password, so guessers never learn it.
        let tokens = self.state.sessions().issue(&account)?;
        info!(account_id = %account.id, "Password login");
        Ok(LoginResponse::new(&account, self.state.avatar_link(account.id), tokens))
    }

    /// `POST /auth/register`
    ///
    /// Creates an inactive account and mails its verification link.
    #[instrument(skip(self, body), fields(username = %body.username))]
    pub async fn register(&self, body: RegisterRequest) -> ApiResult<&'static str> {
        body.validate()?;

        let password = body.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(join_error)??;

        let params = NewPasswordAccount {
            email: body.email.trim().to_string(),
            username: body.username.trim().to_string(),
            password_hash,
        };
        let account = match self.state.accounts().create_account_with_password(params).await {
            Ok(account) => account,
            Err(e) => {
                return Err(match ConflictField::from_store_error(&e) {
                    Some(field) => AuthError::Conflict(field).into(),
                    None => ApiError::store("create_account_with_password", e),
                })
            }
        };
        info!(account_id = %account.id, "Account registered");

        self.state.spawn_default_assets(account.id);

        if let Err(e) = self.state.verifier().send(&account).await {
            error!(account_id = %account.id, error = %e, "Failed to send verification email");
            return Err(ApiError::new(500, REGISTERED_WITHOUT_EMAIL));
        }

        Ok("Account created successfully")
    }

    /// `GET /auth/verification?token=`
    ///
    /// Activates an inactive account. Following the link again once the
    /// account is active succeeds without changes; locked and banned
    /// accounts are never reactivated this way.
    #[instrument(skip(self, token))]
    pub async fn verify_email(&self, token: Option<&str>) -> ApiResult<&'static str> {
        let account_id = self.state.verifier().verify_token(token)?;

        let account = match self.state.accounts().get_account(account_id).await {
            Ok(account) => account,
            Err(StoreError::NotFound) => return Err(ApiError::bad_request("Account does not exist")),
            Err(e) => return Err(ApiError::store("get_account", e)),
        };

        match account.status {
            AccountStatus::Inactive => {}
            AccountStatus::Active => return Ok("Account verified successfully"),
            status => return Err(ApiError::bad_request(format!("Account is {}", status))),
        }

        match self.state.accounts().activate_account(account_id).await {
            Ok(()) => {
                info!(account_id = %account_id, "Account verified");
                Ok("Account verified successfully")
            }
            Err(StoreError::NotFound) => Err(ApiError::bad_request("Account does not exist")),
            Err(e) => Err(ApiError::store("activate_account", e)),
        }
    }

    /// `POST /auth/verification/resend?email=`
    #[instrument(skip(self))]
    pub async fn resend_verification(&self, email: Option<&str>) -> ApiResult<&'static str> {
        let email = email
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing email"))?;

        let account = match self
            .state
            .accounts()
            .get_account_by_credential(&CredentialField::Email(email.to_string()))
            .await
        {
            Ok(account) => account,
            Err(StoreError::NotFound) => {
                return Err(ApiError::bad_request("Account with this email does not exist"))
            }
            Err(e) => return Err(ApiError::store("get_account_by_credential", e)),
        };

        if account.status != AccountStatus::Inactive {
            return Err(ApiError::bad_request(format!("Account is {}", account.status)));
        }

        self.state.verifier().send(&account).await.map_err(|e| {
            error!(account_id = %account.id, error = %e, "Failed to resend verification email");
            ApiError::new(500, "Failed to send verification email")
        })?;

        Ok("Verification email sent successfully")
    }

    /// `GET /oauth2/authorize?provider=`
    pub fn oauth_authorize(&self, provider: Option<&str>) -> ApiResult<AuthorizeResponse> {
        let provider = provider.map(str::trim).unwrap_or_default();
        let url = self.state.broker().registry().authorization_url(provider)?;
        Ok(AuthorizeResponse {
            provider: provider.to_string(),
            url,
        })
    }

    /// `GET /oauth2/callback?code=&state=`
    ///
    /// `state` names the provider. The identity is logged in, or registered
    /// when seen for the first time.
    #[instrument(skip(self, query), fields(provider = ?query.state))]
    pub async fn oauth_callback(&self, query: CallbackQuery) -> ApiResult<LoginResponse> {
        let state = query.state.as_deref().unwrap_or_default();
        let code = query.code.as_deref().unwrap_or_default();

        let login = self.state.broker().handle_callback(code, state).await?;
        if login.created {
            info!(account_id = %login.account.id, "Federated account created");
        }

        let avatar = self.state.avatar_link(login.account.id);
        Ok(LoginResponse::new(&login.account, avatar, login.tokens))
    }

    /// `POST /auth/token/refresh`
    ///
    /// Burns the presented refresh token and returns a new pair.
    #[instrument(skip(self, request), fields(account_id = %request.account_id()))]
    pub async fn refresh(&self, request: AuthenticatedRequest<()>) -> ApiResult<LoginResponse> {
        let (_, claims) = request.into_parts();

        let account = match self.state.accounts().get_account(claims.subject).await {
            Ok(account) => account,
            Err(StoreError::NotFound) => return Err(AuthError::StaleVersion.into()),
            Err(e) => return Err(ApiError::store("get_account", e)),
        };
        if !account.status.is_active() {
            warn!(account_id = %account.id, status = %account.status, "Refresh for inactive account");
            return Err(AuthError::AccountNotActive.into());
        }

        let tokens = self.state.sessions().refresh(&claims).await?;
        Ok(LoginResponse::new(&account, self.state.avatar_link(account.id), tokens))
    }

    /// `POST /auth/logout`
    ///
    /// Ends every session of the account, not only the calling one.
    #[instrument(skip(self, request), fields(account_id = %request.account_id()))]
    pub async fn logout(&self, request: AuthenticatedRequest<()>) -> ApiResult<&'static str> {
        self.state.sessions().logout(&request.claims).await?;
        info!("Logged out");
        Ok("Logged out successfully")
    }
}

fn join_error(err: tokio::task::JoinError) -> ApiError {
    error!(error = %err, "Blocking password task failed");
    ApiError::internal()
}
