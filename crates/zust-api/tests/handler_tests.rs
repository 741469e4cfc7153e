//! End-to-end tests for the auth and account handlers.
//!
//! Handlers run against the in-memory store, mailer and media store.
//! wiremock plays the GitHub endpoints and the avatar host.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zust_accounts::{
    Account, AccountStatus, AccountStore, CredentialField, MemoryAccountStore, NewOAuthAccount,
    NewPasswordAccount, OAuthLink, ProfileUpdate, Role, StoreError, StoreResult, VersionStore,
};
use zust_api::{
    AccountAssets, AccountHandlers, ApiError, ApiResponse, ApiState, AuthHandlers, CallbackQuery,
    EditProfileRequest, EmailMessage, LoginRequest, MailError, Mailer, MediaHandlers, MediaKind,
    MediaStore, MemoryMailer, MemoryMediaStore, RegisterRequest, REGISTERED_WITHOUT_EMAIL,
};
use zust_auth::{AuthConfig, OAuthConfig, OAuthProvider, ProviderRegistry, REFRESH_PATH};

const SECRET: &str = "handler-test-secret-with-enough-length";

struct Harness {
    state: Arc<ApiState>,
    store: MemoryAccountStore,
    mailer: MemoryMailer,
    auth: AuthHandlers,
    accounts: AccountHandlers,
}

fn harness() -> Harness {
    let store = MemoryAccountStore::new();
    let mailer = MemoryMailer::new();
    let state = ApiState::new(AuthConfig::new(SECRET), Arc::new(store.clone()), Arc::new(mailer.clone())).unwrap();
    build(state, store, mailer)
}

fn build(state: ApiState, store: MemoryAccountStore, mailer: MemoryMailer) -> Harness {
    let state = Arc::new(state);
    Harness {
        auth: AuthHandlers::new(state.clone()),
        accounts: AccountHandlers::new(state.clone()),
        state,
        store,
        mailer,
    }
}

async fn seed(store: &MemoryAccountStore, username: &str, role: Role) -> Account {
    let mut account = Account::with_oauth(NewOAuthAccount {
        email: format!("{}@example.com", username),
        username: username.to_string(),
        link: OAuthLink::new("github", format!("id-{}", username)),
    });
    account.role = role;
    store.insert(account).await.unwrap()
}

fn login_body(username: &str, password: &str) -> LoginRequest {
    serde_json::from_value(json!({ "username": username, "password": password })).unwrap()
}

fn register_body(email: &str, username: &str, password: &str) -> RegisterRequest {
    serde_json::from_value(json!({ "email": email, "username": username, "password": password })).unwrap()
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

fn token_from(message: &EmailMessage) -> String {
    message
        .body
        .split("token=")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap()
        .to_string()
}

// =============================================================================
// Registration and password login
// =============================================================================

#[tokio::test]
async fn test_register_verify_then_login() {
    let h = harness();

    let message = h.auth.register(register_body("a@x.com", "a", "pw")).await.unwrap();
    assert_eq!(message, "Account created successfully");

    let err = h.auth.login(login_body("a", "pw")).await.unwrap_err();
    assert_eq!(err, ApiError::forbidden("Account is not active"));

    let mail = h.mailer.last_to("a@x.com").await.unwrap();
    let token = token_from(&mail);
    assert_eq!(
        h.auth.verify_email(Some(&token)).await.unwrap(),
        "Account verified successfully"
    );
    // Following the link twice is harmless
    assert!(h.auth.verify_email(Some(&token)).await.is_ok());

    let login = h.auth.login(login_body("a", "pw")).await.unwrap();
    assert_eq!(login.username, "a");
    assert_eq!(login.token_type, "Bearer");
    assert!(login.avatar.starts_with("http://localhost:8080/media/"));

    let claims = h
        .state
        .authenticate((), "/auth/logout", Some(&bearer(&login.access_token)))
        .await
        .unwrap();
    assert_eq!(claims.account_id(), login.id);

    // Email works in the username field
    let by_email = h.auth.login(login_body("a@x.com", "pw")).await.unwrap();
    assert_eq!(by_email.id, login.id);

    let wrong = h.auth.login(login_body("a", "nope")).await.unwrap_err();
    let unknown = h.auth.login(login_body("ghost", "pw")).await.unwrap_err();
    assert_eq!(wrong, unknown);
    assert_eq!(wrong.message, "Invalid username or password");
}

#[tokio::test]
async fn test_register_rejects_taken_email_and_bad_bodies() {
    let h = harness();
    h.auth.register(register_body("a@x.com", "a", "pw")).await.unwrap();

    let err = h.auth.register(register_body("A@x.com", "b", "pw")).await.unwrap_err();
    assert_eq!(err, ApiError::bad_request("Email is already taken"));

    let err = h.auth.register(register_body("a@x", "c", "pw")).await.unwrap_err();
    assert_eq!(err, ApiError::invalid_body());
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn test_register_rejects_username_with_at_sign() {
    let h = harness();

    let err = h.auth.register(register_body("bob@x.com", "bob@home", "pw")).await.unwrap_err();

    assert_eq!(err, ApiError::invalid_body());
    assert!(h.store.is_empty().await);
    assert!(h.mailer.sent().await.is_empty());
}

struct BrokenMailer;

#[async_trait]
impl Mailer for BrokenMailer {
    async fn send(&self, _message: EmailMessage) -> Result<(), MailError> {
        Err(MailError::Delivery("smtp: connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_register_keeps_account_when_mail_fails() {
    let store = MemoryAccountStore::new();
    let state = ApiState::new(AuthConfig::new(SECRET), Arc::new(store.clone()), Arc::new(BrokenMailer)).unwrap();
    let auth = AuthHandlers::new(Arc::new(state));

    let err = auth.register(register_body("a@x.com", "a", "pw")).await.unwrap_err();

    assert_eq!(err, ApiError::new(500, REGISTERED_WITHOUT_EMAIL));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_inactive_account_with_wrong_password_gets_credential_error() {
    let h = harness();
    h.auth.register(register_body("a@x.com", "a", "pw")).await.unwrap();

    let err = h.auth.login(login_body("a", "nope")).await.unwrap_err();

    assert_eq!(err.status, 400);
    assert_eq!(err.message, "Invalid username or password");
}

#[tokio::test]
async fn test_oauth_account_cannot_use_password_login() {
    let h = harness();
    seed(&h.store, "octo", Role::User).await;

    let response = ApiResponse::from_result(h.auth.login(login_body("octo", "pw")).await);

    assert_eq!(response.status, 400);
    assert_eq!(
        response.message(),
        Some("Account does not have a password, please login with OAuth provider")
    );
}

// =============================================================================
// Verification resend
// =============================================================================

#[tokio::test]
async fn test_resend_verification() {
    let h = harness();
    let active = seed(&h.store, "octo", Role::User).await;

    let err = h.auth.resend_verification(None).await.unwrap_err();
    assert_eq!(err, ApiError::bad_request("Missing email"));

    let err = h.auth.resend_verification(Some("nobody@x.com")).await.unwrap_err();
    assert_eq!(err, ApiError::bad_request("Account with this email does not exist"));

    let err = h.auth.resend_verification(Some(&active.email)).await.unwrap_err();
    assert_eq!(err, ApiError::bad_request("Account is active"));

    h.auth.register(register_body("a@x.com", "a", "pw")).await.unwrap();
    let sent = h.auth.resend_verification(Some("a@x.com")).await.unwrap();
    assert_eq!(sent, "Verification email sent successfully");
    assert_eq!(h.mailer.sent().await.len(), 2);
}

#[tokio::test]
async fn test_verification_cannot_reactivate_banned_account() {
    let h = harness();
    h.auth.register(register_body("a@x.com", "a", "pw")).await.unwrap();
    let token = token_from(&h.mailer.last_to("a@x.com").await.unwrap());

    let account = h.store.get_account_by_credential(&zust_accounts::CredentialField::Email("a@x.com".into())).await.unwrap();
    h.store.set_account_status(account.id, AccountStatus::Banned).await.unwrap();

    let err = h.auth.verify_email(Some(&token)).await.unwrap_err();
    assert_eq!(err, ApiError::bad_request("Account is banned"));
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_logout_invalidates_outstanding_tokens() {
    let h = harness();
    let account = seed(&h.store, "octo", Role::User).await;
    let pair = h.state.sessions().issue(&account).unwrap();
    let header = bearer(&pair.access_token);

    let request = h.state.authenticate((), "/auth/logout", Some(&header)).await.unwrap();
    assert_eq!(h.auth.logout(request).await.unwrap(), "Logged out successfully");

    let err = h.state.authenticate((), "/auth/logout", Some(&header)).await.unwrap_err();
    assert_eq!(err.status, 401);
    assert_eq!(err.message, "Invalid access token: token version is not valid");
}

#[tokio::test]
async fn test_refresh_rotation_and_kind_policy() {
    let h = harness();
    let account = seed(&h.store, "octo", Role::User).await;
    let pair = h.state.sessions().issue(&account).unwrap();

    // Each token kind is only accepted on its own endpoint
    let err = h
        .state
        .authenticate((), REFRESH_PATH, Some(&bearer(&pair.access_token)))
        .await
        .unwrap_err();
    assert_eq!(err.status, 400);
    let err = h
        .state
        .authenticate((), "/accounts/x/lock", Some(&bearer(&pair.refresh_token)))
        .await
        .unwrap_err();
    assert_eq!(err.status, 400);

    let request = h
        .state
        .authenticate((), REFRESH_PATH, Some(&bearer(&pair.refresh_token)))
        .await
        .unwrap();
    let refreshed = h.auth.refresh(request).await.unwrap();

    assert!(h
        .state
        .authenticate((), "/auth/logout", Some(&bearer(&refreshed.access_token)))
        .await
        .is_ok());

    let err = h
        .state
        .authenticate((), REFRESH_PATH, Some(&bearer(&pair.refresh_token)))
        .await
        .unwrap_err();
    assert_eq!(err.status, 401);
}

#[tokio::test]
async fn test_missing_bearer_header() {
    let h = harness();

    let err = h.state.authenticate((), "/auth/logout", None).await.unwrap_err();
    assert_eq!(err, ApiError::new(401, "Missing request header"));

    let err = h.state.authenticate((), "/auth/logout", Some("Basic abc")).await.unwrap_err();
    assert_eq!(err.status, 401);
}

// =============================================================================
// Account status
// =============================================================================

#[tokio::test]
async fn test_get_profile() {
    let h = harness();
    let account = seed(&h.store, "octo", Role::User).await;

    let profile = h.accounts.get_profile(&account.id.to_string()).await.unwrap();
    assert_eq!(profile.username, "octo");

    let err = h.accounts.get_profile("not-a-uuid").await.unwrap_err();
    assert_eq!(err, ApiError::bad_request("Invalid account ID"));

    let err = h.accounts.get_profile(&uuid::Uuid::now_v7().to_string()).await.unwrap_err();
    assert_eq!(err, ApiError::not_found("Account not found"));

    h.store.set_account_status(account.id, AccountStatus::Locked).await.unwrap();
    let err = h.accounts.get_profile(&account.id.to_string()).await.unwrap_err();
    assert_eq!(err, ApiError::forbidden("Account is not active"));
}

#[tokio::test]
async fn test_lock_is_self_only_and_ends_sessions() {
    let h = harness();
    let owner = seed(&h.store, "owner", Role::User).await;
    let other = seed(&h.store, "other", Role::User).await;
    let header = bearer(&h.state.sessions().issue(&owner).unwrap().access_token);

    let request = h.state.authenticate((), "/accounts/x/lock", Some(&header)).await.unwrap();
    let err = h.accounts.lock(request, &other.id.to_string()).await.unwrap_err();
    assert_eq!(err, ApiError::bad_request("Account ID not match with the ID from access token"));

    let request = h.state.authenticate((), "/accounts/x/lock", Some(&header)).await.unwrap();
    let message = h.accounts.lock(request, &owner.id.to_string()).await.unwrap();
    assert_eq!(message, format!("Account with ID {} locked successfully", owner.id));

    assert_eq!(h.store.get_account(owner.id).await.unwrap().status, AccountStatus::Locked);
    let err = h.state.authenticate((), "/auth/logout", Some(&header)).await.unwrap_err();
    assert_eq!(err.status, 401);
}

#[tokio::test]
async fn test_unlock_and_ban_require_admin() {
    let h = harness();
    let admin = seed(&h.store, "admin", Role::Admin).await;
    let user = seed(&h.store, "user", Role::User).await;
    let admin_header = bearer(&h.state.sessions().issue(&admin).unwrap().access_token);
    let user_header = bearer(&h.state.sessions().issue(&user).unwrap().access_token);

    let request = h.state.authenticate((), "/accounts/x/ban", Some(&user_header)).await.unwrap();
    let err = h.accounts.ban(request, &admin.id.to_string()).await.unwrap_err();
    assert_eq!(err.status, 403);

    // Unlock only applies to locked accounts
    let request = h.state.authenticate((), "/accounts/x/unlock", Some(&admin_header)).await.unwrap();
    let err = h.accounts.unlock(request, &user.id.to_string()).await.unwrap_err();
    assert_eq!(err, ApiError::bad_request("Account is active"));

    let request = h.state.authenticate((), "/accounts/x/ban", Some(&admin_header)).await.unwrap();
    h.accounts.ban(request, &user.id.to_string()).await.unwrap();
    assert_eq!(h.store.get_account(user.id).await.unwrap().status, AccountStatus::Banned);

    let err = h.state.authenticate((), "/auth/logout", Some(&user_header)).await.unwrap_err();
    assert_eq!(err.status, 401);

    let login = h.state.sessions().issue(&h.store.get_account(user.id).await.unwrap());
    assert!(login.is_err());
}

#[tokio::test]
async fn test_admin_unlocks_locked_account() {
    let h = harness();
    let admin = seed(&h.store, "admin", Role::Admin).await;
    let user = seed(&h.store, "user", Role::User).await;
    h.store.set_account_status(user.id, AccountStatus::Locked).await.unwrap();
    let header = bearer(&h.state.sessions().issue(&admin).unwrap().access_token);

    let request = h.state.authenticate((), "/accounts/x/unlock", Some(&header)).await.unwrap();
    let message = h.accounts.unlock(request, &user.id.to_string()).await.unwrap();

    assert_eq!(message, format!("Account with ID {} unlocked successfully", user.id));
    assert!(h.store.get_account(user.id).await.unwrap().status.is_active());
}

/// Memory store whose token version and status writes can be made to fail.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryAccountStore,
    fail_increment: AtomicBool,
    fail_status: AtomicBool,
}

fn outage() -> StoreError {
    StoreError::Backend("connection reset by peer".to_string())
}

#[async_trait]
impl VersionStore for FlakyStore {
    async fn get_token_version(&self, account_id: Uuid) -> StoreResult<i64> {
        self.inner.get_token_version(account_id).await
    }

    async fn increment_token_version(&self, account_id: Uuid) -> StoreResult<i64> {
        if self.fail_increment.load(Ordering::SeqCst) {
            return Err(outage());
        }
        self.inner.increment_token_version(account_id).await
    }
}

#[async_trait]
impl AccountStore for FlakyStore {
    async fn get_account_by_credential(&self, field: &CredentialField) -> StoreResult<Account> {
        self.inner.get_account_by_credential(field).await
    }

    async fn get_account(&self, account_id: Uuid) -> StoreResult<Account> {
        self.inner.get_account(account_id).await
    }

    async fn create_account_with_password(&self, params: NewPasswordAccount) -> StoreResult<Account> {
        self.inner.create_account_with_password(params).await
    }

    async fn create_account_with_oauth(&self, params: NewOAuthAccount) -> StoreResult<Account> {
        self.inner.create_account_with_oauth(params).await
    }

    async fn is_account_registered(&self, provider: &str, provider_id: &str) -> StoreResult<bool> {
        self.inner.is_account_registered(provider, provider_id).await
    }

    async fn login_with_oauth(&self, provider: &str, provider_id: &str) -> StoreResult<Account> {
        self.inner.login_with_oauth(provider, provider_id).await
    }

    async fn activate_account(&self, account_id: Uuid) -> StoreResult<()> {
        self.inner.activate_account(account_id).await
    }

    async fn set_account_status(&self, account_id: Uuid, status: AccountStatus) -> StoreResult<Account> {
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(outage());
        }
        self.inner.set_account_status(account_id, status).await
    }

    async fn update_profile(&self, account_id: Uuid, update: ProfileUpdate) -> StoreResult<Account> {
        self.inner.update_profile(account_id, update).await
    }
}

fn flaky_state(store: &Arc<FlakyStore>) -> Arc<ApiState> {
    Arc::new(ApiState::new(AuthConfig::new(SECRET), store.clone(), Arc::new(MemoryMailer::new())).unwrap())
}

#[tokio::test]
async fn test_lock_leaves_account_untouched_when_sessions_cannot_be_ended() {
    let store = Arc::new(FlakyStore::default());
    let owner = seed(&store.inner, "owner", Role::User).await;
    let state = flaky_state(&store);
    let accounts = AccountHandlers::new(state.clone());
    let header = bearer(&state.sessions().issue(&owner).unwrap().access_token);

    store.fail_increment.store(true, Ordering::SeqCst);
    let request = state.authenticate((), "/accounts/x/lock", Some(&header)).await.unwrap();
    let err = accounts.lock(request, &owner.id.to_string()).await.unwrap_err();

    assert_eq!(err, ApiError::internal());
    assert_eq!(store.inner.get_account(owner.id).await.unwrap().status, AccountStatus::Active);
    assert!(state.authenticate((), "/auth/logout", Some(&header)).await.is_ok());
}

#[tokio::test]
async fn test_failed_status_write_still_ends_sessions() {
    let store = Arc::new(FlakyStore::default());
    let owner = seed(&store.inner, "owner", Role::User).await;
    let admin = seed(&store.inner, "admin", Role::Admin).await;
    let user = seed(&store.inner, "user", Role::User).await;
    let state = flaky_state(&store);
    let accounts = AccountHandlers::new(state.clone());
    let owner_header = bearer(&state.sessions().issue(&owner).unwrap().access_token);
    let admin_header = bearer(&state.sessions().issue(&admin).unwrap().access_token);
    let user_header = bearer(&state.sessions().issue(&user).unwrap().access_token);

    store.fail_status.store(true, Ordering::SeqCst);

    let request = state.authenticate((), "/accounts/x/lock", Some(&owner_header)).await.unwrap();
    let err = accounts.lock(request, &owner.id.to_string()).await.unwrap_err();
    assert_eq!(err, ApiError::internal());
    let err = state.authenticate((), "/auth/logout", Some(&owner_header)).await.unwrap_err();
    assert_eq!(err.status, 401);

    let request = state.authenticate((), "/accounts/x/ban", Some(&admin_header)).await.unwrap();
    let err = accounts.ban(request, &user.id.to_string()).await.unwrap_err();
    assert_eq!(err, ApiError::internal());
    let err = state.authenticate((), "/auth/logout", Some(&user_header)).await.unwrap_err();
    assert_eq!(err.status, 401);
}

#[tokio::test]
async fn test_ban_keeps_status_when_sessions_cannot_be_ended() {
    let store = Arc::new(FlakyStore::default());
    let admin = seed(&store.inner, "admin", Role::Admin).await;
    let user = seed(&store.inner, "user", Role::User).await;
    let state = flaky_state(&store);
    let accounts = AccountHandlers::new(state.clone());
    let admin_header = bearer(&state.sessions().issue(&admin).unwrap().access_token);

    store.fail_increment.store(true, Ordering::SeqCst);
    let request = state.authenticate((), "/accounts/x/ban", Some(&admin_header)).await.unwrap();
    let err = accounts.ban(request, &user.id.to_string()).await.unwrap_err();

    assert_eq!(err, ApiError::internal());
    assert_eq!(store.inner.get_account(user.id).await.unwrap().status, AccountStatus::Active);
}

// =============================================================================
// Profile edits and media
// =============================================================================

fn media_harness(media: &MemoryMediaStore) -> Harness {
    let store = MemoryAccountStore::new();
    let mailer = MemoryMailer::new();
    let state = ApiState::new(AuthConfig::new(SECRET), Arc::new(store.clone()), Arc::new(mailer.clone()))
        .unwrap()
        .with_media(Arc::new(media.clone()));
    build(state, store, mailer)
}

fn edit_body(username: &str, description: &str) -> EditProfileRequest {
    EditProfileRequest {
        username: Some(username.to_string()),
        description: Some(description.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_edit_profile_updates_fields_and_media() {
    let media = MemoryMediaStore::new();
    let h = media_harness(&media);
    let owner = seed(&h.store, "owner", Role::User).await;
    let header = bearer(&h.state.sessions().issue(&owner).unwrap().access_token);

    let request = h.state.authenticate((), "/accounts/x", Some(&header)).await.unwrap();
    let body = EditProfileRequest {
        avatar: Some(b"new-avatar".to_vec()),
        ..edit_body("renamed", "hello")
    };
    let profile = h.accounts.edit_profile(request, &owner.id.to_string(), body).await.unwrap();

    assert_eq!(profile.username, "renamed");
    assert_eq!(profile.description.as_deref(), Some("hello"));
    assert_eq!(
        media.get(&MediaKind::Avatar.key(owner.id)).await.unwrap(),
        Some(b"new-avatar".to_vec())
    );
    assert_eq!(media.get(&MediaKind::Cover.key(owner.id)).await.unwrap(), None);

    // Empty fields keep what is stored
    let request = h.state.authenticate((), "/accounts/x", Some(&header)).await.unwrap();
    let profile = h
        .accounts
        .edit_profile(request, &owner.id.to_string(), edit_body("", ""))
        .await
        .unwrap();
    assert_eq!(profile.username, "renamed");
    assert_eq!(profile.description.as_deref(), Some("hello"));
}

#[tokio::test]
async fn test_edit_profile_is_owner_only_and_reports_taken_username() {
    let media = MemoryMediaStore::new();
    let h = media_harness(&media);
    let owner = seed(&h.store, "owner", Role::User).await;
    let other = seed(&h.store, "other", Role::User).await;
    let header = bearer(&h.state.sessions().issue(&owner).unwrap().access_token);

    let request = h.state.authenticate((), "/accounts/x", Some(&header)).await.unwrap();
    let err = h
        .accounts
        .edit_profile(request, &other.id.to_string(), edit_body("hijacked", ""))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::bad_request("Account ID not match with the ID from access token"));
    assert_eq!(h.store.get_account(other.id).await.unwrap().username, "other");

    let request = h.state.authenticate((), "/accounts/x", Some(&header)).await.unwrap();
    let body = EditProfileRequest {
        cover: Some(b"cover".to_vec()),
        ..edit_body("other", "")
    };
    let response = ApiResponse::from_result(h.accounts.edit_profile(request, &owner.id.to_string(), body).await);
    assert_eq!(response.status, 409);
    assert_eq!(response.message(), Some("Username is already taken"));
    assert!(media.is_empty().await);

    let request = h.state.authenticate((), "/accounts/x", Some(&header)).await.unwrap();
    let body = EditProfileRequest {
        avatar: Some(Vec::new()),
        ..Default::default()
    };
    let err = h.accounts.edit_profile(request, &owner.id.to_string(), body).await.unwrap_err();
    assert_eq!(err, ApiError::bad_request("Invalid avatar file"));
}

#[tokio::test]
async fn test_edit_profile_requires_active_account() {
    let media = MemoryMediaStore::new();
    let h = media_harness(&media);
    let owner = seed(&h.store, "owner", Role::User).await;
    let header = bearer(&h.state.sessions().issue(&owner).unwrap().access_token);
    let request = h.state.authenticate((), "/accounts/x", Some(&header)).await.unwrap();
    h.store.set_account_status(owner.id, AccountStatus::Locked).await.unwrap();

    let err = h
        .accounts
        .edit_profile(request, &owner.id.to_string(), edit_body("renamed", ""))
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::forbidden("Account is not active"));
    assert_eq!(h.store.get_account(owner.id).await.unwrap().username, "owner");
}

#[tokio::test]
async fn test_get_media_serves_linked_files() {
    let media = MemoryMediaStore::new();
    let h = media_harness(&media);
    let handlers = MediaHandlers::new(h.state.clone());
    let owner = seed(&h.store, "owner", Role::User).await;
    let link = h.state.avatar_link(owner.id);
    let opaque = link.rsplit('/').next().unwrap();

    let err = handlers.get_media(opaque).await.unwrap_err();
    assert_eq!(err, ApiError::not_found("Media not found"));

    media.put(&MediaKind::Avatar.key(owner.id), b"avatar".to_vec()).await.unwrap();
    let file = handlers.get_media(opaque).await.unwrap();
    assert_eq!(file.content_type, "image/png");
    assert_eq!(file.bytes, b"avatar".to_vec());

    let err = handlers.get_media("not%20an%20id").await.unwrap_err();
    assert_eq!(err, ApiError::bad_request("Invalid media ID"));
}

// =============================================================================
// OAuth
// =============================================================================

async fn mount_github(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "gho_abc",
            "token_type": "bearer"
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 583231,
            "login": "octocat",
            "avatar_url": format!("{}/avatars/583231", server.uri()),
            "email": "octocat@github.com"
        })))
        .mount(server)
        .await;
}

fn oauth_harness(server: &MockServer, media: &MemoryMediaStore) -> Harness {
    let store = MemoryAccountStore::new();
    let mailer = MemoryMailer::new();

    let mut registry = ProviderRegistry::new();
    registry
        .register_configured(
            OAuthConfig::new(
                OAuthProvider::GitHub,
                "gh-id",
                "gh-secret",
                "http://localhost:8080/oauth2/callback",
            )
            .with_base_url(&server.uri()),
        )
        .unwrap();
    let assets = AccountAssets::new(Arc::new(media.clone()), b"default-avatar".to_vec(), b"default-cover".to_vec()).unwrap();

    let state = ApiState::new(AuthConfig::new(SECRET), Arc::new(store.clone()), Arc::new(mailer.clone()))
        .unwrap()
        .with_registry(registry)
        .with_assets(Arc::new(assets));
    build(state, store, mailer)
}

fn callback(code: Option<&str>, state: Option<&str>) -> CallbackQuery {
    CallbackQuery {
        code: code.map(str::to_string),
        state: state.map(str::to_string),
    }
}

async fn wait_for_media(media: &MemoryMediaStore, key: &str, expected: &[u8]) -> bool {
    for _ in 0..100 {
        if media.get(key).await.unwrap().as_deref() == Some(expected) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_oauth_callback_registers_once_and_downloads_avatar() {
    let server = MockServer::start().await;
    mount_github(&server).await;
    Mock::given(method("GET"))
        .and(path("/avatars/583231"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"octocat-png".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    let media = MemoryMediaStore::new();
    let h = oauth_harness(&server, &media);

    let first = h.auth.oauth_callback(callback(Some("code-1"), Some("github"))).await.unwrap();
    let second = h.auth.oauth_callback(callback(Some("code-2"), Some("github"))).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.username, "octocat");
    assert_eq!(h.store.len().await, 1);
    assert!(h.store.get_account(first.id).await.unwrap().status.is_active());

    let avatar_key = MediaKind::Avatar.key(first.id);
    assert!(wait_for_media(&media, &avatar_key, b"octocat-png").await);
    assert_eq!(
        media.get(&MediaKind::Cover.key(first.id)).await.unwrap().as_deref(),
        Some(&b"default-cover"[..])
    );
}

#[tokio::test]
async fn test_oauth_callback_keeps_default_avatar_when_download_fails() {
    let server = MockServer::start().await;
    mount_github(&server).await;
    Mock::given(method("GET"))
        .and(path("/avatars/583231"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let media = MemoryMediaStore::new();
    let h = oauth_harness(&server, &media);

    let login = h.auth.oauth_callback(callback(Some("code-1"), Some("github"))).await.unwrap();

    let avatar_key = MediaKind::Avatar.key(login.id);
    assert!(wait_for_media(&media, &avatar_key, b"default-avatar").await);
}

#[tokio::test]
async fn test_oauth_callback_errors() {
    let server = MockServer::start().await;
    let media = MemoryMediaStore::new();
    let h = oauth_harness(&server, &media);

    let err = h.auth.oauth_callback(callback(Some("code"), Some("gitlab"))).await.unwrap_err();
    assert_eq!(err, ApiError::bad_request("Unknown provider"));

    let err = h.auth.oauth_callback(callback(None, Some("github"))).await.unwrap_err();
    assert_eq!(err, ApiError::bad_request("Missing authorization code"));

    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "bad_verification_code" })))
        .mount(&server)
        .await;
    let err = h.auth.oauth_callback(callback(Some("stale"), Some("github"))).await.unwrap_err();
    assert_eq!(err, ApiError::new(500, "Failed to exchange token"));
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_oauth_authorize_builds_provider_url() {
    let server = MockServer::start().await;
    let media = MemoryMediaStore::new();
    let h = oauth_harness(&server, &media);

    let response = h.auth.oauth_authorize(Some("github")).unwrap();
    assert_eq!(response.provider, "github");
    assert!(response.url.starts_with(&format!("{}/login/oauth/authorize", server.uri())));
    assert!(response.url.contains("client_id=gh-id"));
    assert!(response.url.contains("state=github"));

    let err = h.auth.oauth_authorize(None).unwrap_err();
    assert_eq!(err, ApiError::bad_request("Unknown provider"));
}
