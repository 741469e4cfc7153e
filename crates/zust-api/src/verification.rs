//! Email verification links
//!
//! New password accounts start inactive. The link mailed at registration
//! carries a signed verification token valid for 24 hours; following it
//! activates the account.

use std::sync::Arc;

use tracing::{debug, instrument, warn};
use uuid::Uuid;
use zust_accounts::Account;
use zust_auth::{AuthConfig, AuthError, AuthResult, TokenCodec};

use crate::error::{ApiError, ApiResult};
use crate::mailer::{EmailMessage, Mailer};

/// Subject line of verification emails.
pub const VERIFICATION_SUBJECT: &str = "Zust - Verify your email";

/// Path of the verification endpoint.
pub const VERIFICATION_PATH: &str = "/auth/verification";

/// Builds, sends and checks verification links.
#[derive(Clone)]
pub struct EmailVerifier {
    codec: Arc<TokenCodec>,
    mailer: Arc<dyn Mailer>,
    endpoint: String,
}

impl std::fmt::Debug for EmailVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailVerifier")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl EmailVerifier {
    /// Create a verifier whose links point at the configured public URL.
    pub fn new(codec: Arc<TokenCodec>, mailer: Arc<dyn Mailer>, config: &AuthConfig) -> Self {
        Self {
            codec,
            mailer,
            endpoint: config.url(VERIFICATION_PATH),
        }
    }

    /// Build the verification link for an account.
    pub fn link(&self, account_id: Uuid) -> AuthResult<String> {
        let token = self.codec.issue_verification(account_id)?;
        Ok(format!("{}?token={}", self.endpoint, token))
    }

    /// Mail a verification link to the account's address.
    #[instrument(skip(self, account), fields(account_id = %account.id))]
    pub async fn send(&self, account: &Account) -> AuthResult<()> {
        let link = self.link(account.id)?;
        let message = EmailMessage {
            to: account.email.clone(),
            subject: VERIFICATION_SUBJECT.to_string(),
            body: render_body(&account.username, &link),
        };

        self.mailer.send(message).await.map_err(|e| {
            warn!(error = %e, "Verification email not sent");
            AuthError::Internal(e.to_string())
        })?;
        debug!("Verification email sent");
        Ok(())
    }

    /// Check a verification token and return the account it names.
    pub fn verify_token(&self, token: Option<&str>) -> ApiResult<Uuid> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing token"))?;

        self.codec.parse_verification(token).map_err(|e| match e {
            AuthError::TokenExpired => ApiError::bad_request("Token has expired"),
            other => {
                debug!(error = %other, "Rejected verification token");
                ApiError::bad_request("Invalid token")
            }
        })
    }
}

fn render_body(username: &str, link: &str) -> String {
    format!(
        "<html><body>\
         <p>Hi {username},</p>\
         <p>Thanks for signing up for Zust. Please confirm your email address to activate your account:</p>\
         <p><a href=\"{link}\">Verify my email</a></p>\
         <p>This link expires in 24 hours.</p>\
         </body></html>",
        username = escape_html(username),
        link = escape_html(link),
    )
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
