//! Outgoing email
//!
//! Delivery is an external collaborator. [`Mailer`] is the seam; the
//! in-memory implementation records messages for tests and development.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

/// Mail delivery errors.
#[derive(Debug, Error)]
pub enum MailError {
    /// The message could not be handed to the transport.
    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

/// An HTML email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub body: String,
}

/// Trait for mail transports.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message.
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

/// Mailer that keeps every message in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl MemoryMailer {
    /// Create an empty mailer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far.
    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }

    /// Most recent message to a recipient.
    pub async fn last_to(&self, to: &str) -> Option<EmailMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|m| m.to == to)
            .cloned()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        tracing::debug!(to = %message.to, subject = %message.subject, "Recording email");
        self.sent.lock().await.push(message);
        Ok(())
    }
}
