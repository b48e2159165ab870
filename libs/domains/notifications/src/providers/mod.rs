//! Delivery providers.
//!
//! The worker only sees the [`EmailProvider`] trait and the two-way
//! [`DeliveryError`] taxonomy; adapters map their own failure modes onto it.

mod mock;
mod resend;
mod smtp;

pub use mock::MockProvider;
pub use resend::{ResendConfig, ResendProvider};
pub use smtp::{SmtpConfig, SmtpProvider};

use async_trait::async_trait;
use thiserror::Error;

/// Value of the `List-Unsubscribe-Post` header (RFC 8058 one-click).
pub const LIST_UNSUBSCRIBE_POST: &str = "List-Unsubscribe=One-Click";

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub to_email: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    /// Sent as `List-Unsubscribe`
    pub unsubscribe_url: String,
}

/// Provider acceptance of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Worth retrying later (rate limits, timeouts, provider outages).
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// The recipient can never be reached; the address gets suppressed.
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

impl DeliveryError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, DeliveryError::Permanent(_))
    }
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<SentEmail, DeliveryError>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}
