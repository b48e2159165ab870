//! SMTP provider using lettre.
//!
//! Intended for local development against Mailpit/MailHog, but works with any
//! relay when TLS and credentials are configured.

use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_optional, env_or_default, env_parse};
use lettre::message::header::{ContentType, Header, HeaderName, HeaderValue};
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::error::Error as StdError;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{DeliveryError, EmailProvider, LIST_UNSUBSCRIBE_POST, OutboundEmail, SentEmail};
use crate::error::{NotificationError, NotificationResult};

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub from_address: String,
    pub from_name: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// false for local dev servers
    pub use_tls: bool,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("from_address", &self.from_address)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("use_tls", &self.use_tls)
            .finish()
    }
}

impl SmtpConfig {
    /// Plain-text connection to a local Mailpit/MailHog.
    pub fn local(port: u16) -> Self {
        Self {
            host: "localhost".to_string(),
            port,
            from_address: "noreply@localhost".to_string(),
            from_name: "Zerg Dev".to_string(),
            username: None,
            password: None,
            use_tls: false,
        }
    }
}

impl FromEnv for SmtpConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::local(1025);
        Ok(Self {
            host: env_or_default("SMTP_HOST", &defaults.host),
            port: env_parse("SMTP_PORT", defaults.port)?,
            from_address: env_or_default("EMAIL_FROM_ADDRESS", &defaults.from_address),
            from_name: env_or_default("EMAIL_FROM_NAME", &defaults.from_name),
            username: env_optional("SMTP_USERNAME"),
            password: env_optional("SMTP_PASSWORD"),
            use_tls: env_parse("SMTP_USE_TLS", false)?,
        })
    }
}

#[derive(Debug, Clone)]
struct ListUnsubscribe(String);

impl Header for ListUnsubscribe {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("List-Unsubscribe")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), format!("<{}>", self.0))
    }
}

#[derive(Debug, Clone)]
struct ListUnsubscribePost;

impl Header for ListUnsubscribePost {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("List-Unsubscribe-Post")
    }

    fn parse(_: &str) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Ok(Self)
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), LIST_UNSUBSCRIBE_POST.to_string())
    }
}

pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
    from: Mailbox,
}

impl SmtpProvider {
    pub fn new(config: SmtpConfig) -> NotificationResult<Self> {
        let address: Address = config
            .from_address
            .parse()
            .map_err(|e| NotificationError::Provider(format!("Invalid from address: {e}")))?;
        let from = Mailbox::new(Some(config.from_name.clone()), address);

        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| NotificationError::Provider(format!("Failed to create SMTP relay: {e}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        }
        .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            config,
            from,
        })
    }

    /// `<uuid@sender-domain>`
    fn message_id(&self) -> String {
        let domain = self.from.email.domain();
        format!("<{}@{}>", Uuid::now_v7(), domain)
    }

    fn build_message(&self, email: &OutboundEmail, message_id: &str) -> Result<Message, DeliveryError> {
        let address: Address = email
            .to_email
            .parse()
            .map_err(|e| DeliveryError::Permanent(format!("Invalid recipient address: {e}")))?;
        let to = Mailbox::new(email.to_name.clone(), address);

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .message_id(Some(message_id.to_string()))
            .header(ListUnsubscribe(email.unsubscribe_url.clone()))
            .header(ListUnsubscribePost)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| DeliveryError::Permanent(format!("Failed to build message: {e}")))
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, email: &OutboundEmail) -> Result<SentEmail, DeliveryError> {
        debug!(
            host = %self.config.host,
            port = self.config.port,
            subject = %email.subject,
            "Sending email via SMTP"
        );

        let message_id = self.message_id();
        let message = self.build_message(email, &message_id)?;

        self.transport.send(message).await.map_err(|e| {
            error!(error = %e, permanent = e.is_permanent(), "SMTP send failed");
            if e.is_permanent() {
                DeliveryError::Permanent(format!("SMTP rejected message: {e}"))
            } else {
                DeliveryError::Transient(format!("SMTP send failed: {e}"))
            }
        })?;

        info!(%message_id, "Email sent via SMTP");
        Ok(SentEmail { message_id })
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> OutboundEmail {
        OutboundEmail {
            to_email: "a@x.com".to_string(),
            to_name: Some("Ada".to_string()),
            subject: "Welcome".to_string(),
            html_body: "<p>Hi</p>".to_string(),
            text_body: "Hi".to_string(),
            unsubscribe_url: "http://localhost:8080/api/unsubscribe?email=a%40x.com".to_string(),
        }
    }

    #[test]
    fn test_from_env_defaults() {
        temp_env::with_vars(
            [
                ("SMTP_HOST", None::<&str>),
                ("SMTP_PORT", None),
                ("EMAIL_FROM_ADDRESS", None),
                ("SMTP_USE_TLS", None),
            ],
            || {
                let config = SmtpConfig::from_env().unwrap();
                assert_eq!(config.host, "localhost");
                assert_eq!(config.port, 1025);
                assert!(!config.use_tls);
            },
        );
    }

    #[test]
    fn test_invalid_from_address() {
        let mut config = SmtpConfig::local(1025);
        config.from_address = "not an address".to_string();
        assert!(SmtpProvider::new(config).is_err());
    }

    #[tokio::test]
    async fn test_message_carries_unsubscribe_headers_and_id() {
        let provider = SmtpProvider::new(SmtpConfig::local(1025)).unwrap();
        let message_id = provider.message_id();
        assert!(message_id.ends_with("@localhost>"));

        let message = provider.build_message(&email(), &message_id).unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains(
            "List-Unsubscribe: <http://localhost:8080/api/unsubscribe?email=a%40x.com>"
        ));
        assert!(formatted.contains("List-Unsubscribe-Post: List-Unsubscribe=One-Click"));
        assert!(formatted.contains(&format!("Message-ID: {message_id}")));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_permanent() {
        let provider = SmtpProvider::new(SmtpConfig::local(1025)).unwrap();
        let mut bad = email();
        bad.to_email = "nope".to_string();
        let err = provider.build_message(&bad, "<x@localhost>").unwrap_err();
        assert!(err.is_permanent());
    }
}
