//! HTTP API provider (Resend-compatible `POST /emails`).

use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_or_default, env_parse, env_required};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{DeliveryError, EmailProvider, LIST_UNSUBSCRIBE_POST, OutboundEmail, SentEmail};
use crate::error::{NotificationError, NotificationResult};

#[derive(Clone)]
pub struct ResendConfig {
    pub api_key: String,
    pub from_address: String,
    pub from_name: String,
    /// Defaults to the production API
    pub api_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ResendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendConfig")
            .field("api_key", &"***")
            .field("from_address", &self.from_address)
            .field("from_name", &self.from_name)
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ResendConfig {
    pub fn new(api_key: impl Into<String>, from_address: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            from_address: from_address.into(),
            from_name: "Zerg".to_string(),
            api_url: "https://api.resend.com".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_address)
    }
}

impl FromEnv for ResendConfig {
    /// - RESEND_API_KEY: required
    /// - EMAIL_FROM_ADDRESS: required
    /// - EMAIL_FROM_NAME: defaults to "Zerg"
    /// - RESEND_API_URL, RESEND_TIMEOUT_SECS: optional overrides
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(
            env_required("RESEND_API_KEY")?,
            env_required("EMAIL_FROM_ADDRESS")?,
        );
        config.from_name = env_or_default("EMAIL_FROM_NAME", &config.from_name);
        config.api_url = env_or_default("RESEND_API_URL", &config.api_url)
            .trim_end_matches('/')
            .to_string();
        config.timeout = Duration::from_secs(env_parse("RESEND_TIMEOUT_SECS", 10u64)?);
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: String,
    to: Vec<String>,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
    headers: BTreeMap<&'static str, &'a str>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}

/// 408, 429 and 5xx are worth retrying; any other rejection is final.
pub(crate) fn classify_status(status: StatusCode, message: String) -> DeliveryError {
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        DeliveryError::Transient(format!("{status}: {message}"))
    } else {
        DeliveryError::Permanent(format!("{status}: {message}"))
    }
}

pub struct ResendProvider {
    config: ResendConfig,
    client: Client,
}

impl ResendProvider {
    pub fn new(config: ResendConfig) -> NotificationResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotificationError::Provider(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn recipient(email: &OutboundEmail) -> String {
        match &email.to_name {
            Some(name) if !name.trim().is_empty() => format!("{} <{}>", name, email.to_email),
            _ => email.to_email.clone(),
        }
    }
}

#[async_trait]
impl EmailProvider for ResendProvider {
    async fn send(&self, email: &OutboundEmail) -> Result<SentEmail, DeliveryError> {
        let mut headers = BTreeMap::new();
        let list_unsubscribe = format!("<{}>", email.unsubscribe_url);
        headers.insert("List-Unsubscribe", list_unsubscribe.as_str());
        headers.insert("List-Unsubscribe-Post", LIST_UNSUBSCRIBE_POST);

        let request = SendRequest {
            from: self.config.from_header(),
            to: vec![Self::recipient(email)],
            subject: &email.subject,
            html: &email.html_body,
            text: &email.text_body,
            headers,
        };

        debug!(subject = %email.subject, "Sending email via HTTP API");

        let response = self
            .client
            .post(format!("{}/emails", self.config.api_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP API request failed");
                DeliveryError::Transient(format!("request failed: {e}"))
            })?;

        let status = response.status();
        if status.is_success() {
            let body: SendResponse = response
                .json()
                .await
                .map_err(|e| DeliveryError::Transient(format!("unreadable response: {e}")))?;
            info!(message_id = %body.id, "Email accepted by HTTP API");
            return Ok(SentEmail {
                message_id: body.id,
            });
        }

        let raw = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&raw)
            .map(|e| e.message)
            .unwrap_or(raw);
        let err = classify_status(status, message);
        error!(%status, error = %err, "HTTP API rejected email");
        Err(err)
    }

    fn name(&self) -> &'static str {
        "resend"
    }
}
