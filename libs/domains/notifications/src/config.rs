//! Pipeline configuration, loaded once at startup and passed by value.

use chrono::Duration;
use core_config::{ConfigError, FromEnv, env_optional, env_or_default, env_parse, env_required};

/// Allowance for a send started just before the run deadline to finish.
/// Covers the slowest provider timeout (SMTP, 60s).
pub const IN_FLIGHT_GRACE_SECS: i64 = 120;

/// Worker and link settings for the email pipeline.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Attempt ceiling copied onto every new job
    pub max_attempts: i32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// No new claim is made this close to the deadline
    pub safety_margin: Duration,
    /// Budget for one triggered worker run
    pub max_run_duration: Duration,
    pub claim_batch_size: u64,
    pub concurrency: usize,
    /// A job left in `processing` longer than this is considered abandoned.
    /// Must outlast a whole run plus [`IN_FLIGHT_GRACE_SECS`], or a live
    /// claim could be taken over and sent twice.
    pub stale_claim_after: Duration,
    /// Base for links embedded in emails (no trailing slash)
    pub public_base_url: String,
    pub unsubscribe_redirect_url: String,
}

impl PipelineConfig {
    /// `base * 2^(attempts - 1)`, capped at `backoff_cap`.
    pub fn backoff(&self, attempts: i32) -> Duration {
        let exponent = attempts.saturating_sub(1).clamp(0, 30) as u32;
        let base = self.backoff_base.num_seconds().max(0);
        let cap = self.backoff_cap.num_seconds().max(0);
        let delay = base.saturating_mul(1i64 << exponent).min(cap);
        Duration::seconds(delay)
    }

    pub fn unsubscribe_url(&self, email: &str) -> String {
        format!(
            "{}/api/unsubscribe?email={}",
            self.public_base_url,
            urlencoding::encode(email)
        )
    }

    fn validate(self) -> Result<Self, ConfigError> {
        let invalid = |key: &str, details: &str| ConfigError::Invalid {
            key: key.to_string(),
            details: details.to_string(),
        };

        if self.max_attempts < 1 {
            return Err(invalid("EMAIL_MAX_ATTEMPTS", "must be at least 1"));
        }
        if self.backoff_cap < self.backoff_base {
            return Err(invalid(
                "EMAIL_BACKOFF_CAP_SECS",
                "must not be smaller than EMAIL_BACKOFF_BASE_SECS",
            ));
        }
        if self.concurrency == 0 {
            return Err(invalid("WORKER_CONCURRENCY", "must be at least 1"));
        }
        if self.claim_batch_size == 0 {
            return Err(invalid("WORKER_CLAIM_BATCH_SIZE", "must be at least 1"));
        }
        if self.safety_margin >= self.max_run_duration {
            return Err(invalid(
                "WORKER_SAFETY_MARGIN_SECS",
                "must be shorter than WORKER_MAX_DURATION_SECS",
            ));
        }
        if self.stale_claim_after <= self.max_run_duration + Duration::seconds(IN_FLIGHT_GRACE_SECS) {
            return Err(invalid(
                "WORKER_STALE_CLAIM_SECS",
                "must exceed WORKER_MAX_DURATION_SECS plus the in-flight grace period",
            ));
        }
        Ok(self)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::seconds(60),
            backoff_cap: Duration::seconds(3600),
            safety_margin: Duration::seconds(5),
            max_run_duration: Duration::seconds(55),
            claim_batch_size: 25,
            concurrency: 4,
            stale_claim_after: Duration::minutes(15),
            public_base_url: "http://localhost:8080".to_string(),
            unsubscribe_redirect_url: "http://localhost:8080/unsubscribed".to_string(),
        }
    }
}

fn env_secs(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    env_parse(key, default.num_seconds()).map(Duration::seconds)
}

impl FromEnv for PipelineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let public_base_url = env_or_default("PUBLIC_BASE_URL", &defaults.public_base_url)
            .trim_end_matches('/')
            .to_string();
        let unsubscribe_redirect_url =
            env_or_default("UNSUBSCRIBE_REDIRECT_URL", &format!("{public_base_url}/unsubscribed"));

        Self {
            max_attempts: env_parse("EMAIL_MAX_ATTEMPTS", defaults.max_attempts)?,
            backoff_base: env_secs("EMAIL_BACKOFF_BASE_SECS", defaults.backoff_base)?,
            backoff_cap: env_secs("EMAIL_BACKOFF_CAP_SECS", defaults.backoff_cap)?,
            safety_margin: env_secs("WORKER_SAFETY_MARGIN_SECS", defaults.safety_margin)?,
            max_run_duration: env_secs("WORKER_MAX_DURATION_SECS", defaults.max_run_duration)?,
            claim_batch_size: env_parse("WORKER_CLAIM_BATCH_SIZE", defaults.claim_batch_size)?,
            concurrency: env_parse("WORKER_CONCURRENCY", defaults.concurrency)?,
            stale_claim_after: env_secs("WORKER_STALE_CLAIM_SECS", defaults.stale_claim_after)?,
            public_base_url,
            unsubscribe_redirect_url,
        }
        .validate()
    }
}

/// Credentials for the HTTP surface.
#[derive(Clone)]
pub struct ApiConfig {
    /// Bearer secret for enqueue, inspection and the worker trigger
    pub api_secret: String,
    /// Expected `?token=` on webhook calls, when set
    pub webhook_token: Option<String>,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_secret", &"***")
            .field("webhook_token", &self.webhook_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl FromEnv for ApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_secret = env_required("EMAIL_API_SECRET")?;
        if api_secret.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "EMAIL_API_SECRET".to_string(),
                details: "must not be empty".to_string(),
            });
        }

        Ok(Self {
            api_secret,
            webhook_token: env_optional("WEBHOOK_TOKEN"),
        })
    }
}
