//! Domain models for the email pipeline.

use chrono::{DateTime, Utc};
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Metadata key written on successful delivery.
pub const PROVIDER_MESSAGE_ID: &str = "provider_message_id";

/// Kinds of transactional email; each has its own template set.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmailType {
    #[sea_orm(string_value = "welcome")]
    Welcome,
    #[sea_orm(string_value = "password_reset")]
    PasswordReset,
    #[sea_orm(string_value = "payment_failed")]
    PaymentFailed,
    #[sea_orm(string_value = "payment_succeeded")]
    PaymentSucceeded,
    /// Someone mentioned the recipient
    #[sea_orm(string_value = "mention")]
    Mention,
    /// Someone replied to the recipient
    #[sea_orm(string_value = "reply")]
    Reply,
    #[sea_orm(string_value = "weekly_digest")]
    WeeklyDigest,
}

/// Job lifecycle:
/// `queued -> processing -> {sent | retry_scheduled | dead}`,
/// `retry_scheduled -> processing`. `sent` and `dead` are terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    #[default]
    #[sea_orm(string_value = "queued")]
    Queued,
    /// Claimed by a worker lane
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "retry_scheduled")]
    RetryScheduled,
    #[sea_orm(string_value = "dead")]
    Dead,
}

impl JobStatus {
    pub const CLAIMABLE: [JobStatus; 2] = [JobStatus::Queued, JobStatus::RetryScheduled];

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Sent | JobStatus::Dead)
    }

    pub fn is_claimable(&self) -> bool {
        Self::CLAIMABLE.contains(self)
    }
}

/// One pending, in-flight or finished send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Job {
    pub id: Uuid,
    pub email_type: EmailType,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    /// Consumed only by the template engine
    #[schema(value_type = Object)]
    pub template_data: serde_json::Value,
    pub metadata: BTreeMap<String, String>,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A state change applied to a job that is currently `processing`.
///
/// `attempts` counts provider calls, successful or not.
#[derive(Debug, Clone, PartialEq)]
pub enum JobTransition {
    Sent {
        attempts: i32,
        metadata: BTreeMap<String, String>,
    },
    Retry {
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
        error: String,
    },
    Dead {
        attempts: i32,
        error: String,
    },
}

impl JobTransition {
    pub fn status(&self) -> JobStatus {
        match self {
            JobTransition::Sent { .. } => JobStatus::Sent,
            JobTransition::Retry { .. } => JobStatus::RetryScheduled,
            JobTransition::Dead { .. } => JobStatus::Dead,
        }
    }

    /// Apply to an in-memory copy of the job.
    pub fn apply(self, job: &mut Job, now: DateTime<Utc>) {
        job.status = self.status();
        job.updated_at = now;
        match self {
            JobTransition::Sent { attempts, metadata } => {
                job.attempts = attempts;
                job.metadata = metadata;
                job.last_error = None;
            }
            JobTransition::Retry {
                attempts,
                next_attempt_at,
                error,
            } => {
                job.attempts = attempts;
                job.next_attempt_at = next_attempt_at;
                job.last_error = Some(error);
            }
            JobTransition::Dead { attempts, error } => {
                job.attempts = attempts;
                job.last_error = Some(error);
            }
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SuppressionReason {
    #[sea_orm(string_value = "user_requested")]
    UserRequested,
    #[sea_orm(string_value = "hard_bounce")]
    HardBounce,
    #[sea_orm(string_value = "spam_complaint")]
    SpamComplaint,
}

/// An address that must never be mailed again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SuppressionEntry {
    /// Lower-cased, trimmed address
    pub email: String,
    pub reason: SuppressionReason,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeedbackType {
    #[sea_orm(string_value = "bounce")]
    Bounce,
    #[sea_orm(string_value = "complaint")]
    Complaint,
    #[sea_orm(string_value = "delivered")]
    Delivered,
}

/// Append-only record of a provider event for one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub email: String,
    pub feedback_type: FeedbackType,
    pub esp_event_id: Option<String>,
    #[schema(value_type = Object)]
    pub raw_payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/emails`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct EnqueueRequest {
    /// One of the `EmailType` values
    #[validate(custom(function = "validate_email_type"))]
    #[schema(example = "welcome")]
    pub email_type: String,
    #[validate(email, length(max = 254))]
    pub recipient_email: String,
    #[validate(length(max = 255))]
    pub recipient_name: Option<String>,
    #[serde(default = "empty_object")]
    #[validate(custom(function = "validate_template_data"))]
    #[schema(value_type = Object)]
    pub template_data: serde_json::Value,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn validate_email_type(value: &str) -> Result<(), ValidationError> {
    EmailType::from_str(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("unknown_email_type"))
}

fn validate_template_data(value: &serde_json::Value) -> Result<(), ValidationError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ValidationError::new("not_an_object"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnqueueResponse {
    pub success: bool,
    pub job_id: Uuid,
}

/// Counters returned by one worker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RunStats {
    /// Jobs that reached `sent`
    pub processed: u32,
    /// Jobs rescheduled for another attempt
    pub failed: u32,
    /// Jobs dead-lettered
    pub dead: u32,
}

impl RunStats {
    pub fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Sent => self.processed += 1,
            JobStatus::RetryScheduled => self.failed += 1,
            JobStatus::Dead => self.dead += 1,
            JobStatus::Queued | JobStatus::Processing => {}
        }
    }

    pub fn merge(&mut self, other: RunStats) {
        self.processed += other.processed;
        self.failed += other.failed;
        self.dead += other.dead;
    }
}

/// Response of the worker trigger.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessResponse {
    pub success: bool,
    pub processed: u32,
    pub failed: u32,
    pub dead: u32,
}

impl From<RunStats> for ProcessResponse {
    fn from(stats: RunStats) -> Self {
        Self {
            success: true,
            processed: stats.processed,
            failed: stats.failed,
            dead: stats.dead,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> EnqueueRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_email_type_round_trips_through_strings() {
        assert_eq!(EmailType::PasswordReset.to_string(), "password_reset");
        assert_eq!(EmailType::from_str("weekly_digest").unwrap(), EmailType::WeeklyDigest);
        assert!(EmailType::from_str("newsletter").is_err());
    }

    #[test]
    fn test_job_status_classification() {
        assert!(JobStatus::Queued.is_claimable());
        assert!(JobStatus::RetryScheduled.is_claimable());
        assert!(!JobStatus::Processing.is_claimable());
        assert!(JobStatus::Sent.is_terminal());
        assert!(JobStatus::Dead.is_terminal());
        assert!(!JobStatus::RetryScheduled.is_terminal());
    }

    #[test]
    fn test_enqueue_request_defaults_template_data() {
        let req = request(json!({
            "email_type": "welcome",
            "recipient_email": "a@x.com"
        }));
        assert_eq!(req.template_data, json!({}));
        assert!(req.metadata.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_enqueue_request_field_errors() {
        let req = request(json!({
            "email_type": "newsletter",
            "recipient_email": "not-an-address",
            "template_data": [1, 2, 3]
        }));
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email_type"));
        assert!(fields.contains_key("recipient_email"));
        assert!(fields.contains_key("template_data"));
    }

    #[test]
    fn test_enqueue_request_name_length() {
        let req = request(json!({
            "email_type": "reply",
            "recipient_email": "a@x.com",
            "recipient_name": "n".repeat(256)
        }));
        assert!(req.validate().unwrap_err().field_errors().contains_key("recipient_name"));
    }

    #[test]
    fn test_run_stats_record_and_merge() {
        let mut stats = RunStats::default();
        stats.record(JobStatus::Sent);
        stats.record(JobStatus::RetryScheduled);
        stats.record(JobStatus::Dead);
        stats.record(JobStatus::Processing);

        let mut total = RunStats { processed: 2, failed: 0, dead: 1 };
        total.merge(stats);
        assert_eq!(total, RunStats { processed: 3, failed: 1, dead: 2 });
    }
}
