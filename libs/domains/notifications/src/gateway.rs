//! Admission of send requests into the job store.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::clock::Clock;
use crate::config::PipelineConfig;
use crate::error::{NotificationError, NotificationResult};
use crate::models::{EmailType, EnqueueRequest, Job, JobStatus};
use crate::repository::JobRepository;
use crate::suppression::{SuppressionRegistry, normalize_email};

#[derive(Clone)]
pub struct EnqueueGateway {
    jobs: Arc<dyn JobRepository>,
    suppressions: SuppressionRegistry,
    clock: Arc<dyn Clock>,
    max_attempts: i32,
}

impl EnqueueGateway {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        suppressions: SuppressionRegistry,
        clock: Arc<dyn Clock>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            jobs,
            suppressions,
            clock,
            max_attempts: config.max_attempts,
        }
    }

    /// Validate, check the suppression list, then write a queued job.
    ///
    /// Nothing is written when validation or the suppression check fails.
    #[instrument(skip_all, fields(email_type = %request.email_type))]
    pub async fn enqueue(&self, request: EnqueueRequest) -> NotificationResult<Uuid> {
        request.validate()?;

        let email_type = EmailType::from_str(&request.email_type).map_err(|_| {
            let mut errors = validator::ValidationErrors::new();
            errors.add(
                "email_type",
                validator::ValidationError::new("unknown_email_type"),
            );
            NotificationError::Validation(errors)
        })?;

        let recipient = normalize_email(&request.recipient_email);
        if self.suppressions.is_suppressed(&recipient).await? {
            warn!(%email_type, "Rejected send to suppressed recipient");
            return Err(NotificationError::RecipientSuppressed(recipient));
        }

        let job = self.new_job(
            email_type,
            recipient,
            request.recipient_name,
            request.template_data,
            request.metadata,
            self.clock.now(),
        );
        let job = self.jobs.insert(job).await?;

        info!(job_id = %job.id, %email_type, "Email job queued");
        Ok(job.id)
    }

    /// Look up a job by id.
    pub async fn get(&self, id: Uuid) -> NotificationResult<Job> {
        self.jobs
            .get(id)
            .await?
            .ok_or(NotificationError::JobNotFound(id))
    }

    fn new_job(
        &self,
        email_type: EmailType,
        recipient_email: String,
        recipient_name: Option<String>,
        template_data: serde_json::Value,
        metadata: BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Job {
        Job {
            id: Uuid::now_v7(),
            email_type,
            recipient_email,
            recipient_name,
            template_data,
            metadata,
            status: JobStatus::Queued,
            attempts: 0,
            max_attempts: self.max_attempts,
            next_attempt_at: now,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
