use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::entity::{email_feedback, email_job, email_suppression};
use crate::error::NotificationResult;
use crate::models::{FeedbackRecord, Job, JobStatus, JobTransition, SuppressionEntry};
use crate::repository::{FeedbackRepository, JobRepository, SuppressionRepository};

pub struct PgJobRepository {
    db: DatabaseConnection,
}

impl PgJobRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn into_jobs(models: Vec<email_job::Model>) -> NotificationResult<Vec<Job>> {
    models.into_iter().map(Job::try_from).collect()
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn insert(&self, job: Job) -> NotificationResult<Job> {
        let active_model = email_job::ActiveModel::try_from(job)?;
        let model = active_model.insert(&self.db).await?;
        Job::try_from(model)
    }

    async fn get(&self, id: Uuid) -> NotificationResult<Option<Job>> {
        email_job::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    async fn find_eligible(&self, now: DateTime<Utc>, limit: u64) -> NotificationResult<Vec<Job>> {
        let models = email_job::Entity::find()
            .filter(email_job::Column::Status.is_in(JobStatus::CLAIMABLE))
            .filter(email_job::Column::NextAttemptAt.lte(now))
            .order_by_asc(email_job::Column::NextAttemptAt)
            .order_by_asc(email_job::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;

        into_jobs(models)
    }

    async fn find_stale(
        &self,
        claimed_before: DateTime<Utc>,
        limit: u64,
    ) -> NotificationResult<Vec<Job>> {
        let models = email_job::Entity::find()
            .filter(email_job::Column::Status.eq(JobStatus::Processing))
            .filter(email_job::Column::UpdatedAt.lt(claimed_before))
            .order_by_asc(email_job::Column::UpdatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        into_jobs(models)
    }

    async fn try_claim(
        &self,
        id: Uuid,
        expected: JobStatus,
        now: DateTime<Utc>,
    ) -> NotificationResult<bool> {
        // UPDATE email_jobs SET status = 'processing' WHERE id = ? AND status = ?
        let result = email_job::Entity::update_many()
            .set(email_job::ActiveModel {
                status: Set(JobStatus::Processing),
                updated_at: Set(now.into()),
                ..Default::default()
            })
            .filter(email_job::Column::Id.eq(id))
            .filter(email_job::Column::Status.eq(expected))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn complete(
        &self,
        id: Uuid,
        claimed_at: DateTime<Utc>,
        transition: JobTransition,
        now: DateTime<Utc>,
    ) -> NotificationResult<bool> {
        let mut changes = email_job::ActiveModel {
            status: Set(transition.status()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        match transition {
            JobTransition::Sent { attempts, metadata } => {
                changes.attempts = Set(attempts);
                changes.metadata = Set(serde_json::to_value(metadata)?);
                changes.last_error = Set(None);
            }
            JobTransition::Retry {
                attempts,
                next_attempt_at,
                error,
            } => {
                changes.attempts = Set(attempts);
                changes.next_attempt_at = Set(next_attempt_at.into());
                changes.last_error = Set(Some(error));
            }
            JobTransition::Dead { attempts, error } => {
                changes.attempts = Set(attempts);
                changes.last_error = Set(Some(error));
            }
        }

        let result = email_job::Entity::update_many()
            .set(changes)
            .filter(email_job::Column::Id.eq(id))
            .filter(email_job::Column::Status.eq(JobStatus::Processing))
            .filter(email_job::Column::UpdatedAt.eq(claimed_at))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }
}

pub struct PgSuppressionRepository {
    db: DatabaseConnection,
}

impl PgSuppressionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SuppressionRepository for PgSuppressionRepository {
    async fn find(&self, email: &str) -> NotificationResult<Option<SuppressionEntry>> {
        let model = email_suppression::Entity::find_by_id(email.to_string())
            .one(&self.db)
            .await?;

        Ok(model.map(Into::into))
    }

    async fn insert_if_absent(&self, entry: SuppressionEntry) -> NotificationResult<bool> {
        // INSERT ... ON CONFLICT (email) DO NOTHING; the first reason wins
        let active_model: email_suppression::ActiveModel = entry.into();
        let inserted = email_suppression::Entity::insert(active_model)
            .on_conflict(
                OnConflict::column(email_suppression::Column::Email)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(inserted == 1)
    }
}

pub struct PgFeedbackRepository {
    db: DatabaseConnection,
}

impl PgFeedbackRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FeedbackRepository for PgFeedbackRepository {
    async fn append(&self, record: FeedbackRecord) -> NotificationResult<()> {
        let active_model: email_feedback::ActiveModel = record.into();
        email_feedback::Entity::insert(active_model)
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn list_for(&self, email: &str) -> NotificationResult<Vec<FeedbackRecord>> {
        let models = email_feedback::Entity::find()
            .filter(email_feedback::Column::Email.eq(email))
            .order_by_asc(email_feedback::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }
}
