use crate::error::NotificationError;
use crate::models::{EmailType, Job, JobStatus};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "email_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub email_type: EmailType,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub template_data: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_attempt_at: DateTimeWithTimeZone,
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Job {
    type Error = NotificationError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            email_type: model.email_type,
            recipient_email: model.recipient_email,
            recipient_name: model.recipient_name,
            template_data: model.template_data,
            metadata: serde_json::from_value(model.metadata)?,
            status: model.status,
            attempts: model.attempts,
            max_attempts: model.max_attempts,
            next_attempt_at: model.next_attempt_at.into(),
            last_error: model.last_error,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }
}

impl TryFrom<Job> for ActiveModel {
    type Error = NotificationError;

    fn try_from(job: Job) -> Result<Self, Self::Error> {
        Ok(ActiveModel {
            id: Set(job.id),
            email_type: Set(job.email_type),
            recipient_email: Set(job.recipient_email),
            recipient_name: Set(job.recipient_name),
            template_data: Set(job.template_data),
            metadata: Set(serde_json::to_value(job.metadata)?),
            status: Set(job.status),
            attempts: Set(job.attempts),
            max_attempts: Set(job.max_attempts),
            next_attempt_at: Set(job.next_attempt_at.into()),
            last_error: Set(job.last_error),
            created_at: Set(job.created_at.into()),
            updated_at: Set(job.updated_at.into()),
        })
    }
}
