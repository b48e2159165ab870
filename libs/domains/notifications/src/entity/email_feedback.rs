use crate::models::{FeedbackRecord, FeedbackType};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "email_feedback")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub email: String,
    pub feedback_type: FeedbackType,
    pub esp_event_id: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub raw_payload: Json,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for FeedbackRecord {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            feedback_type: model.feedback_type,
            esp_event_id: model.esp_event_id,
            raw_payload: model.raw_payload,
            created_at: model.created_at.into(),
        }
    }
}

impl From<FeedbackRecord> for ActiveModel {
    fn from(record: FeedbackRecord) -> Self {
        ActiveModel {
            id: Set(record.id),
            email: Set(record.email),
            feedback_type: Set(record.feedback_type),
            esp_event_id: Set(record.esp_event_id),
            raw_payload: Set(record.raw_payload),
            created_at: Set(record.created_at.into()),
        }
    }
}
