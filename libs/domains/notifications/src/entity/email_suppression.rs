use crate::models::{SuppressionEntry, SuppressionReason};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "email_suppressions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub email: String,
    pub reason: SuppressionReason,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for SuppressionEntry {
    fn from(model: Model) -> Self {
        Self {
            email: model.email,
            reason: model.reason,
            created_at: model.created_at.into(),
        }
    }
}

impl From<SuppressionEntry> for ActiveModel {
    fn from(entry: SuppressionEntry) -> Self {
        ActiveModel {
            email: Set(entry.email),
            reason: Set(entry.reason),
            created_at: Set(entry.created_at.into()),
        }
    }
}
