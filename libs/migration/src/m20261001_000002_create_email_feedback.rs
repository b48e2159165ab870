use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Append-only audit log of provider events
        manager
            .create_table(
                Table::create()
                    .table(EmailFeedback::Table)
                    .if_not_exists()
                    .col(pk_uuid(EmailFeedback::Id))
                    .col(string_len(EmailFeedback::Email, 254))
                    .col(string_len(EmailFeedback::FeedbackType, 32))
                    .col(string_len_null(EmailFeedback::EspEventId, 255))
                    .col(json_binary(EmailFeedback::RawPayload))
                    .col(
                        timestamp_with_time_zone(EmailFeedback::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_feedback_email")
                    .table(EmailFeedback::Table)
                    .col(EmailFeedback::Email)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailFeedback::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EmailFeedback {
    Table,
    Id,
    Email,
    FeedbackType,
    EspEventId,
    RawPayload,
    CreatedAt,
}
