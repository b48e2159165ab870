use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmailJobs::Table)
                    .if_not_exists()
                    .col(pk_uuid(EmailJobs::Id))
                    .col(string_len(EmailJobs::EmailType, 32))
                    .col(string_len(EmailJobs::RecipientEmail, 254))
                    .col(string_len_null(EmailJobs::RecipientName, 255))
                    .col(json_binary(EmailJobs::TemplateData))
                    .col(json_binary(EmailJobs::Metadata))
                    .col(
                        ColumnDef::new(EmailJobs::Status)
                            .string_len(32)
                            .not_null()
                            .default("queued"),
                    )
                    .col(integer(EmailJobs::Attempts).default(0))
                    .col(integer(EmailJobs::MaxAttempts))
                    .col(timestamp_with_time_zone(EmailJobs::NextAttemptAt))
                    .col(text_null(EmailJobs::LastError))
                    .col(
                        timestamp_with_time_zone(EmailJobs::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(EmailJobs::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Claim scan: status IN (..) AND next_attempt_at <= now ORDER BY next_attempt_at
        manager
            .create_index(
                Index::create()
                    .name("idx_email_jobs_status_next_attempt_at")
                    .table(EmailJobs::Table)
                    .col(EmailJobs::Status)
                    .col(EmailJobs::NextAttemptAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_jobs_recipient_email")
                    .table(EmailJobs::Table)
                    .col(EmailJobs::RecipientEmail)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EmailJobs {
    Table,
    Id,
    EmailType,
    RecipientEmail,
    RecipientName,
    TemplateData,
    Metadata,
    Status,
    Attempts,
    MaxAttempts,
    NextAttemptAt,
    LastError,
    CreatedAt,
    UpdatedAt,
}
