use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One row per lower-cased address; inserts use ON CONFLICT (email) DO NOTHING
        manager
            .create_table(
                Table::create()
                    .table(EmailSuppressions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailSuppressions::Email)
                            .string_len(254)
                            .not_null()
                            .primary_key(),
                    )
                    .col(string_len(EmailSuppressions::Reason, 32))
                    .col(
                        timestamp_with_time_zone(EmailSuppressions::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailSuppressions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EmailSuppressions {
    Table,
    Email,
    Reason,
    CreatedAt,
}
