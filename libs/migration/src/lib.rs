pub use sea_orm_migration::prelude::*;

mod m20261001_000000_create_email_jobs;
mod m20261001_000001_create_email_suppressions;
mod m20261001_000002_create_email_feedback;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000000_create_email_jobs::Migration),
            Box::new(m20261001_000001_create_email_suppressions::Migration),
            Box::new(m20261001_000002_create_email_feedback::Migration),
        ]
    }
}
