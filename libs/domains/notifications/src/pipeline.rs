//! Wiring of the pipeline components over one set of repositories.

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::PipelineConfig;
use crate::feedback::FeedbackIngestor;
use crate::gateway::EnqueueGateway;
use crate::postgres::{PgFeedbackRepository, PgJobRepository, PgSuppressionRepository};
use crate::providers::EmailProvider;
use crate::repository::{
    FeedbackRepository, InMemoryFeedbackRepository, InMemoryJobRepository,
    InMemorySuppressionRepository, JobRepository, SuppressionRepository,
};
use crate::suppression::SuppressionRegistry;
use crate::templates::TemplateEngine;
use crate::worker::BatchWorker;

#[derive(Clone)]
pub struct Repositories {
    pub jobs: Arc<dyn JobRepository>,
    pub suppressions: Arc<dyn SuppressionRepository>,
    pub feedback: Arc<dyn FeedbackRepository>,
}

impl Repositories {
    pub fn postgres(db: DatabaseConnection) -> Self {
        Self {
            jobs: Arc::new(PgJobRepository::new(db.clone())),
            suppressions: Arc::new(PgSuppressionRepository::new(db.clone())),
            feedback: Arc::new(PgFeedbackRepository::new(db)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            jobs: Arc::new(InMemoryJobRepository::new()),
            suppressions: Arc::new(InMemorySuppressionRepository::new()),
            feedback: Arc::new(InMemoryFeedbackRepository::new()),
        }
    }
}

/// Everything the HTTP surface needs, sharing one clock and one suppression
/// registry.
#[derive(Clone)]
pub struct EmailPipeline {
    pub gateway: EnqueueGateway,
    pub worker: BatchWorker,
    pub ingestor: FeedbackIngestor,
    pub suppressions: SuppressionRegistry,
    pub config: Arc<PipelineConfig>,
}

impl EmailPipeline {
    pub fn new(
        config: PipelineConfig,
        repositories: Repositories,
        templates: TemplateEngine,
        provider: Arc<dyn EmailProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let suppressions = SuppressionRegistry::new(repositories.suppressions, clock.clone());
        let gateway = EnqueueGateway::new(
            repositories.jobs.clone(),
            suppressions.clone(),
            clock.clone(),
            &config,
        );
        let ingestor =
            FeedbackIngestor::new(repositories.feedback, suppressions.clone(), clock.clone());
        let worker = BatchWorker::new(
            config.clone(),
            repositories.jobs,
            suppressions.clone(),
            Arc::new(templates),
            provider,
            clock,
        );

        Self {
            gateway,
            worker,
            ingestor,
            suppressions,
            config: Arc::new(config),
        }
    }
}
