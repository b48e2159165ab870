#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use domain_notifications::repository::{
    InMemoryFeedbackRepository, InMemoryJobRepository, InMemorySuppressionRepository,
};
use domain_notifications::{
    EmailPipeline, EnqueueRequest, ManualClock, MockProvider, PipelineConfig, Repositories,
    TemplateEngine,
};
use serde_json::json;
use std::sync::Arc;

/// An in-memory pipeline with handles to everything a test wants to inspect.
pub struct Harness {
    pub pipeline: EmailPipeline,
    pub jobs: InMemoryJobRepository,
    pub suppressions: InMemorySuppressionRepository,
    pub feedback: InMemoryFeedbackRepository,
    pub provider: MockProvider,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_provider(config, MockProvider::new())
    }

    pub fn with_provider(config: PipelineConfig, provider: MockProvider) -> Self {
        let jobs = InMemoryJobRepository::new();
        let suppressions = InMemorySuppressionRepository::new();
        let feedback = InMemoryFeedbackRepository::new();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap(),
        ));

        let pipeline = EmailPipeline::new(
            config,
            Repositories {
                jobs: Arc::new(jobs.clone()),
                suppressions: Arc::new(suppressions.clone()),
                feedback: Arc::new(feedback.clone()),
            },
            TemplateEngine::new().unwrap(),
            Arc::new(provider.clone()),
            clock.clone(),
        );

        Self {
            pipeline,
            jobs,
            suppressions,
            feedback,
            provider,
            clock,
        }
    }
}

pub fn welcome(email: &str) -> EnqueueRequest {
    serde_json::from_value(json!({
        "email_type": "welcome",
        "recipient_email": email,
        "recipient_name": "Ada",
        "template_data": { "action_url": "https://app.example.com/start" }
    }))
    .unwrap()
}
