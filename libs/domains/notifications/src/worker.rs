//! Deadline-bounded batch worker.
//!
//! A run first requeues jobs abandoned in `processing` by a crashed run, then
//! drains eligible jobs on `concurrency` lanes until nothing is due or the
//! deadline minus the safety margin is reached. Ownership of a job comes only
//! from the compare-and-swap claim, so overlapping runs are safe.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::clock::Clock;
use crate::config::PipelineConfig;
use crate::error::NotificationResult;
use crate::models::{Job, JobStatus, JobTransition, PROVIDER_MESSAGE_ID, RunStats, SuppressionReason};
use crate::providers::{DeliveryError, EmailProvider, OutboundEmail};
use crate::repository::JobRepository;
use crate::suppression::SuppressionRegistry;
use crate::templates::{Recipient, TemplateEngine};

pub const SUPPRESSED_ERROR: &str = "recipient suppressed";

/// Result of one delivery attempt, before it is persisted.
struct Attempt {
    transition: JobTransition,
    suppress: Option<SuppressionReason>,
}

impl From<JobTransition> for Attempt {
    fn from(transition: JobTransition) -> Self {
        Self {
            transition,
            suppress: None,
        }
    }
}

#[derive(Clone)]
pub struct BatchWorker {
    jobs: Arc<dyn JobRepository>,
    suppressions: SuppressionRegistry,
    templates: Arc<TemplateEngine>,
    provider: Arc<dyn EmailProvider>,
    clock: Arc<dyn Clock>,
    config: Arc<PipelineConfig>,
}

impl BatchWorker {
    pub fn new(
        config: PipelineConfig,
        jobs: Arc<dyn JobRepository>,
        suppressions: SuppressionRegistry,
        templates: Arc<TemplateEngine>,
        provider: Arc<dyn EmailProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            jobs,
            suppressions,
            templates,
            provider,
            clock,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run with a deadline `budget` from now.
    pub async fn run_for(&self, budget: Duration) -> RunStats {
        self.run(self.clock.now() + budget).await
    }

    /// Drain eligible jobs until none are due or `deadline - safety_margin`.
    ///
    /// Never fails: repository errors end the affected lane and are logged.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn run(&self, deadline: DateTime<Utc>) -> RunStats {
        let started = self.clock.now();
        self.recover_stale().await;

        let cutoff = deadline - self.config.safety_margin;
        let mut lanes = JoinSet::new();
        for lane in 0..self.config.concurrency.max(1) {
            let worker = self.clone();
            lanes.spawn(async move { worker.run_lane(lane, cutoff).await });
        }

        let mut stats = RunStats::default();
        while let Some(result) = lanes.join_next().await {
            match result {
                Ok(lane_stats) => stats.merge(lane_stats),
                Err(e) => error!(error = %e, "Worker lane panicked"),
            }
        }

        info!(
            processed = stats.processed,
            failed = stats.failed,
            dead = stats.dead,
            elapsed_ms = (self.clock.now() - started).num_milliseconds(),
            "Worker run finished"
        );
        stats
    }

    async fn run_lane(&self, lane: usize, cutoff: DateTime<Utc>) -> RunStats {
        let mut stats = RunStats::default();

        while self.clock.now() < cutoff {
            let job = match self.claim_next(cutoff).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(e) => {
                    error!(lane, error = %e, "Claim failed, stopping lane");
                    break;
                }
            };

            match self.process(job).await {
                Ok(Some(status)) => stats.record(status),
                Ok(None) => {}
                Err(e) => {
                    error!(lane, error = %e, "Failed to store job result, stopping lane");
                    break;
                }
            }
        }

        debug!(lane, ?stats, "Lane finished");
        stats
    }

    /// Claim the oldest due job, moving past candidates other lanes won.
    async fn claim_next(&self, cutoff: DateTime<Utc>) -> NotificationResult<Option<Job>> {
        let batch = self.config.claim_batch_size.max(1);

        loop {
            let now = self.clock.now();
            if now >= cutoff {
                return Ok(None);
            }

            let candidates = self.jobs.find_eligible(now, batch).await?;
            let exhausted = (candidates.len() as u64) < batch;

            for mut job in candidates {
                if self.jobs.try_claim(job.id, job.status, now).await? {
                    job.status = JobStatus::Processing;
                    job.updated_at = now;
                    return Ok(Some(job));
                }
                debug!(job_id = %job.id, "Lost claim race");
            }

            if exhausted {
                return Ok(None);
            }
        }
    }

    /// Attempt delivery of a claimed job and store the outcome.
    ///
    /// Returns the stored status, or `None` if the job had already left
    /// `processing` and the result was discarded.
    #[instrument(skip_all, fields(job_id = %job.id, email_type = %job.email_type, attempts = job.attempts))]
    async fn process(&self, job: Job) -> NotificationResult<Option<JobStatus>> {
        let attempt = self.attempt(&job).await;
        let status = attempt.transition.status();

        if let JobTransition::Retry { error, .. } | JobTransition::Dead { error, .. } =
            &attempt.transition
        {
            warn!(%status, error = %error, "Delivery attempt failed");
        }

        let stored = self
            .jobs
            .complete(job.id, job.updated_at, attempt.transition, self.clock.now())
            .await?;
        if !stored {
            warn!("Claim lost before completion, result discarded");
            return Ok(None);
        }

        if let Some(reason) = attempt.suppress {
            if let Err(e) = self.suppressions.suppress(&job.recipient_email, reason).await {
                error!(error = %e, "Failed to suppress recipient after permanent failure");
            }
        }

        Ok(Some(status))
    }

    async fn attempt(&self, job: &Job) -> Attempt {
        match self.suppressions.is_suppressed(&job.recipient_email).await {
            Ok(false) => {}
            Ok(true) => {
                return JobTransition::Dead {
                    attempts: job.attempts,
                    error: SUPPRESSED_ERROR.to_string(),
                }
                .into();
            }
            Err(e) => {
                return JobTransition::Retry {
                    attempts: job.attempts,
                    next_attempt_at: self.clock.now() + self.config.backoff(job.attempts.max(1)),
                    error: format!("suppression lookup failed: {e}"),
                }
                .into();
            }
        }

        let unsubscribe_url = self.config.unsubscribe_url(&job.recipient_email);
        let recipient = Recipient {
            email: &job.recipient_email,
            name: job.recipient_name.as_deref(),
            unsubscribe_url: &unsubscribe_url,
        };
        let rendered = match self.templates.render(job.email_type, &job.template_data, recipient) {
            Ok(rendered) => rendered,
            Err(e) => {
                return JobTransition::Dead {
                    attempts: job.attempts,
                    error: e.to_string(),
                }
                .into();
            }
        };

        let email = OutboundEmail {
            to_email: job.recipient_email.clone(),
            to_name: job.recipient_name.clone(),
            subject: rendered.subject,
            html_body: rendered.html,
            text_body: rendered.text,
            unsubscribe_url,
        };

        match self.provider.send(&email).await {
            Ok(sent) => {
                let mut metadata = job.metadata.clone();
                metadata.insert(PROVIDER_MESSAGE_ID.to_string(), sent.message_id);
                JobTransition::Sent {
                    attempts: job.attempts + 1,
                    metadata,
                }
                .into()
            }
            Err(DeliveryError::Transient(message)) => {
                self.failed_attempt(job, message, |attempts| {
                    self.clock.now() + self.config.backoff(attempts)
                })
                .into()
            }
            Err(DeliveryError::Permanent(message)) => Attempt {
                transition: JobTransition::Dead {
                    attempts: job.attempts + 1,
                    error: message,
                },
                suppress: Some(SuppressionReason::HardBounce),
            },
        }
    }

    /// Count a failed attempt: dead once the ceiling is reached, otherwise
    /// rescheduled at `next_attempt(attempts)`.
    fn failed_attempt(
        &self,
        job: &Job,
        error: String,
        next_attempt: impl FnOnce(i32) -> DateTime<Utc>,
    ) -> JobTransition {
        let attempts = job.attempts + 1;
        if attempts >= job.max_attempts {
            JobTransition::Dead { attempts, error }
        } else {
            JobTransition::Retry {
                attempts,
                next_attempt_at: next_attempt(attempts),
                error,
            }
        }
    }

    /// Requeue jobs whose claim outlived `stale_claim_after`.
    async fn recover_stale(&self) {
        let batch = self.config.claim_batch_size.max(1);

        loop {
            let now = self.clock.now();
            let stale = match self.jobs.find_stale(now - self.config.stale_claim_after, batch).await {
                Ok(stale) => stale,
                Err(e) => {
                    error!(error = %e, "Stale claim lookup failed");
                    return;
                }
            };
            let exhausted = (stale.len() as u64) < batch;

            for job in stale {
                let transition = self.failed_attempt(
                    &job,
                    "claim expired before the attempt completed".to_string(),
                    |_| now,
                );
                let status = transition.status();
                match self.jobs.complete(job.id, job.updated_at, transition, now).await {
                    Ok(true) => warn!(job_id = %job.id, %status, "Recovered stale claim"),
                    Ok(false) => debug!(job_id = %job.id, "Stale job already moved on"),
                    Err(e) => {
                        error!(job_id = %job.id, error = %e, "Failed to recover stale claim");
                        return;
                    }
                }
            }

            if exhausted {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::NotificationError;
    use crate::models::EmailType;
    use crate::providers::{MockProvider, SentEmail};
    use crate::repository::{
        InMemoryJobRepository, InMemorySuppressionRepository, MockJobRepository,
        MockSuppressionRepository, SuppressionRepository,
    };
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use uuid::Uuid;

    /// Holds the first send until released; later sends go straight through.
    #[derive(Default)]
    struct GatedProvider {
        calls: AtomicUsize,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl EmailProvider for GatedProvider {
        async fn send(&self, _email: &OutboundEmail) -> Result<SentEmail, DeliveryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(SentEmail {
                message_id: format!("gated-{call}"),
            })
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    struct Fixture {
        worker: BatchWorker,
        jobs: InMemoryJobRepository,
        suppressions: SuppressionRegistry,
        provider: MockProvider,
        clock: Arc<ManualClock>,
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            max_attempts: 3,
            concurrency: 2,
            ..PipelineConfig::default()
        }
    }

    fn fixture_with(suppression_repo: Arc<dyn SuppressionRepository>) -> Fixture {
        let jobs = InMemoryJobRepository::new();
        let clock = Arc::new(ManualClock::default());
        let suppressions = SuppressionRegistry::new(suppression_repo, clock.clone());
        let provider = MockProvider::new();
        let worker = BatchWorker::new(
            config(),
            Arc::new(jobs.clone()),
            suppressions.clone(),
            Arc::new(TemplateEngine::new().unwrap()),
            Arc::new(provider.clone()),
            clock.clone(),
        );
        Fixture {
            worker,
            jobs,
            suppressions,
            provider,
            clock,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(InMemorySuppressionRepository::new()))
    }

    fn gated_fixture(config: PipelineConfig) -> (Fixture, Arc<GatedProvider>) {
        let f = fixture();
        let gate = Arc::new(GatedProvider::default());
        let worker = BatchWorker::new(
            config,
            Arc::new(f.jobs.clone()),
            f.suppressions.clone(),
            Arc::new(TemplateEngine::new().unwrap()),
            gate.clone(),
            f.clock.clone(),
        );
        (Fixture { worker, ..f }, gate)
    }

    async fn seed(f: &Fixture, email: &str) -> Job {
        let now = f.clock.now();
        f.jobs
            .insert(Job {
                id: Uuid::now_v7(),
                email_type: EmailType::Welcome,
                recipient_email: email.to_string(),
                recipient_name: Some("Ada".to_string()),
                template_data: serde_json::json!({}),
                metadata: BTreeMap::from([("user_id".to_string(), "7".to_string())]),
                status: JobStatus::Queued,
                attempts: 0,
                max_attempts: 3,
                next_attempt_at: now,
                last_error: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
    }

    async fn reload(f: &Fixture, job: &Job) -> Job {
        f.jobs.get(job.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_success_marks_sent_with_message_id() {
        let f = fixture();
        let job = seed(&f, "a@x.com").await;

        let stats = f.worker.run_for(Duration::seconds(55)).await;
        assert_eq!(stats, RunStats { processed: 1, failed: 0, dead: 0 });

        let job = reload(&f, &job).await;
        assert_eq!(job.status, JobStatus::Sent);
        assert_eq!(job.attempts, 1);
        assert!(job.metadata[PROVIDER_MESSAGE_ID].starts_with("mock-"));
        assert_eq!(job.metadata["user_id"], "7");

        let sent = f.provider.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].unsubscribe_url.ends_with("/api/unsubscribe?email=a%40x.com"));
    }

    #[tokio::test]
    async fn test_transient_failure_schedules_backoff() {
        let f = fixture();
        let job = seed(&f, "a@x.com").await;
        f.provider.script([Err(DeliveryError::Transient("429".to_string()))]);

        let stats = f.worker.run_for(Duration::seconds(55)).await;
        assert_eq!(stats.failed, 1);

        let job = reload(&f, &job).await;
        assert_eq!(job.status, JobStatus::RetryScheduled);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.next_attempt_at, f.clock.now() + Duration::seconds(60));
        assert_eq!(job.last_error.as_deref(), Some("429"));
    }

    #[tokio::test]
    async fn test_retry_not_claimed_before_due() {
        let f = fixture();
        seed(&f, "a@x.com").await;
        f.provider.script([Err(DeliveryError::Transient("503".to_string()))]);
        f.worker.run_for(Duration::seconds(55)).await;

        f.clock.advance(Duration::seconds(30));
        assert_eq!(f.worker.run_for(Duration::seconds(55)).await, RunStats::default());

        f.clock.advance(Duration::seconds(30));
        assert_eq!(f.worker.run_for(Duration::seconds(55)).await.processed, 1);
        assert_eq!(f.provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_dead_and_suppressed() {
        let f = fixture();
        let job = seed(&f, "a@x.com").await;
        f.provider.script([Err(DeliveryError::Permanent("550 no such user".to_string()))]);

        let stats = f.worker.run_for(Duration::seconds(55)).await;
        assert_eq!(stats.dead, 1);

        let job = reload(&f, &job).await;
        assert_eq!(job.status, JobStatus::Dead);
        assert_eq!(job.attempts, 1);
        let entry = f.suppressions.get("a@x.com").await.unwrap().unwrap();
        assert_eq!(entry.reason, SuppressionReason::HardBounce);
    }

    #[tokio::test]
    async fn test_suppressed_recipient_dead_without_send() {
        let f = fixture();
        let job = seed(&f, "a@x.com").await;
        f.suppressions
            .suppress("a@x.com", SuppressionReason::SpamComplaint)
            .await
            .unwrap();

        let stats = f.worker.run_for(Duration::seconds(55)).await;
        assert_eq!(stats.dead, 1);
        assert_eq!(f.provider.call_count(), 0);

        let job = reload(&f, &job).await;
        assert_eq!(job.last_error.as_deref(), Some(SUPPRESSED_ERROR));
        assert_eq!(job.attempts, 0);
    }

    #[tokio::test]
    async fn test_suppression_lookup_failure_releases_job() {
        let mut repo = MockSuppressionRepository::new();
        repo.expect_find()
            .returning(|_| Err(NotificationError::Config("suppression store offline".to_string())));
        let f = fixture_with(Arc::new(repo));
        let job = seed(&f, "a@x.com").await;

        let stats = f.worker.run_for(Duration::seconds(55)).await;
        assert_eq!(stats.failed, 1);
        assert_eq!(f.provider.call_count(), 0);

        let job = reload(&f, &job).await;
        assert_eq!(job.status, JobStatus::RetryScheduled);
        assert_eq!(job.attempts, 0);
        assert!(job.next_attempt_at > f.clock.now());
    }

    #[tokio::test]
    async fn test_render_failure_dead_without_suppression() {
        let jobs = InMemoryJobRepository::new();
        let clock = Arc::new(ManualClock::default());
        let suppressions =
            SuppressionRegistry::new(Arc::new(InMemorySuppressionRepository::new()), clock.clone());
        let provider = MockProvider::new();
        let mut templates = TemplateEngine::new().unwrap();
        templates
            .register(EmailType::Welcome, "Hi", "{{> missing}}", "Hi")
            .unwrap();
        let worker = BatchWorker::new(
            config(),
            Arc::new(jobs.clone()),
            suppressions.clone(),
            Arc::new(templates),
            Arc::new(provider.clone()),
            clock.clone(),
        );
        let f = Fixture {
            worker,
            jobs,
            suppressions,
            provider,
            clock,
        };
        let job = seed(&f, "a@x.com").await;

        assert_eq!(f.worker.run_for(Duration::seconds(55)).await.dead, 1);
        assert_eq!(f.provider.call_count(), 0);
        assert_eq!(reload(&f, &job).await.status, JobStatus::Dead);
        assert!(!f.suppressions.is_suppressed("a@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_no_claims_inside_safety_margin() {
        let f = fixture();
        let job = seed(&f, "a@x.com").await;

        let stats = f.worker.run_for(Duration::seconds(5)).await;
        assert_eq!(stats, RunStats::default());
        assert_eq!(reload(&f, &job).await.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_stale_claim_is_requeued() {
        let f = fixture();
        let job = seed(&f, "a@x.com").await;
        f.jobs
            .try_claim(job.id, JobStatus::Queued, f.clock.now())
            .await
            .unwrap();
        f.clock.advance(Duration::minutes(16));

        let stats = f.worker.run_for(Duration::seconds(55)).await;
        // recovery is not counted; the job is picked up again in the same run
        assert_eq!(stats, RunStats { processed: 1, failed: 0, dead: 0 });

        // one attempt for the abandoned claim, one for the send
        let job = reload(&f, &job).await;
        assert_eq!(job.status, JobStatus::Sent);
        assert_eq!(job.attempts, 2);
    }

    #[tokio::test]
    async fn test_fresh_claim_is_left_alone() {
        let f = fixture();
        let job = seed(&f, "a@x.com").await;
        f.jobs
            .try_claim(job.id, JobStatus::Queued, f.clock.now())
            .await
            .unwrap();

        assert_eq!(f.worker.run_for(Duration::seconds(55)).await, RunStats::default());
        assert_eq!(reload(&f, &job).await.status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_overlapping_run_leaves_in_flight_claim_alone() {
        let (f, gate) = gated_fixture(config());
        let job = seed(&f, "a@x.com").await;

        let first = f.worker.clone();
        let run_a = tokio::spawn(async move { first.run_for(Duration::seconds(55)).await });
        gate.entered.notified().await;

        f.clock.advance(Duration::seconds(20));
        assert_eq!(f.worker.run_for(Duration::seconds(55)).await, RunStats::default());

        gate.release.notify_one();
        assert_eq!(run_a.await.unwrap().processed, 1);
        assert_eq!(gate.calls.load(Ordering::SeqCst), 1);

        let job = reload(&f, &job).await;
        assert_eq!(job.status, JobStatus::Sent);
        assert_eq!(job.metadata[PROVIDER_MESSAGE_ID], "gated-0");
    }

    #[tokio::test]
    async fn test_superseded_claim_cannot_overwrite_result() {
        let (f, gate) = gated_fixture(PipelineConfig {
            stale_claim_after: Duration::seconds(10),
            ..config()
        });
        let job = seed(&f, "a@x.com").await;

        let first = f.worker.clone();
        let run_a = tokio::spawn(async move { first.run_for(Duration::seconds(55)).await });
        gate.entered.notified().await;

        f.clock.advance(Duration::seconds(20));
        assert_eq!(f.worker.run_for(Duration::seconds(55)).await.processed, 1);

        gate.release.notify_one();
        assert_eq!(run_a.await.unwrap(), RunStats::default());

        let job = reload(&f, &job).await;
        assert_eq!(job.status, JobStatus::Sent);
        assert_eq!(job.metadata[PROVIDER_MESSAGE_ID], "gated-1");
        assert_eq!(job.attempts, 2);
    }

    #[tokio::test]
    async fn test_repository_failure_ends_run_quietly() {
        let mut jobs = MockJobRepository::new();
        jobs.expect_find_stale().returning(|_, _| Ok(Vec::new()));
        jobs.expect_find_eligible()
            .returning(|_, _| Err(NotificationError::Database(sea_orm::DbErr::Custom("down".into()))));

        let clock = Arc::new(ManualClock::default());
        let provider = MockProvider::new();
        let worker = BatchWorker::new(
            config(),
            Arc::new(jobs),
            SuppressionRegistry::new(Arc::new(InMemorySuppressionRepository::new()), clock.clone()),
            Arc::new(TemplateEngine::new().unwrap()),
            Arc::new(provider.clone()),
            clock,
        );

        assert_eq!(worker.run_for(Duration::seconds(55)).await, RunStats::default());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_lost_complete_is_not_counted() {
        let mut jobs = MockJobRepository::new();
        let clock = Arc::new(ManualClock::default());
        let now = clock.now();
        let job = Job {
            id: Uuid::now_v7(),
            email_type: EmailType::Reply,
            recipient_email: "a@x.com".to_string(),
            recipient_name: None,
            template_data: serde_json::json!({}),
            metadata: BTreeMap::new(),
            status: JobStatus::Queued,
            attempts: 0,
            max_attempts: 3,
            next_attempt_at: now,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        jobs.expect_find_stale().returning(|_, _| Ok(Vec::new()));
        let mut served = false;
        jobs.expect_find_eligible().returning(move |_, _| {
            if served {
                Ok(Vec::new())
            } else {
                served = true;
                Ok(vec![job.clone()])
            }
        });
        jobs.expect_try_claim().returning(|_, _, _| Ok(true));
        jobs.expect_complete().returning(|_, _, _, _| Ok(false));

        let provider = MockProvider::new();
        let worker = BatchWorker::new(
            PipelineConfig {
                concurrency: 1,
                ..config()
            },
            Arc::new(jobs),
            SuppressionRegistry::new(Arc::new(InMemorySuppressionRepository::new()), clock.clone()),
            Arc::new(TemplateEngine::new().unwrap()),
            Arc::new(provider.clone()),
            clock,
        );

        assert_eq!(worker.run_for(Duration::seconds(55)).await, RunStats::default());
        assert_eq!(provider.call_count(), 1);
    }
}
