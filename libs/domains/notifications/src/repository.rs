//! Persistence seams for jobs, suppressions and feedback.
//!
//! Every job mutation after insert is conditional on the current status, so
//! concurrent workers can never move a job out of a state they do not own and
//! terminal jobs are never touched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::NotificationResult;
use crate::models::{FeedbackRecord, Job, JobStatus, JobTransition, SuppressionEntry};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn insert(&self, job: Job) -> NotificationResult<Job>;

    async fn get(&self, id: Uuid) -> NotificationResult<Option<Job>>;

    /// Claimable jobs due at `now`, oldest `next_attempt_at` first.
    async fn find_eligible(&self, now: DateTime<Utc>, limit: u64) -> NotificationResult<Vec<Job>>;

    /// `processing` jobs last touched before `claimed_before`.
    async fn find_stale(
        &self,
        claimed_before: DateTime<Utc>,
        limit: u64,
    ) -> NotificationResult<Vec<Job>>;

    /// Compare-and-swap `expected -> processing`. True iff this caller won.
    async fn try_claim(
        &self,
        id: Uuid,
        expected: JobStatus,
        now: DateTime<Utc>,
    ) -> NotificationResult<bool>;

    /// Apply `transition` if the job is still `processing` under the claim
    /// taken at `claimed_at`. A job re-claimed since then is left untouched.
    async fn complete(
        &self,
        id: Uuid,
        claimed_at: DateTime<Utc>,
        transition: JobTransition,
        now: DateTime<Utc>,
    ) -> NotificationResult<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SuppressionRepository: Send + Sync {
    async fn find(&self, email: &str) -> NotificationResult<Option<SuppressionEntry>>;

    /// Insert unless an entry for the address exists. True iff inserted.
    async fn insert_if_absent(&self, entry: SuppressionEntry) -> NotificationResult<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn append(&self, record: FeedbackRecord) -> NotificationResult<()>;

    async fn list_for(&self, email: &str) -> NotificationResult<Vec<FeedbackRecord>>;
}

/// In-memory job store for development and tests.
#[derive(Clone, Default)]
pub struct InMemoryJobRepository {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|j| (j.created_at, j.id));
        jobs
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn insert(&self, job: Job) -> NotificationResult<Job> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: Uuid) -> NotificationResult<Option<Job>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn find_eligible(&self, now: DateTime<Utc>, limit: u64) -> NotificationResult<Vec<Job>> {
        let jobs = self.jobs.read().await;
        let mut due: Vec<Job> = jobs
            .values()
            .filter(|j| j.status.is_claimable() && j.next_attempt_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|j| (j.next_attempt_at, j.id));
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn find_stale(
        &self,
        claimed_before: DateTime<Utc>,
        limit: u64,
    ) -> NotificationResult<Vec<Job>> {
        let jobs = self.jobs.read().await;
        let mut stale: Vec<Job> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Processing && j.updated_at < claimed_before)
            .cloned()
            .collect();
        stale.sort_by_key(|j| (j.updated_at, j.id));
        stale.truncate(limit as usize);
        Ok(stale)
    }

    async fn try_claim(
        &self,
        id: Uuid,
        expected: JobStatus,
        now: DateTime<Utc>,
    ) -> NotificationResult<bool> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id) {
            Some(job) if job.status == expected => {
                job.status = JobStatus::Processing;
                job.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete(
        &self,
        id: Uuid,
        claimed_at: DateTime<Utc>,
        transition: JobTransition,
        now: DateTime<Utc>,
    ) -> NotificationResult<bool> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Processing && job.updated_at == claimed_at => {
                transition.apply(job, now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// In-memory suppression list keyed by normalized address.
#[derive(Clone, Default)]
pub struct InMemorySuppressionRepository {
    entries: Arc<RwLock<HashMap<String, SuppressionEntry>>>,
}

impl InMemorySuppressionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl SuppressionRepository for InMemorySuppressionRepository {
    async fn find(&self, email: &str) -> NotificationResult<Option<SuppressionEntry>> {
        Ok(self.entries.read().await.get(email).cloned())
    }

    async fn insert_if_absent(&self, entry: SuppressionEntry) -> NotificationResult<bool> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&entry.email) {
            return Ok(false);
        }
        entries.insert(entry.email.clone(), entry);
        Ok(true)
    }
}

/// In-memory feedback log.
#[derive(Clone, Default)]
pub struct InMemoryFeedbackRepository {
    records: Arc<RwLock<Vec<FeedbackRecord>>>,
}

impl InMemoryFeedbackRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl FeedbackRepository for InMemoryFeedbackRepository {
    async fn append(&self, record: FeedbackRecord) -> NotificationResult<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn list_for(&self, email: &str) -> NotificationResult<Vec<FeedbackRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.email == email)
            .cloned()
            .collect())
    }
}
