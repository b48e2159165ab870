//! The set of addresses that must never be mailed again.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::clock::Clock;
use crate::error::NotificationResult;
use crate::models::{SuppressionEntry, SuppressionReason};
use crate::repository::SuppressionRepository;

/// Canonical form used as the suppression key: trimmed, ASCII lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[derive(Clone)]
pub struct SuppressionRegistry {
    repository: Arc<dyn SuppressionRepository>,
    clock: Arc<dyn Clock>,
}

impl SuppressionRegistry {
    pub fn new(repository: Arc<dyn SuppressionRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Case-insensitive exact match.
    pub async fn is_suppressed(&self, email: &str) -> NotificationResult<bool> {
        Ok(self.get(email).await?.is_some())
    }

    /// Idempotent upsert; an existing entry keeps its original reason.
    ///
    /// Returns whether a new entry was created.
    #[instrument(skip(self), fields(reason = %reason))]
    pub async fn suppress(&self, email: &str, reason: SuppressionReason) -> NotificationResult<bool> {
        let entry = SuppressionEntry {
            email: normalize_email(email),
            reason,
            created_at: self.clock.now(),
        };

        let created = self.repository.insert_if_absent(entry).await?;
        if created {
            info!(email = %normalize_email(email), "Address suppressed");
        } else {
            debug!(email = %normalize_email(email), "Address already suppressed");
        }
        Ok(created)
    }

    pub async fn get(&self, email: &str) -> NotificationResult<Option<SuppressionEntry>> {
        self.repository.find(&normalize_email(email)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::error::NotificationError;
    use crate::repository::{InMemorySuppressionRepository, MockSuppressionRepository};

    fn registry() -> SuppressionRegistry {
        SuppressionRegistry::new(
            Arc::new(InMemorySuppressionRepository::new()),
            Arc::new(SystemClock),
        )
    }

    #[test]
    fn test_normalize_email_folds_ascii_only() {
        assert_eq!(normalize_email("  Someone@Example.COM\n"), "someone@example.com");
        assert_eq!(normalize_email("ÅSA@Example.com"), "Åsa@example.com");
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let registry = registry();
        registry
            .suppress("  Someone@Example.COM ", SuppressionReason::UserRequested)
            .await
            .unwrap();

        assert!(registry.is_suppressed("someone@example.com").await.unwrap());
        assert!(registry.is_suppressed("SOMEONE@EXAMPLE.COM").await.unwrap());
        assert!(!registry.is_suppressed("other@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_first_reason_wins() {
        let registry = registry();
        assert!(registry.suppress("a@x.com", SuppressionReason::HardBounce).await.unwrap());
        assert!(!registry.suppress("A@x.com", SuppressionReason::SpamComplaint).await.unwrap());
        assert!(!registry.suppress("a@x.com", SuppressionReason::UserRequested).await.unwrap());

        let entry = registry.get("a@x.com").await.unwrap().unwrap();
        assert_eq!(entry.reason, SuppressionReason::HardBounce);
        assert_eq!(entry.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_lookup_error_propagates() {
        let mut repo = MockSuppressionRepository::new();
        repo.expect_find()
            .returning(|_| Err(NotificationError::Config("store offline".to_string())));

        let registry = SuppressionRegistry::new(Arc::new(repo), Arc::new(SystemClock));
        assert!(registry.is_suppressed("a@x.com").await.is_err());
    }
}
