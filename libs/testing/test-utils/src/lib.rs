//! Shared test utilities for domain testing
//!
//! - `TestDatabase`: PostgreSQL container with the workspace migrations
//!   applied and automatic cleanup (feature: "postgres")
//! - `TestDataBuilder`: Deterministic test data generation (always available)
//! - `assertions`: Custom assertion helpers (always available)
//!
//! # Usage
//!
//! ```rust,no_run
//! use test_utils::{TestDatabase, TestDataBuilder};
//!
//! #[tokio::test]
//! #[ignore] // Requires Docker
//! async fn my_postgres_test() {
//!     let db = TestDatabase::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_test");
//!
//!     let recipient = builder.email("ada");
//! }
//! ```

use uuid::Uuid;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::TestDatabase;

/// Builder for test data with deterministic randomization
///
/// Tests sharing a database stay isolated by deriving every address and id
/// from their own name.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_enqueue");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Deterministic UUID for this builder
    pub fn id(&self) -> Uuid {
        let bytes = self.seed.to_le_bytes();
        let mut uuid_bytes = [0u8; 16];
        uuid_bytes[..8].copy_from_slice(&bytes);
        uuid_bytes[8..16].copy_from_slice(&bytes);
        Uuid::from_bytes(uuid_bytes)
    }

    /// A lower-case recipient address unique to this builder.
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let email = TestDataBuilder::new(7).email("ada");
    /// assert_eq!(email, "ada-7@example.test");
    /// ```
    pub fn email(&self, local: &str) -> String {
        format!("{}-{}@example.test", local.to_lowercase(), self.seed)
    }

    /// `n` distinct addresses sharing a prefix.
    pub fn emails(&self, local: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| self.email(&format!("{local}{i}"))).collect()
    }
}

/// Test assertion helpers
pub mod assertions {
    /// Assert that every item is distinct
    pub fn assert_unique<T: std::hash::Hash + Eq + std::fmt::Debug>(items: &[T], context: &str) {
        let mut seen = std::collections::HashSet::new();
        for item in items {
            assert!(seen.insert(item), "{}: duplicate item {:?}", context, item);
        }
    }
}
