//! Service-to-service authentication.

mod shared_secret;

pub use shared_secret::{SharedSecret, require_shared_secret};
