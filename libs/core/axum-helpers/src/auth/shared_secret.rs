use crate::errors::AppError;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Pre-shared secret expected as `Authorization: Bearer <secret>`.
///
/// Only the SHA-256 digest is kept, and comparison runs over the full digest
/// so timing does not depend on where the first mismatch is.
#[derive(Clone)]
pub struct SharedSecret {
    digest: Arc<[u8]>,
}

impl SharedSecret {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            digest: Arc::from(Sha256::digest(secret.as_ref()).as_slice()),
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = Sha256::digest(candidate.as_bytes());
        self.digest
            .iter()
            .zip(candidate.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(***)")
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Rejects requests whose bearer token does not match the shared secret.
///
/// ```ignore
/// let protected = Router::new()
///     .route("/emails", post(enqueue))
///     .layer(axum::middleware::from_fn_with_state(secret, require_shared_secret));
/// ```
pub async fn require_shared_secret(
    State(secret): State<SharedSecret>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match bearer_token(&headers) {
        Some(token) if secret.matches(token) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "Rejected request with wrong shared secret");
            Err(AppError::Unauthorized("Invalid credentials".to_string()))
        }
        None => {
            tracing::debug!(path = %request.uri().path(), "No bearer token provided");
            Err(AppError::Unauthorized("Missing bearer token".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::StatusCode, middleware, routing::get};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/protected", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(
                SharedSecret::new("s3cret"),
                require_shared_secret,
            ))
    }

    async fn status_with(auth: Option<&str>) -> StatusCode {
        let mut builder = Request::builder().uri("/protected");
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[test]
    fn test_matches() {
        let secret = SharedSecret::new("s3cret");
        assert!(secret.matches("s3cret"));
        assert!(!secret.matches("s3cret "));
        assert!(!secret.matches(""));
    }

    #[test]
    fn test_debug_does_not_leak() {
        assert_eq!(format!("{:?}", SharedSecret::new("s3cret")), "SharedSecret(***)");
    }

    #[tokio::test]
    async fn test_middleware_statuses() {
        assert_eq!(status_with(Some("Bearer s3cret")).await, StatusCode::OK);
        assert_eq!(status_with(Some("Bearer wrong")).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_with(Some("Basic s3cret")).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_with(None).await, StatusCode::UNAUTHORIZED);
    }
}
