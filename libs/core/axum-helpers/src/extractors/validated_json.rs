//! JSON extractor with automatic validation using the validator crate.

use crate::errors::AppError;
use axum::extract::{FromRequest, Json, Request};
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON body that has passed `Validate::validate`.
///
/// Malformed JSON is rejected with `JSON_EXTRACTION`, failed validation with
/// `VALIDATION_ERROR` and the per-field errors in `details`.
///
/// ```ignore
/// #[derive(Deserialize, Validate)]
/// struct Unsubscribe {
///     #[validate(email)]
///     email: String,
/// }
///
/// async fn unsubscribe(ValidatedJson(body): ValidatedJson<Unsubscribe>) -> StatusCode {
///     StatusCode::OK
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state).await?;
        data.validate()?;
        Ok(ValidatedJson(data))
    }
}
