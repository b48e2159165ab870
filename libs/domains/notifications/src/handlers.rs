use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use axum_helpers::{AppError, ErrorResponse, SharedSecret, ValidatedJson, require_shared_secret};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;
use validator::ValidateEmail;

use crate::config::ApiConfig;
use crate::error::NotificationResult;
use crate::feedback::IngestReport;
use crate::models::{
    EmailType, EnqueueRequest, EnqueueResponse, Job, JobStatus, ProcessResponse,
    SuppressionReason,
};
use crate::pipeline::EmailPipeline;

/// OpenAPI documentation for the email pipeline API
#[derive(OpenApi)]
#[openapi(
    paths(
        enqueue_email,
        get_email_job,
        process_emails,
        receive_webhook,
        unsubscribe_link,
        unsubscribe_one_click,
    ),
    components(schemas(
        EnqueueRequest,
        EnqueueResponse,
        ProcessResponse,
        WebhookAck,
        UnsubscribeResponse,
        Job,
        JobStatus,
        EmailType,
        ErrorResponse
    )),
    tags(
        (name = "emails", description = "Transactional email queue"),
        (name = "feedback", description = "Provider webhooks and unsubscribe links")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct EmailApiState {
    pipeline: EmailPipeline,
    webhook_token: Option<SharedSecret>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnsubscribeResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WebhookParams {
    /// Shared token, required when the service has one configured
    token: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UnsubscribeParams {
    email: Option<String>,
}

/// Routes for `/emails`, `/webhooks/email` and `/unsubscribe`.
///
/// The enqueue, inspection and worker-trigger routes require the bearer
/// secret; webhooks and unsubscribe links are public.
pub fn router(pipeline: EmailPipeline, api: &ApiConfig) -> Router {
    let secret = SharedSecret::new(&api.api_secret);
    let state = EmailApiState {
        pipeline,
        webhook_token: api.webhook_token.as_ref().map(SharedSecret::new),
    };

    let protected = Router::new()
        .route("/emails", post(enqueue_email))
        .route("/emails/process", get(process_emails).post(process_emails))
        .route("/emails/{id}", get(get_email_job))
        .route_layer(middleware::from_fn_with_state(secret, require_shared_secret));

    let public = Router::new()
        .route("/webhooks/email", post(receive_webhook))
        .route("/unsubscribe", get(unsubscribe_link).post(unsubscribe_one_click));

    protected.merge(public).with_state(state)
}

/// Queue a transactional email
///
/// Requires `Authorization: Bearer <secret>`.
#[utoipa::path(
    post,
    path = "/api/emails",
    tag = "emails",
    request_body = EnqueueRequest,
    responses(
        (status = 201, description = "Job queued", body = EnqueueResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Missing or wrong secret", body = ErrorResponse),
        (status = 409, description = "Recipient is suppressed", body = ErrorResponse)
    )
)]
async fn enqueue_email(
    State(state): State<EmailApiState>,
    ValidatedJson(request): ValidatedJson<EnqueueRequest>,
) -> NotificationResult<impl IntoResponse> {
    let job_id = state.pipeline.gateway.enqueue(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(EnqueueResponse {
            success: true,
            job_id,
        }),
    ))
}

/// Inspect a job
#[utoipa::path(
    get,
    path = "/api/emails/{id}",
    tag = "emails",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job found", body = Job),
        (status = 404, description = "Unknown job", body = ErrorResponse)
    )
)]
async fn get_email_job(
    State(state): State<EmailApiState>,
    Path(id): Path<Uuid>,
) -> NotificationResult<Json<Job>> {
    Ok(Json(state.pipeline.gateway.get(id).await?))
}

/// Run the batch worker once
///
/// Called by an external scheduler. Always reports the run counters.
#[utoipa::path(
    post,
    path = "/api/emails/process",
    tag = "emails",
    responses(
        (status = 200, description = "Run finished", body = ProcessResponse),
        (status = 401, description = "Missing or wrong secret", body = ErrorResponse)
    )
)]
async fn process_emails(State(state): State<EmailApiState>) -> Json<ProcessResponse> {
    let budget = state.pipeline.config.max_run_duration;
    let stats = state.pipeline.worker.run_for(budget).await;
    Json(stats.into())
}

/// Receive a provider delivery event
///
/// Always answers 200 so the provider never retries; malformed, unrecognised
/// and unauthenticated events are logged and dropped.
#[utoipa::path(
    post,
    path = "/api/webhooks/email",
    tag = "feedback",
    params(WebhookParams),
    request_body(content = Object, description = "Provider event envelope"),
    responses((status = 200, description = "Event acknowledged", body = WebhookAck))
)]
async fn receive_webhook(
    State(state): State<EmailApiState>,
    params: Result<Query<WebhookParams>, QueryRejection>,
    body: Bytes,
) -> Json<WebhookAck> {
    let token = params.ok().and_then(|Query(p)| p.token);

    if let Some(expected) = &state.webhook_token {
        let authorized = token.as_deref().is_some_and(|t| expected.matches(t));
        if !authorized {
            warn!(has_token = token.is_some(), "Dropping webhook with invalid token");
            return Json(WebhookAck { received: true });
        }
    }

    let report: IngestReport = state.pipeline.ingestor.ingest(&body).await;
    if report.errors > 0 {
        warn!(errors = report.errors, "Webhook ingested with storage errors");
    }
    Json(WebhookAck { received: true })
}

fn unsubscribe_address(params: Result<Query<UnsubscribeParams>, QueryRejection>) -> Result<String, AppError> {
    let email = params
        .ok()
        .and_then(|Query(p)| p.email)
        .map(|e| e.trim().to_string())
        .unwrap_or_default();

    if email.validate_email() {
        Ok(email)
    } else {
        Err(AppError::BadRequest("A valid email query parameter is required".to_string()))
    }
}

async fn unsubscribe(state: &EmailApiState, email: &str) -> Result<(), AppError> {
    let created = state
        .pipeline
        .suppressions
        .suppress(email, SuppressionReason::UserRequested)
        .await?;
    info!(created, "Unsubscribe processed");
    Ok(())
}

/// Unsubscribe link from an email footer
#[utoipa::path(
    get,
    path = "/api/unsubscribe",
    tag = "feedback",
    params(UnsubscribeParams),
    responses(
        (status = 303, description = "Redirect to the confirmation page"),
        (status = 400, description = "Missing or invalid address", body = ErrorResponse)
    )
)]
async fn unsubscribe_link(
    State(state): State<EmailApiState>,
    params: Result<Query<UnsubscribeParams>, QueryRejection>,
) -> Result<Redirect, AppError> {
    let email = unsubscribe_address(params)?;
    unsubscribe(&state, &email).await?;
    Ok(Redirect::to(&state.pipeline.config.unsubscribe_redirect_url))
}

/// One-click unsubscribe (RFC 8058)
#[utoipa::path(
    post,
    path = "/api/unsubscribe",
    tag = "feedback",
    params(UnsubscribeParams),
    responses(
        (status = 200, description = "Address unsubscribed", body = UnsubscribeResponse),
        (status = 400, description = "Missing or invalid address", body = ErrorResponse)
    )
)]
async fn unsubscribe_one_click(
    State(state): State<EmailApiState>,
    params: Result<Query<UnsubscribeParams>, QueryRejection>,
) -> Result<Json<UnsubscribeResponse>, AppError> {
    let email = unsubscribe_address(params)?;
    unsubscribe(&state, &email).await?;
    Ok(Json(UnsubscribeResponse { success: true }))
}
