//! Transactional email pipeline.
//!
//! ```text
//! caller ──► EnqueueGateway ──► email_jobs ◄──► BatchWorker ──► EmailProvider
//!                 ▲                                                  │
//!                 │                                                  ▼
//!        SuppressionRegistry ◄──── FeedbackIngestor ◄──── provider webhooks
//! ```
//!
//! - [`gateway::EnqueueGateway`] validates a request, refuses suppressed
//!   recipients and writes a `queued` job.
//! - [`worker::BatchWorker`] is triggered on a schedule with a deadline. It
//!   claims due jobs with a compare-and-swap, renders and sends them, and
//!   reschedules or dead-letters failures.
//! - [`feedback::FeedbackIngestor`] records provider events and suppresses
//!   addresses that hard-bounced or complained.
//!
//! Delivery is at-least-once: a send that succeeds right before a crash can
//! be repeated once its claim goes stale.

pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod feedback;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod postgres;
pub mod providers;
pub mod repository;
pub mod suppression;
pub mod templates;
pub mod worker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ApiConfig, PipelineConfig};
pub use error::{NotificationError, NotificationResult};
pub use feedback::{FeedbackIngestor, IngestReport};
pub use gateway::EnqueueGateway;
pub use handlers::{ApiDoc, router};
pub use models::{
    EmailType, EnqueueRequest, EnqueueResponse, FeedbackRecord, FeedbackType, Job, JobStatus,
    ProcessResponse, RunStats, SuppressionEntry, SuppressionReason,
};
pub use pipeline::{EmailPipeline, Repositories};
pub use providers::{DeliveryError, EmailProvider, MockProvider, OutboundEmail, SentEmail};
pub use suppression::SuppressionRegistry;
pub use templates::TemplateEngine;
pub use worker::BatchWorker;
