//! Provider delivery events: record them, and escalate hard failures to the
//! suppression registry.
//!
//! Ingestion never fails towards the caller. Malformed or unrecognised events
//! are acknowledged, logged and dropped so the provider does not retry them
//! forever; storage errors are logged and reported in the [`IngestReport`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use validator::ValidateEmail;

use crate::clock::Clock;
use crate::models::{FeedbackRecord, FeedbackType, SuppressionReason};
use crate::repository::FeedbackRepository;
use crate::suppression::{SuppressionRegistry, normalize_email};

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: EventData,
}

#[derive(Debug, Default, Deserialize)]
struct EventData {
    #[serde(default)]
    to: Recipients,
    email_id: Option<String>,
    bounce: Option<Bounce>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Default for Recipients {
    fn default() -> Self {
        Recipients::Many(Vec::new())
    }
}

impl Recipients {
    fn entries(&self) -> Vec<&str> {
        match self {
            Recipients::One(entry) => vec![entry.as_str()],
            Recipients::Many(entries) => entries.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Bounce {
    #[serde(rename = "type")]
    bounce_type: Option<String>,
    #[serde(rename = "subType")]
    sub_type: Option<String>,
    message: Option<String>,
}

impl Bounce {
    fn is_permanent(&self) -> bool {
        self.bounce_type
            .as_deref()
            .map(|t| t.eq_ignore_ascii_case("permanent") || t.eq_ignore_ascii_case("hard"))
            .unwrap_or(false)
    }
}

fn feedback_type(event_type: &str) -> Option<FeedbackType> {
    match event_type {
        "email.bounced" | "bounce" => Some(FeedbackType::Bounce),
        "email.complained" | "complaint" => Some(FeedbackType::Complaint),
        "email.delivered" | "delivered" => Some(FeedbackType::Delivered),
        _ => None,
    }
}

/// Pull the address out of `"Name <addr>"` or a bare `addr`.
///
/// Returns the lower-cased address, or `None` when it is not a valid email.
pub fn extract_address(entry: &str) -> Option<String> {
    let entry = entry.trim();
    let candidate = match (entry.rfind('<'), entry.rfind('>')) {
        (Some(open), Some(close)) if open < close => &entry[open + 1..close],
        (None, None) => entry,
        _ => return None,
    };
    let candidate = candidate.trim();
    candidate
        .validate_email()
        .then(|| normalize_email(candidate))
}

/// What one webhook delivery did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// The event's `type`, when the payload could be parsed
    pub event_type: Option<String>,
    /// False for malformed or unrecognised events
    pub recognized: bool,
    pub recorded: usize,
    /// New suppression entries created
    pub suppressed: usize,
    /// Recipient entries that were not valid addresses
    pub skipped: usize,
    /// Storage operations that failed and were swallowed
    pub errors: usize,
}

#[derive(Clone)]
pub struct FeedbackIngestor {
    feedback: Arc<dyn FeedbackRepository>,
    suppressions: SuppressionRegistry,
    clock: Arc<dyn Clock>,
}

impl FeedbackIngestor {
    pub fn new(
        feedback: Arc<dyn FeedbackRepository>,
        suppressions: SuppressionRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            feedback,
            suppressions,
            clock,
        }
    }

    #[instrument(skip_all, fields(bytes = raw.len()))]
    pub async fn ingest(&self, raw: &[u8]) -> IngestReport {
        let mut report = IngestReport::default();

        let payload: Value = match serde_json::from_slice(raw) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed webhook payload");
                return report;
            }
        };
        let envelope: Envelope = match serde_json::from_value(payload.clone()) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Ignoring webhook payload without a usable envelope");
                return report;
            }
        };
        report.event_type = Some(envelope.event_type.clone());

        let Some(kind) = feedback_type(&envelope.event_type) else {
            info!(event_type = %envelope.event_type, "Ignoring unrecognised webhook event");
            return report;
        };
        report.recognized = true;

        let escalation = match (&kind, &envelope.data.bounce) {
            (FeedbackType::Complaint, _) => Some(SuppressionReason::SpamComplaint),
            (FeedbackType::Bounce, Some(bounce)) if bounce.is_permanent() => {
                Some(SuppressionReason::HardBounce)
            }
            _ => None,
        };
        if let Some(bounce) = &envelope.data.bounce {
            debug!(
                bounce_type = ?bounce.bounce_type,
                sub_type = ?bounce.sub_type,
                message = ?bounce.message,
                "Bounce details"
            );
        }

        for entry in envelope.data.to.entries() {
            let Some(email) = extract_address(entry) else {
                warn!(entry, "Skipping unparseable recipient");
                report.skipped += 1;
                continue;
            };

            let record = FeedbackRecord {
                id: Uuid::now_v7(),
                email: email.clone(),
                feedback_type: kind,
                esp_event_id: envelope.data.email_id.clone(),
                raw_payload: payload.clone(),
                created_at: self.clock.now(),
            };
            match self.feedback.append(record).await {
                Ok(()) => report.recorded += 1,
                Err(e) => {
                    error!(error = %e, feedback_type = %kind, "Failed to record feedback");
                    report.errors += 1;
                }
            }

            if let Some(reason) = escalation {
                match self.suppressions.suppress(&email, reason).await {
                    Ok(true) => report.suppressed += 1,
                    Ok(false) => {}
                    Err(e) => {
                        error!(error = %e, %reason, "Failed to suppress address");
                        report.errors += 1;
                    }
                }
            }
        }

        info!(
            feedback_type = %kind,
            recorded = report.recorded,
            suppressed = report.suppressed,
            skipped = report.skipped,
            "Webhook event ingested"
        );
        report
    }
}
