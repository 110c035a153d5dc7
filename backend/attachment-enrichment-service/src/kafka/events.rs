//! Kafka event schemas for enrichment jobs
use crate::jobs::ScheduledJob;
use crate::models::AttachmentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default topic names
pub mod topics {
    /// Scheduled enrichment jobs
    pub const ENRICHMENT_JOBS: &str = "attachment-enrichment.jobs";

    /// Job messages that could not be decoded
    pub const ENRICHMENT_JOBS_DLQ: &str = "attachment-enrichment.jobs.dlq";
}

/// An enrichment job, published keyed by attachment id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentJobRequested {
    pub event_id: Uuid,
    pub job: String,
    pub attachment_id: AttachmentId,
    pub run_at: DateTime<Utc>,
    /// Unix millis
    pub requested_at: i64,
}

impl EnrichmentJobRequested {
    pub fn new(job: &ScheduledJob) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            job: job.job.clone(),
            attachment_id: job.attachment_id,
            run_at: job.run_at,
            requested_at: Utc::now().timestamp_millis(),
        }
    }

    pub fn into_job(self) -> ScheduledJob {
        ScheduledJob {
            job: self.job,
            attachment_id: self.attachment_id,
            run_at: self.run_at,
        }
    }
}

/// Dead letter envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentDeadLetterEvent {
    pub original_event: serde_json::Value,
    pub original_topic: String,
    pub error: String,
    pub retry_count: u32,
    /// Unix millis
    pub failed_at: i64,
}
