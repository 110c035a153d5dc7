//! Deferred job contracts
//!
//! - [`JobScheduler`]: enqueue a job to run once at a given time
//! - [`JobHandler`]: executes a job by name
//! - [`LocalJobScheduler`]: in-process queue for local runs and tests
//! - [`BackfillJob`]: one-shot enqueue of attachments never enriched

pub mod backfill;
pub mod local;

use crate::models::AttachmentId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use backfill::{BackfillConfig, BackfillJob, BackfillStats};
pub use local::LocalJobScheduler;

/// Job name of an enrichment run
pub const ENRICHMENT_JOB: &str = "attachment_enrichment.update_image";

/// A job scheduled to run once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub job: String,
    pub attachment_id: AttachmentId,
    pub run_at: DateTime<Utc>,
}

impl ScheduledJob {
    pub fn enrichment(attachment_id: AttachmentId, run_at: DateTime<Utc>) -> Self {
        Self {
            job: ENRICHMENT_JOB.to_string(),
            attachment_id,
            run_at,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.run_at <= now
    }
}

/// Scheduler error types
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Kafka error: {0}")]
    Kafka(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Scheduler closed")]
    Closed,
}

/// Enqueues jobs for deferred execution
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobScheduler: Send + Sync {
    async fn schedule_once(&self, job: ScheduledJob) -> Result<(), SchedulerError>;
}

/// Executes due jobs
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn execute(&self, job: &ScheduledJob);
}
