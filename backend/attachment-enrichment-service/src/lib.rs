//! Attachment Enrichment Service
//!
//! Enriches image attachments with computer-vision metadata:
//! - Upload trigger that enqueues deferred enrichment jobs
//! - AWS Rekognition capabilities (labels, moderation, faces, celebrities, text)
//! - Metadata, label taxonomy and keyword persistence
//! - Keyword-aware attachment search
//! - Admin label preview and refresh

pub mod admin;
pub mod config;
pub mod jobs;
pub mod kafka;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use uuid::Uuid;

pub use config::Config;
pub use jobs::{
    BackfillJob, BackfillStats, JobHandler, JobScheduler, LocalJobScheduler, ScheduledJob,
    SchedulerError, ENRICHMENT_JOB,
};
pub use kafka::{EnrichmentJobConsumer, KafkaJobScheduler};
pub use models::{
    AttachmentId, Capability, CapabilityPayload, CapabilityResult, EnrichmentBundle,
    ImageReference, KeywordSet,
};
pub use providers::{ProviderError, RekognitionProvider, VisionProvider};
pub use services::{
    CapabilityOrchestrator, ContentQuery, EnrichmentHooks, EnrichmentJobRunner, EnrichmentOutcome,
    EnrichmentPolicy, PersistenceWriter, ResultNormalizer, SearchQueryAugmenter, UploadTrigger,
};
pub use storage::{MemoryStore, PgStore, StorageError};

/// Enrichment service error types
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Attachment not found: {0}")]
    AttachmentNotFound(Uuid),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for EnrichmentError {
    fn from(err: anyhow::Error) -> Self {
        EnrichmentError::Internal(err.to_string())
    }
}
