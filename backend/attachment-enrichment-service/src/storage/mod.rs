//! Host platform storage seams
//!
//! Attachments, their metadata and their taxonomy terms are owned by the host
//! platform. The pipeline reaches them through these traits:
//! - [`PgStore`]: Postgres-backed implementation
//! - [`MemoryStore`]: in-process implementation for local runs and tests
//! - [`AttachmentFiles`]: reads attachment files from disk or S3

pub mod files;
pub mod memory;
pub mod postgres;

use crate::models::AttachmentId;
use crate::services::search::ContentQuery;
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

pub use files::AttachmentFiles;
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage error types
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object storage error: {0}")]
    ObjectStorage(String),
}

/// Per-attachment key/value metadata
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, id: AttachmentId, key: &str) -> Result<Option<Value>, StorageError>;

    /// Upsert: replaces any existing value under `key`
    async fn set(&self, id: AttachmentId, key: &str, value: Value) -> Result<(), StorageError>;

    /// Returns whether a value was removed
    async fn delete(&self, id: AttachmentId, key: &str) -> Result<bool, StorageError>;
}

/// Flat taxonomy terms attached to attachments
#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    /// Attach `names` to the attachment. With `append`, existing terms are
    /// kept and already-attached names are not attached twice; without it the
    /// attachment's terms in `taxonomy` are replaced. Returns the number of
    /// newly attached terms.
    async fn attach_terms(
        &self,
        id: AttachmentId,
        taxonomy: &str,
        names: &[String],
        append: bool,
    ) -> Result<usize, StorageError>;

    async fn terms_for(&self, id: AttachmentId, taxonomy: &str)
        -> Result<Vec<String>, StorageError>;
}

/// Attachment lookup
#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    /// Attached file path: local path or `s3://bucket/key`
    async fn attached_file(&self, id: AttachmentId) -> Result<Option<String>, StorageError>;

    /// Attachments without a value under `meta_key`, ordered by id, after `after`
    async fn attachments_missing_meta(
        &self,
        meta_key: &str,
        after: Option<AttachmentId>,
        limit: i64,
    ) -> Result<Vec<AttachmentId>, StorageError>;
}

/// Raw file access for attachment files
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Up to `len` leading bytes
    async fn read_head(&self, path: &str, len: usize) -> Result<Vec<u8>, StorageError>;

    async fn read_all(&self, path: &str) -> Result<Vec<u8>, StorageError>;
}

/// Executes content listing queries
#[async_trait]
pub trait ContentSearch: Send + Sync {
    /// Ids of matching content items; pending clause filters fire while building
    async fn search_content(&self, query: ContentQuery) -> Result<Vec<Uuid>, StorageError>;
}
