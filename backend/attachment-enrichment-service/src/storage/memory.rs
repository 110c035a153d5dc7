//! In-process store for local runs and tests
use super::{AttachmentRepository, MetadataStore, StorageError, TaxonomyStore};
use crate::models::AttachmentId;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

/// DashMap-backed implementation of the host storage seams
#[derive(Debug, Default)]
pub struct MemoryStore {
    attachments: DashMap<AttachmentId, String>,
    meta: DashMap<(AttachmentId, String), Value>,
    terms: DashMap<(AttachmentId, String), Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an attachment and its file path
    pub fn insert_attachment(&self, id: AttachmentId, file: impl Into<String>) {
        self.attachments.insert(id, file.into());
    }

    /// Metadata keys stored for an attachment, sorted
    pub fn meta_keys(&self, id: AttachmentId) -> Vec<String> {
        let mut keys: Vec<String> = self
            .meta
            .iter()
            .filter(|entry| entry.key().0 == id)
            .map(|entry| entry.key().1.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn get(&self, id: AttachmentId, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self
            .meta
            .get(&(id, key.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn set(&self, id: AttachmentId, key: &str, value: Value) -> Result<(), StorageError> {
        self.meta.insert((id, key.to_string()), value);
        Ok(())
    }

    async fn delete(&self, id: AttachmentId, key: &str) -> Result<bool, StorageError> {
        Ok(self.meta.remove(&(id, key.to_string())).is_some())
    }
}

#[async_trait]
impl TaxonomyStore for MemoryStore {
    async fn attach_terms(
        &self,
        id: AttachmentId,
        taxonomy: &str,
        names: &[String],
        append: bool,
    ) -> Result<usize, StorageError> {
        let mut entry = self.terms.entry((id, taxonomy.to_string())).or_default();
        if !append {
            entry.clear();
        }

        let mut attached = 0;
        for name in names {
            if name.is_empty() || entry.contains(name) {
                continue;
            }
            entry.push(name.clone());
            attached += 1;
        }
        Ok(attached)
    }

    async fn terms_for(
        &self,
        id: AttachmentId,
        taxonomy: &str,
    ) -> Result<Vec<String>, StorageError> {
        Ok(self
            .terms
            .get(&(id, taxonomy.to_string()))
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl AttachmentRepository for MemoryStore {
    async fn attached_file(&self, id: AttachmentId) -> Result<Option<String>, StorageError> {
        Ok(self.attachments.get(&id).map(|entry| entry.value().clone()))
    }

    async fn attachments_missing_meta(
        &self,
        meta_key: &str,
        after: Option<AttachmentId>,
        limit: i64,
    ) -> Result<Vec<AttachmentId>, StorageError> {
        let mut ids: Vec<AttachmentId> = self
            .attachments
            .iter()
            .map(|entry| *entry.key())
            .filter(|id| after.map_or(true, |after| *id > after))
            .filter(|id| !self.meta.contains_key(&(*id, meta_key.to_string())))
            .collect();
        ids.sort();
        ids.truncate(limit.max(0) as usize);
        Ok(ids)
    }
}
