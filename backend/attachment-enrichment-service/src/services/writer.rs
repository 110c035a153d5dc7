//! Persistence of normalized results
use super::normalizer::NormalizedBundle;
use crate::models::{
    AttachmentId, Capability, CapabilityPayload, CapabilityResult, EnrichmentBundle,
    KEYWORDS_META_KEY, LABEL_TAXONOMY,
};
use crate::storage::{MetadataStore, StorageError, TaxonomyStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

/// What one write pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Capabilities whose data record was stored
    pub succeeded: Vec<Capability>,
    /// Capabilities whose error record was stored
    pub failed: Vec<Capability>,
    /// Label terms newly attached to the attachment
    pub terms_attached: usize,
    /// Individual store operations that failed
    pub store_errors: usize,
}

impl WriteSummary {
    pub fn is_complete(&self) -> bool {
        self.store_errors == 0
    }
}

/// Upserts metadata records, label terms and the keyword blob
pub struct PersistenceWriter {
    metadata: Arc<dyn MetadataStore>,
    taxonomy: Arc<dyn TaxonomyStore>,
}

impl PersistenceWriter {
    pub fn new(metadata: Arc<dyn MetadataStore>, taxonomy: Arc<dyn TaxonomyStore>) -> Self {
        Self { metadata, taxonomy }
    }

    /// Persist one run's records, label terms and keyword blob.
    ///
    /// A success removes the capability's error key. A failure only adds the
    /// error key: data stored by an earlier successful run stays readable, so a
    /// capability can hold both keys until it succeeds again.
    pub async fn write(
        &self,
        id: AttachmentId,
        bundle: &EnrichmentBundle,
        normalized: &NormalizedBundle,
    ) -> WriteSummary {
        let mut summary = WriteSummary::default();

        for record in &normalized.records {
            let capability = record.capability;

            if let Err(e) = self.metadata.set(id, &record.key, record.value.clone()).await {
                error!(
                    attachment_id = %id,
                    capability = %capability,
                    meta_key = %record.key,
                    error = %e,
                    "Failed to store capability record"
                );
                summary.store_errors += 1;
                continue;
            }

            if record.is_error {
                summary.failed.push(capability);
                continue;
            }
            summary.succeeded.push(capability);

            // A fresh success supersedes an error left by an earlier run
            self.clear_stale_error(id, capability, &mut summary).await;

            if let Some(CapabilityResult::Success(CapabilityPayload::Labels(labels))) =
                bundle.get(capability)
            {
                let names: Vec<String> = labels.iter().map(|l| l.name.clone()).collect();
                match self.attach_labels(id, &names).await {
                    Ok(attached) => summary.terms_attached += attached,
                    Err(e) => {
                        error!(
                            attachment_id = %id,
                            taxonomy = LABEL_TAXONOMY,
                            error = %e,
                            "Failed to attach label terms"
                        );
                        summary.store_errors += 1;
                    }
                }
            }
        }

        let blob = normalized.keywords.to_blob();
        if let Err(e) = self
            .metadata
            .set(id, KEYWORDS_META_KEY, Value::String(blob))
            .await
        {
            error!(attachment_id = %id, error = %e, "Failed to store keyword blob");
            summary.store_errors += 1;
        }

        debug!(
            attachment_id = %id,
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            terms_attached = summary.terms_attached,
            store_errors = summary.store_errors,
            "Enrichment results written"
        );

        summary
    }

    async fn attach_labels(&self, id: AttachmentId, names: &[String]) -> Result<usize, StorageError> {
        if names.is_empty() {
            return Ok(0);
        }
        self.taxonomy
            .attach_terms(id, LABEL_TAXONOMY, names, true)
            .await
    }

    async fn clear_stale_error(
        &self,
        id: AttachmentId,
        capability: Capability,
        summary: &mut WriteSummary,
    ) {
        if let Err(e) = self.metadata.delete(id, &capability.error_key()).await {
            error!(
                attachment_id = %id,
                capability = %capability,
                error = %e,
                "Failed to clear stale error record"
            );
            summary.store_errors += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::LabelRecord;
    use crate::services::normalizer::ResultNormalizer;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use uuid::Uuid;

    fn bundle() -> EnrichmentBundle {
        let mut bundle = EnrichmentBundle::new();
        bundle.insert(
            Capability::Labels,
            CapabilityResult::Success(CapabilityPayload::Labels(vec![
                LabelRecord {
                    name: "Cat".to_string(),
                    confidence: 95.2,
                },
                LabelRecord {
                    name: "Animal".to_string(),
                    confidence: 88.0,
                },
            ])),
        );
        bundle.insert(
            Capability::Faces,
            CapabilityResult::Failure("AccessDenied".to_string()),
        );
        bundle
    }

    #[tokio::test]
    async fn test_writes_records_terms_and_blob() {
        let store = Arc::new(MemoryStore::new());
        let writer = PersistenceWriter::new(store.clone(), store.clone());
        let id = Uuid::new_v4();
        let bundle = bundle();
        let normalized = ResultNormalizer::default().normalize(id, &bundle);

        let summary = writer.write(id, &bundle, &normalized).await;

        assert_eq!(summary.succeeded, vec![Capability::Labels]);
        assert_eq!(summary.failed, vec![Capability::Faces]);
        assert_eq!(summary.terms_attached, 2);
        assert!(summary.is_complete());
        assert_eq!(
            store.meta_keys(id),
            vec![
                "enrichment_error_faces",
                "enrichment_keywords",
                "enrichment_labels"
            ]
        );
        assert_eq!(
            store.get(id, KEYWORDS_META_KEY).await.unwrap(),
            Some(json!("Cat\nAnimal"))
        );
        assert_eq!(
            store.terms_for(id, LABEL_TAXONOMY).await.unwrap(),
            vec!["Cat", "Animal"]
        );
    }

    #[tokio::test]
    async fn test_rewrite_does_not_duplicate_terms() {
        let store = Arc::new(MemoryStore::new());
        let writer = PersistenceWriter::new(store.clone(), store.clone());
        let id = Uuid::new_v4();
        let bundle = bundle();
        let normalized = ResultNormalizer::default().normalize(id, &bundle);

        writer.write(id, &bundle, &normalized).await;
        let second = writer.write(id, &bundle, &normalized).await;

        assert_eq!(second.terms_attached, 0);
        assert_eq!(store.terms_for(id, LABEL_TAXONOMY).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_success_clears_previous_error() {
        let store = Arc::new(MemoryStore::new());
        let writer = PersistenceWriter::new(store.clone(), store.clone());
        let id = Uuid::new_v4();
        store
            .set(id, "enrichment_error_labels", json!({"code": "provider_error"}))
            .await
            .unwrap();

        let bundle = bundle();
        let normalized = ResultNormalizer::default().normalize(id, &bundle);
        writer.write(id, &bundle, &normalized).await;

        assert_eq!(store.get(id, "enrichment_error_labels").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_success_data() {
        let store = Arc::new(MemoryStore::new());
        let writer = PersistenceWriter::new(store.clone(), store.clone());
        let id = Uuid::new_v4();
        let earlier = json!([{"Gender": {"Value": "Female", "Confidence": 99.0}}]);
        store.set(id, "enrichment_faces", earlier.clone()).await.unwrap();

        let bundle = bundle();
        let normalized = ResultNormalizer::default().normalize(id, &bundle);
        writer.write(id, &bundle, &normalized).await;

        assert_eq!(store.get(id, "enrichment_faces").await.unwrap(), Some(earlier));
        assert_eq!(
            store.get(id, "enrichment_error_faces").await.unwrap().map(|v| v["message"].clone()),
            Some(json!("AccessDenied"))
        );
    }

    struct FailingMetadata;

    #[async_trait]
    impl MetadataStore for FailingMetadata {
        async fn get(&self, _: AttachmentId, _: &str) -> Result<Option<Value>, StorageError> {
            Ok(None)
        }

        async fn set(&self, _: AttachmentId, key: &str, _: Value) -> Result<(), StorageError> {
            if key == "enrichment_error_faces" {
                return Err(StorageError::ObjectStorage("disk full".to_string()));
            }
            Ok(())
        }

        async fn delete(&self, _: AttachmentId, _: &str) -> Result<bool, StorageError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_store_failure_does_not_stop_other_writes() {
        let terms = Arc::new(MemoryStore::new());
        let writer = PersistenceWriter::new(Arc::new(FailingMetadata), terms.clone());
        let id = Uuid::new_v4();
        let bundle = bundle();
        let normalized = ResultNormalizer::default().normalize(id, &bundle);

        let summary = writer.write(id, &bundle, &normalized).await;

        assert_eq!(summary.store_errors, 1);
        assert_eq!(summary.succeeded, vec![Capability::Labels]);
        assert!(summary.failed.is_empty());
        assert_eq!(summary.terms_attached, 2);
    }
}
