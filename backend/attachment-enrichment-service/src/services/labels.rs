//! Stored label lookup and admin preview text
use crate::models::{AttachmentId, Capability};
use crate::providers::LabelRecord;
use crate::storage::{MetadataStore, StorageError};
use tracing::warn;

/// Labels stored for an attachment; empty when none were stored
pub async fn get_attachment_labels(
    metadata: &dyn MetadataStore,
    id: AttachmentId,
) -> Result<Vec<LabelRecord>, StorageError> {
    let Some(value) = metadata.get(id, &Capability::Labels.data_key()).await? else {
        return Ok(Vec::new());
    };

    match serde_json::from_value::<Vec<LabelRecord>>(value) {
        Ok(labels) => Ok(labels),
        Err(e) => {
            warn!(attachment_id = %id, error = %e, "Stored labels are not a label list");
            Ok(Vec::new())
        }
    }
}

/// `Cat (95%), Animal (88%)`
pub fn render_label_preview(labels: &[LabelRecord]) -> String {
    labels
        .iter()
        .map(|label| format!("{} ({}%)", label.name, percent(label.confidence)))
        .collect::<Vec<_>>()
        .join(", ")
}

// Round to two decimals, then drop the fraction
fn percent(confidence: f32) -> i64 {
    let rounded = (f64::from(confidence) * 100.0).round() / 100.0;
    rounded.trunc() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;
    use uuid::Uuid;

    fn label(name: &str, confidence: f32) -> LabelRecord {
        LabelRecord {
            name: name.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_preview_format() {
        let labels = vec![label("Cat", 95.2), label("Animal", 88.0)];
        assert_eq!(render_label_preview(&labels), "Cat (95%), Animal (88%)");
    }

    #[test]
    fn test_preview_rounds_before_truncating() {
        assert_eq!(render_label_preview(&[label("Dog", 89.999)]), "Dog (90%)");
        assert_eq!(render_label_preview(&[label("Dog", 89.6)]), "Dog (89%)");
        assert_eq!(render_label_preview(&[]), "");
    }

    #[tokio::test]
    async fn test_get_attachment_labels() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        assert!(get_attachment_labels(&store, id).await.unwrap().is_empty());

        store
            .set(
                id,
                "enrichment_labels",
                json!([{"Name": "Cat", "Confidence": 95.2}]),
            )
            .await
            .unwrap();
        let labels = get_attachment_labels(&store, id).await.unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].name, "Cat");

        store.set(id, "enrichment_labels", json!("garbage")).await.unwrap();
        assert!(get_attachment_labels(&store, id).await.unwrap().is_empty());
    }
}
