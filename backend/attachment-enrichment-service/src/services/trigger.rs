//! Upload trigger: sniff new attachments and enqueue enrichment
use super::image_type::{detect_image_type, ImageType, SNIFF_LEN};
use crate::jobs::{JobScheduler, ScheduledJob};
use crate::models::AttachmentId;
use crate::storage::{AttachmentRepository, FileSource};
use crate::EnrichmentError;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Why an attachment was or was not scheduled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    Scheduled(ImageType),
    NoFile,
    Unreadable(String),
    UnsupportedType,
}

impl TriggerDecision {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, TriggerDecision::Scheduled(_))
    }
}

pub struct UploadTrigger {
    attachments: Arc<dyn AttachmentRepository>,
    files: Arc<dyn FileSource>,
    scheduler: Arc<dyn JobScheduler>,
}

impl UploadTrigger {
    pub fn new(
        attachments: Arc<dyn AttachmentRepository>,
        files: Arc<dyn FileSource>,
        scheduler: Arc<dyn JobScheduler>,
    ) -> Self {
        Self {
            attachments,
            files,
            scheduler,
        }
    }

    /// Metadata-changed notification from the host. The metadata is always
    /// handed back unchanged.
    pub async fn on_update_attachment_metadata(&self, id: AttachmentId, metadata: Value) -> Value {
        match self.maybe_schedule(id).await {
            Ok(TriggerDecision::Scheduled(image_type)) => {
                info!(attachment_id = %id, image_type = %image_type, "Enrichment scheduled");
            }
            Ok(decision) => {
                debug!(attachment_id = %id, decision = ?decision, "Attachment not scheduled");
            }
            Err(e) => {
                error!(attachment_id = %id, error = %e, "Failed to schedule enrichment");
            }
        }
        metadata
    }

    /// Sniff the attached file and enqueue one enrichment job for supported
    /// image types. Only scheduling failures are errors.
    pub async fn maybe_schedule(&self, id: AttachmentId) -> Result<TriggerDecision, EnrichmentError> {
        let file = match self.attachments.attached_file(id).await {
            Ok(Some(file)) => file,
            Ok(None) => return Ok(TriggerDecision::NoFile),
            Err(e) => return Ok(TriggerDecision::Unreadable(e.to_string())),
        };

        let head = match self.files.read_head(&file, SNIFF_LEN).await {
            Ok(head) => head,
            Err(e) => return Ok(TriggerDecision::Unreadable(e.to_string())),
        };

        let Some(image_type) = detect_image_type(&head) else {
            return Ok(TriggerDecision::UnsupportedType);
        };

        self.schedule(id).await?;
        Ok(TriggerDecision::Scheduled(image_type))
    }

    /// Enqueue an enrichment job for now, without sniffing
    pub async fn schedule(&self, id: AttachmentId) -> Result<(), EnrichmentError> {
        self.scheduler
            .schedule_once(ScheduledJob::enrichment(id, Utc::now()))
            .await?;
        Ok(())
    }
}
