//! Capability orchestration for one attachment
use super::image_reference::resolve_image_reference;
use super::policy::{EnrichmentPolicy, ProcessHook};
use crate::models::{
    AttachmentId, Capability, CapabilityPayload, CapabilityResult, EnrichmentBundle,
    ImageReference,
};
use crate::providers::VisionProvider;
use crate::storage::{AttachmentRepository, FileSource};
use crate::EnrichmentError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs every enabled capability against one attachment's image
pub struct CapabilityOrchestrator {
    provider: Arc<dyn VisionProvider>,
    attachments: Arc<dyn AttachmentRepository>,
    files: Arc<dyn FileSource>,
    policy: EnrichmentPolicy,
    process_hooks: Vec<ProcessHook>,
}

impl CapabilityOrchestrator {
    pub fn new(
        provider: Arc<dyn VisionProvider>,
        attachments: Arc<dyn AttachmentRepository>,
        files: Arc<dyn FileSource>,
        policy: EnrichmentPolicy,
        process_hooks: Vec<ProcessHook>,
    ) -> Self {
        Self {
            provider,
            attachments,
            files,
            policy,
            process_hooks,
        }
    }

    pub fn policy(&self) -> &EnrichmentPolicy {
        &self.policy
    }

    /// Resolve the attachment's image once and call each enabled capability
    /// in order. Provider failures become [`CapabilityResult::Failure`];
    /// only attachment resolution errors are returned.
    pub async fn enrich(&self, id: AttachmentId) -> Result<EnrichmentBundle, EnrichmentError> {
        let file = self
            .attachments
            .attached_file(id)
            .await?
            .ok_or(EnrichmentError::AttachmentNotFound(id))?;

        let image = resolve_image_reference(&file, self.files.as_ref()).await?;
        let start = Instant::now();
        let mut bundle = EnrichmentBundle::new();

        for capability in Capability::ALL {
            if !self.policy.is_enabled(capability, id) {
                continue;
            }

            if capability == Capability::Text && !self.provider.supports_text_detection() {
                debug!(attachment_id = %id, "Provider has no text detection, skipping");
                continue;
            }

            let result = self.call(capability, id, &image).await;
            match &result {
                CapabilityResult::Success(payload) => {
                    debug!(
                        attachment_id = %id,
                        capability = %capability,
                        records = payload.len(),
                        "Capability succeeded"
                    );
                }
                CapabilityResult::Failure(message) => {
                    warn!(
                        attachment_id = %id,
                        capability = %capability,
                        error = %message,
                        "Capability failed"
                    );
                }
            }
            bundle.insert(capability, result);
        }

        for hook in &self.process_hooks {
            hook(self.provider.as_ref(), id);
        }

        info!(
            attachment_id = %id,
            capabilities = bundle.len(),
            failed = bundle.failed().len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Enrichment calls complete"
        );

        Ok(bundle)
    }

    async fn call(
        &self,
        capability: Capability,
        id: AttachmentId,
        image: &ImageReference,
    ) -> CapabilityResult {
        let min_confidence = self.policy.min_confidence;

        let outcome = match capability {
            Capability::Labels => self
                .provider
                .detect_labels(image, min_confidence)
                .await
                .map(|mut labels| {
                    labels.retain(|l| l.confidence >= min_confidence);
                    CapabilityPayload::Labels(labels)
                }),
            Capability::Moderation => self
                .provider
                .detect_moderation_labels(image, min_confidence)
                .await
                .map(|mut labels| {
                    labels.retain(|l| l.confidence >= min_confidence);
                    CapabilityPayload::Moderation(labels)
                }),
            Capability::Faces => self
                .provider
                .detect_faces(image, &self.policy.face_attributes_for(id))
                .await
                .map(CapabilityPayload::Faces),
            Capability::Celebrities => self
                .provider
                .recognize_celebrities(image)
                .await
                .map(CapabilityPayload::Celebrities),
            Capability::Text => self
                .provider
                .detect_text(image)
                .await
                .map(CapabilityPayload::Text),
        };

        match outcome {
            Ok(payload) => CapabilityResult::Success(payload),
            Err(err) => CapabilityResult::Failure(err.to_string()),
        }
    }
}
