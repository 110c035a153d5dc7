//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use attachment_enrichment_service::jobs::{JobScheduler, ScheduledJob, SchedulerError};
use attachment_enrichment_service::providers::{
    CelebrityRecord, FaceAttribute, FaceRecord, LabelRecord, ModerationLabelRecord,
    TextDetectionRecord, VisionProvider,
};
use attachment_enrichment_service::storage::{AttachmentFiles, MemoryStore};
use attachment_enrichment_service::{
    CapabilityOrchestrator, EnrichmentHooks, EnrichmentJobRunner, EnrichmentPolicy,
    ImageReference, PersistenceWriter, ProviderError, ResultNormalizer,
};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Provider returning fixed responses per capability
pub struct ScriptedProvider {
    pub labels: Result<Vec<LabelRecord>, ProviderError>,
    pub moderation: Result<Vec<ModerationLabelRecord>, ProviderError>,
    pub faces: Result<Vec<FaceRecord>, ProviderError>,
    pub celebrities: Result<Vec<CelebrityRecord>, ProviderError>,
    pub text: Result<Vec<TextDetectionRecord>, ProviderError>,
    pub text_supported: bool,
    pub calls: AtomicUsize,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self {
            labels: Ok(vec![]),
            moderation: Ok(vec![]),
            faces: Ok(vec![]),
            celebrities: Ok(vec![]),
            text: Ok(vec![]),
            text_supported: true,
            calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record<T: Clone>(&self, response: &Result<T, ProviderError>) -> Result<T, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        response.clone()
    }
}

#[async_trait]
impl VisionProvider for ScriptedProvider {
    fn supports_text_detection(&self) -> bool {
        self.text_supported
    }

    async fn detect_labels(
        &self,
        _image: &ImageReference,
        _min_confidence: f32,
    ) -> Result<Vec<LabelRecord>, ProviderError> {
        self.record(&self.labels)
    }

    async fn detect_moderation_labels(
        &self,
        _image: &ImageReference,
        _min_confidence: f32,
    ) -> Result<Vec<ModerationLabelRecord>, ProviderError> {
        self.record(&self.moderation)
    }

    async fn detect_faces(
        &self,
        _image: &ImageReference,
        _attributes: &[FaceAttribute],
    ) -> Result<Vec<FaceRecord>, ProviderError> {
        self.record(&self.faces)
    }

    async fn recognize_celebrities(
        &self,
        _image: &ImageReference,
    ) -> Result<Vec<CelebrityRecord>, ProviderError> {
        self.record(&self.celebrities)
    }

    async fn detect_text(
        &self,
        _image: &ImageReference,
    ) -> Result<Vec<TextDetectionRecord>, ProviderError> {
        self.record(&self.text)
    }
}

/// Scheduler that only records jobs
#[derive(Default)]
pub struct RecordingScheduler {
    pub jobs: Mutex<Vec<ScheduledJob>>,
}

impl RecordingScheduler {
    pub fn jobs(&self) -> Vec<ScheduledJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobScheduler for RecordingScheduler {
    async fn schedule_once(&self, job: ScheduledJob) -> Result<(), SchedulerError> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

pub fn label(name: &str, confidence: f32) -> LabelRecord {
    LabelRecord {
        name: name.to_string(),
        confidence,
    }
}

pub fn temp_file(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file
}

pub fn runner(
    provider: Arc<ScriptedProvider>,
    store: Arc<MemoryStore>,
    policy: EnrichmentPolicy,
    hooks: EnrichmentHooks,
) -> EnrichmentJobRunner {
    EnrichmentJobRunner::new(
        CapabilityOrchestrator::new(
            provider,
            store.clone(),
            Arc::new(AttachmentFiles::local()),
            policy,
            hooks.process,
        ),
        ResultNormalizer::new(hooks.keywords),
        PersistenceWriter::new(store.clone(), store),
    )
}
