//! Enrichment job runner: orchestrate, normalize, persist
use super::normalizer::ResultNormalizer;
use super::orchestrator::CapabilityOrchestrator;
use super::writer::{PersistenceWriter, WriteSummary};
use crate::jobs::{JobHandler, ScheduledJob, ENRICHMENT_JOB};
use crate::models::{AttachmentId, Capability};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{error, info, warn};

/// Result of one enrichment run
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentOutcome {
    Completed {
        succeeded: Vec<Capability>,
        failed: Vec<Capability>,
        keywords: usize,
        write: WriteSummary,
    },
    Aborted {
        reason: String,
    },
}

impl EnrichmentOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, EnrichmentOutcome::Completed { .. })
    }
}

/// Executes `attachment_enrichment.update_image` jobs
pub struct EnrichmentJobRunner {
    orchestrator: CapabilityOrchestrator,
    normalizer: ResultNormalizer,
    writer: PersistenceWriter,
}

impl EnrichmentJobRunner {
    pub fn new(
        orchestrator: CapabilityOrchestrator,
        normalizer: ResultNormalizer,
        writer: PersistenceWriter,
    ) -> Self {
        Self {
            orchestrator,
            normalizer,
            writer,
        }
    }

    /// Run the full pipeline for one attachment. Failures are logged and
    /// reported in the outcome.
    pub async fn run(&self, id: AttachmentId) -> EnrichmentOutcome {
        let start = Instant::now();

        let bundle = match self.orchestrator.enrich(id).await {
            Ok(bundle) => bundle,
            Err(e) => {
                error!(attachment_id = %id, error = %e, "Enrichment run aborted");
                return EnrichmentOutcome::Aborted {
                    reason: e.to_string(),
                };
            }
        };

        let normalized = self.normalizer.normalize(id, &bundle);
        let keywords = normalized.keywords.len();
        let write = self.writer.write(id, &bundle, &normalized).await;

        info!(
            attachment_id = %id,
            succeeded = bundle.succeeded().len(),
            failed = bundle.failed().len(),
            keywords = keywords,
            store_errors = write.store_errors,
            elapsed_ms = start.elapsed().as_millis(),
            "Enrichment run complete"
        );

        EnrichmentOutcome::Completed {
            succeeded: bundle.succeeded(),
            failed: bundle.failed(),
            keywords,
            write,
        }
    }
}

#[async_trait]
impl JobHandler for EnrichmentJobRunner {
    async fn execute(&self, job: &ScheduledJob) {
        if job.job != ENRICHMENT_JOB {
            warn!(job = %job.job, attachment_id = %job.attachment_id, "Ignoring unknown job");
            return;
        }
        self.run(job.attachment_id).await;
    }
}
