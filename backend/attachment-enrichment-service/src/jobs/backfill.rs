//! Enrichment backfill job
//!
//! Enqueues enrichment for existing attachments that have never been
//! enriched. Designed to run as a Kubernetes CronJob.

use crate::config::Config;
use crate::models::{AttachmentId, KEYWORDS_META_KEY};
use crate::services::UploadTrigger;
use crate::storage::AttachmentRepository;
use crate::EnrichmentError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Paging and pacing of a backfill run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillConfig {
    pub batch_size: u32,
    pub max_attachments: u32,
    pub batch_delay_ms: u64,
    /// Attachments sniffed per second; 0 disables pacing
    pub rate_limit_rps: u32,
}

impl From<&Config> for BackfillConfig {
    fn from(config: &Config) -> Self {
        Self {
            batch_size: config.backfill_batch_size,
            max_attachments: config.backfill_max_attachments,
            batch_delay_ms: config.backfill_batch_delay_ms,
            rate_limit_rps: config.rate_limit_rps,
        }
    }
}

/// Backfill job for attachments without stored keywords
pub struct BackfillJob {
    attachments: Arc<dyn AttachmentRepository>,
    trigger: Arc<UploadTrigger>,
    config: BackfillConfig,
}

impl BackfillJob {
    pub fn new(
        attachments: Arc<dyn AttachmentRepository>,
        trigger: Arc<UploadTrigger>,
        config: BackfillConfig,
    ) -> Self {
        Self {
            attachments,
            trigger,
            config,
        }
    }

    /// Run the backfill job
    pub async fn run(&self) -> Result<BackfillStats, EnrichmentError> {
        info!(
            batch_size = self.config.batch_size,
            max_attachments = self.config.max_attachments,
            rate_limit = self.config.rate_limit_rps,
            "Starting enrichment backfill job"
        );

        let mut stats = BackfillStats::default();
        let mut after: Option<AttachmentId> = None;
        let max_attachments = u64::from(self.config.max_attachments);
        let batch_delay = Duration::from_millis(self.config.batch_delay_ms);

        loop {
            if stats.total_processed >= max_attachments {
                info!(
                    processed = stats.total_processed,
                    "Reached max attachments limit, stopping"
                );
                break;
            }

            let remaining = max_attachments - stats.total_processed;
            let limit = u64::from(self.config.batch_size).min(remaining) as i64;

            let ids = self
                .attachments
                .attachments_missing_meta(KEYWORDS_META_KEY, after, limit)
                .await?;

            if ids.is_empty() {
                info!("No more attachments to backfill");
                break;
            }

            info!(
                batch = stats.batches_processed + 1,
                count = ids.len(),
                "Processing batch"
            );

            for id in &ids {
                match self.trigger.maybe_schedule(*id).await {
                    Ok(decision) if decision.is_scheduled() => {
                        stats.scheduled_count += 1;
                        debug!(attachment_id = %id, "Attachment scheduled");
                    }
                    Ok(decision) => {
                        stats.skipped_count += 1;
                        debug!(attachment_id = %id, decision = ?decision, "Attachment skipped");
                    }
                    Err(e) => {
                        stats.error_count += 1;
                        error!(attachment_id = %id, error = %e, "Failed to schedule attachment");
                    }
                }
                stats.total_processed += 1;

                if self.config.rate_limit_rps > 0 {
                    let delay_per_request =
                        Duration::from_millis(1000 / u64::from(self.config.rate_limit_rps));
                    tokio::time::sleep(delay_per_request).await;
                }
            }

            stats.batches_processed += 1;
            after = ids.last().copied();

            if !batch_delay.is_zero() {
                tokio::time::sleep(batch_delay).await;
            }
        }

        info!(
            total_processed = stats.total_processed,
            scheduled = stats.scheduled_count,
            skipped = stats.skipped_count,
            errors = stats.error_count,
            batches = stats.batches_processed,
            "Enrichment backfill job completed"
        );

        Ok(stats)
    }
}

/// Statistics from backfill run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackfillStats {
    pub total_processed: u64,
    pub scheduled_count: u64,
    pub skipped_count: u64,
    pub error_count: u64,
    pub batches_processed: u64,
}
