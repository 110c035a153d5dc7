//! Enrichment job consumer
//!
//! Consumes scheduled jobs and runs them once due.

use crate::jobs::{JobHandler, ScheduledJob};
use crate::kafka::events::{topics, EnrichmentJobRequested};
use crate::kafka::producer::SharedKafkaJobScheduler;
use chrono::{DateTime, Utc};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Job consumer configuration
#[derive(Debug, Clone)]
pub struct EnrichmentConsumerConfig {
    pub brokers: String,
    pub group_id: String,
    pub topic: String,
    pub retry_backoff_ms: u64,
    pub max_retry_backoff_ms: u64,
}

impl Default for EnrichmentConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "attachment-enrichment-worker".to_string(),
            topic: topics::ENRICHMENT_JOBS.to_string(),
            retry_backoff_ms: 100,
            max_retry_backoff_ms: 30_000,
        }
    }
}

/// Executes jobs from the jobs topic, one message at a time
pub struct EnrichmentJobConsumer {
    consumer: StreamConsumer,
    config: EnrichmentConsumerConfig,
    handler: Arc<dyn JobHandler>,
    dlq: Option<SharedKafkaJobScheduler>,
}

impl EnrichmentJobConsumer {
    pub fn new(
        config: EnrichmentConsumerConfig,
        handler: Arc<dyn JobHandler>,
        dlq: Option<SharedKafkaJobScheduler>,
    ) -> Result<Self, rdkafka::error::KafkaError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false") // Manual commit for reliability
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .set("enable.partition.eof", "false")
            .create()?;

        consumer.subscribe(&[config.topic.as_str()])?;

        info!("Enrichment job consumer subscribed to: {}", config.topic);

        Ok(Self {
            consumer,
            config,
            handler,
            dlq,
        })
    }

    /// Start consuming messages
    pub async fn run(&self) -> Result<(), EnrichmentConsumerError> {
        use futures_util::StreamExt;

        info!("Starting enrichment job consumer loop");

        let mut message_stream = self.consumer.stream();
        let mut backoff_ms = self.config.retry_backoff_ms;

        loop {
            match message_stream.next().await {
                Some(Ok(message)) => {
                    backoff_ms = self.config.retry_backoff_ms;

                    if let Some(payload) = message.payload() {
                        match decode_job(payload) {
                            Ok(job) => self.process_job(job).await,
                            Err(e) => {
                                warn!("Failed to deserialize job message: {}", e);
                                self.dead_letter(payload, &e.to_string()).await;
                            }
                        }
                    }

                    if let Err(e) = self.consumer.commit_message(&message, CommitMode::Async) {
                        warn!("Failed to commit offset: {}", e);
                    }
                }
                Some(Err(e)) => {
                    error!("Kafka consumer error: {}", e);

                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms * 2).min(self.config.max_retry_backoff_ms);
                }
                None => {
                    warn!("Message stream ended, reconnecting...");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn process_job(&self, job: ScheduledJob) {
        let wait = delay_until(job.run_at, Utc::now());
        if !wait.is_zero() {
            debug!(
                attachment_id = %job.attachment_id,
                wait_ms = wait.as_millis(),
                "Job not due yet, waiting"
            );
            tokio::time::sleep(wait).await;
        }

        info!(attachment_id = %job.attachment_id, job = %job.job, "Executing job");
        self.handler.execute(&job).await;
    }

    async fn dead_letter(&self, payload: &[u8], error: &str) {
        let Some(dlq) = &self.dlq else {
            return;
        };

        let original = serde_json::from_slice(payload).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(payload).into_owned())
        });

        if let Err(e) = dlq.send_to_dlq(&self.config.topic, original, error, 0).await {
            error!("Failed to dead-letter job message: {}", e);
        }
    }
}

/// Decode a job message payload
pub fn decode_job(payload: &[u8]) -> Result<ScheduledJob, serde_json::Error> {
    serde_json::from_slice::<EnrichmentJobRequested>(payload).map(EnrichmentJobRequested::into_job)
}

/// Time left until `run_at`; zero once due
pub fn delay_until(run_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (run_at - now).to_std().unwrap_or_default()
}

/// Consumer error types
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentConsumerError {
    #[error("Kafka error: {0}")]
    Kafka(String),
}
