//! Enrichment job producer
//!
//! Publishes scheduled jobs, and undecodable messages to the DLQ.

use crate::jobs::{JobScheduler, ScheduledJob, SchedulerError};
use crate::kafka::events::{EnrichmentDeadLetterEvent, EnrichmentJobRequested};
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// [`JobScheduler`] backed by a Kafka topic
pub struct KafkaJobScheduler {
    producer: FutureProducer,
    jobs_topic: String,
    dlq_topic: String,
    delivery_timeout: Duration,
}

impl KafkaJobScheduler {
    pub fn new(
        brokers: &str,
        jobs_topic: impl Into<String>,
        dlq_topic: impl Into<String>,
    ) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("max.in.flight.requests.per.connection", "5")
            .set("retries", "3")
            .set("compression.type", "lz4")
            .set("linger.ms", "10")
            .set("message.timeout.ms", "30000")
            .create()?;

        info!("Enrichment job producer initialized with brokers: {}", brokers);

        Ok(Self {
            producer,
            jobs_topic: jobs_topic.into(),
            dlq_topic: dlq_topic.into(),
            delivery_timeout: Duration::from_secs(30),
        })
    }

    pub fn jobs_topic(&self) -> &str {
        &self.jobs_topic
    }

    /// Send failed event to dead letter queue
    pub async fn send_to_dlq(
        &self,
        original_topic: &str,
        original_event: serde_json::Value,
        error: &str,
        retry_count: u32,
    ) -> Result<(), SchedulerError> {
        let dlq_event = EnrichmentDeadLetterEvent {
            original_event,
            original_topic: original_topic.to_string(),
            error: error.to_string(),
            retry_count,
            failed_at: chrono::Utc::now().timestamp_millis(),
        };

        let payload = serde_json::to_string(&dlq_event)
            .map_err(|e| SchedulerError::Serialization(e.to_string()))?;

        let key = Uuid::new_v4().to_string();

        let record = FutureRecord::to(&self.dlq_topic)
            .key(&key)
            .payload(&payload);

        match self.producer.send(record, self.delivery_timeout).await {
            Ok(_) => {
                warn!(
                    original_topic = original_topic,
                    retry_count = retry_count,
                    "Sent event to DLQ"
                );
                Ok(())
            }
            Err((err, _)) => {
                error!(
                    original_topic = original_topic,
                    error = %err,
                    "Failed to send event to DLQ"
                );
                Err(SchedulerError::Kafka(err.to_string()))
            }
        }
    }
}

#[async_trait]
impl JobScheduler for KafkaJobScheduler {
    async fn schedule_once(&self, job: ScheduledJob) -> Result<(), SchedulerError> {
        let event = EnrichmentJobRequested::new(&job);
        let payload = serde_json::to_string(&event)
            .map_err(|e| SchedulerError::Serialization(e.to_string()))?;

        let key = event.attachment_id.to_string();

        let record = FutureRecord::to(&self.jobs_topic)
            .key(&key)
            .payload(&payload);

        match self.producer.send(record, self.delivery_timeout).await {
            Ok((partition, offset)) => {
                info!(
                    attachment_id = %event.attachment_id,
                    job = %event.job,
                    partition = partition,
                    offset = offset,
                    "Published enrichment job"
                );
                Ok(())
            }
            Err((err, _)) => {
                error!(
                    attachment_id = %event.attachment_id,
                    error = %err,
                    "Failed to publish enrichment job"
                );
                Err(SchedulerError::Kafka(err.to_string()))
            }
        }
    }
}

/// Shared producer instance
pub type SharedKafkaJobScheduler = Arc<KafkaJobScheduler>;
