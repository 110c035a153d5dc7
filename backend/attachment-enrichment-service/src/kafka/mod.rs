//! Kafka integration for enrichment jobs
//!
//! - Producer: [`KafkaJobScheduler`] publishes scheduled jobs
//! - Consumer: [`EnrichmentJobConsumer`] executes them once due
//! - Events: Kafka message schemas

pub mod consumer;
pub mod events;
pub mod producer;

pub use consumer::{EnrichmentConsumerConfig, EnrichmentConsumerError, EnrichmentJobConsumer};
pub use events::{topics, EnrichmentDeadLetterEvent, EnrichmentJobRequested};
pub use producer::{KafkaJobScheduler, SharedKafkaJobScheduler};
