//! Configuration for the attachment enrichment service
use crate::providers::FaceAttribute;
use crate::services::EnrichmentPolicy;
use serde::Deserialize;

/// Main configuration struct, loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database connection URL
    #[serde(default)]
    pub database_url: String,

    /// Kafka broker addresses
    #[serde(default = "default_kafka_brokers")]
    pub kafka_brokers: String,

    /// Topic carrying scheduled enrichment jobs
    #[serde(default = "default_kafka_jobs_topic")]
    pub kafka_jobs_topic: String,

    /// Topic receiving job messages that could not be decoded
    #[serde(default = "default_kafka_dlq_topic")]
    pub kafka_dlq_topic: String,

    /// Consumer group of the job worker
    #[serde(default = "default_kafka_group_id")]
    pub kafka_group_id: String,

    /// AWS region (falls back to the default region chain)
    #[serde(default)]
    pub aws_region: Option<String>,

    /// Static credentials for Rekognition/S3 (falls back to the default chain)
    #[serde(default)]
    pub rekognition_access_key_id: Option<String>,

    #[serde(default)]
    pub rekognition_secret_access_key: Option<String>,

    /// HTTP port for the hook and admin endpoints
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Secret used to sign admin tokens
    #[serde(default)]
    pub admin_token_secret: String,

    /// Admin token lifetime in seconds
    #[serde(default = "default_admin_token_ttl")]
    pub admin_token_ttl_seconds: i64,

    // ============================================
    // Enrichment policy
    // ============================================
    #[serde(default = "default_true")]
    pub enrich_labels: bool,

    #[serde(default)]
    pub enrich_moderation: bool,

    #[serde(default)]
    pub enrich_faces: bool,

    #[serde(default)]
    pub enrich_celebrities: bool,

    #[serde(default)]
    pub enrich_text: bool,

    /// Comma-separated face attributes
    #[serde(default = "default_face_attributes")]
    pub face_attributes: Vec<String>,

    /// Minimum confidence for labels and moderation labels
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    // ============================================
    // Backfill mode configuration
    // ============================================
    /// Batch size for backfill processing
    #[serde(default = "default_backfill_batch_size")]
    pub backfill_batch_size: u32,

    /// Maximum attachments to process in one run
    #[serde(default = "default_backfill_max_attachments")]
    pub backfill_max_attachments: u32,

    /// Delay between batches in milliseconds
    #[serde(default = "default_backfill_batch_delay_ms")]
    pub backfill_batch_delay_ms: u64,

    /// Rate limit for scheduling during backfill (requests per second)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rps: u32,
}

fn default_true() -> bool {
    true
}

fn default_kafka_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_kafka_jobs_topic() -> String {
    "attachment-enrichment.jobs".to_string()
}

fn default_kafka_dlq_topic() -> String {
    "attachment-enrichment.jobs.dlq".to_string()
}

fn default_kafka_group_id() -> String {
    "attachment-enrichment-worker".to_string()
}

fn default_http_port() -> u16 {
    8090
}

fn default_admin_token_ttl() -> i64 {
    86400 // 1 day
}

fn default_face_attributes() -> Vec<String> {
    FaceAttribute::defaults()
        .iter()
        .map(|a| a.as_str().to_string())
        .collect()
}

fn default_min_confidence() -> f32 {
    80.0
}

fn default_backfill_batch_size() -> u32 {
    100
}

fn default_backfill_max_attachments() -> u32 {
    10000
}

fn default_backfill_batch_delay_ms() -> u64 {
    100
}

fn default_rate_limit() -> u32 {
    10
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Build the enrichment policy from the toggles in this config
    pub fn enrichment_policy(&self) -> Result<EnrichmentPolicy, String> {
        let face_attributes = self
            .face_attributes
            .iter()
            .filter(|a| !a.trim().is_empty())
            .map(|a| a.parse::<FaceAttribute>())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(EnrichmentPolicy {
            labels: self.enrich_labels,
            moderation: self.enrich_moderation,
            faces: self.enrich_faces,
            celebrities: self.enrich_celebrities,
            text: self.enrich_text,
            face_attributes,
            min_confidence: self.min_confidence,
            capability_override: None,
            face_attributes_override: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Capability;
    use uuid::Uuid;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        envy::from_iter(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .expect("config")
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert!(config.enrich_labels);
        assert!(!config.enrich_faces);
        assert_eq!(config.min_confidence, 80.0);
        assert_eq!(config.kafka_jobs_topic, "attachment-enrichment.jobs");

        let policy = config.enrichment_policy().unwrap();
        assert_eq!(policy.face_attributes, FaceAttribute::defaults());
        assert_eq!(
            policy.enabled_capabilities(Uuid::new_v4()),
            vec![Capability::Labels]
        );
    }

    #[test]
    fn test_toggles_and_attributes_from_env() {
        let config = config_from(&[
            ("ENRICH_LABELS", "false"),
            ("ENRICH_FACES", "true"),
            ("ENRICH_TEXT", "true"),
            ("FACE_ATTRIBUTES", "Emotions,Gender"),
        ]);
        let policy = config.enrichment_policy().unwrap();
        assert_eq!(
            policy.face_attributes,
            vec![FaceAttribute::Emotions, FaceAttribute::Gender]
        );
        assert_eq!(
            policy.enabled_capabilities(Uuid::new_v4()),
            vec![Capability::Faces, Capability::Text]
        );
    }

    #[test]
    fn test_unknown_face_attribute_rejected() {
        let config = config_from(&[("FACE_ATTRIBUTES", "Emotions,Mood")]);
        assert!(config.enrichment_policy().is_err());
    }
}
