//! Enrichment pipeline
//!
//! - [`UploadTrigger`]: sniffs new attachments and enqueues enrichment jobs
//! - [`CapabilityOrchestrator`]: calls every enabled provider capability
//! - [`ResultNormalizer`]: metadata records and the deduplicated keyword set
//! - [`PersistenceWriter`]: metadata upserts, label terms, keyword blob
//! - [`EnrichmentJobRunner`]: the three steps above as one job
//! - [`SearchQueryAugmenter`]: widens attachment searches to stored keywords

pub mod enrichment;
pub mod image_reference;
pub mod image_type;
pub mod labels;
pub mod normalizer;
pub mod orchestrator;
pub mod policy;
pub mod search;
pub mod trigger;
pub mod writer;

pub use enrichment::{EnrichmentJobRunner, EnrichmentOutcome};
pub use image_reference::{parse_s3_uri, resolve_image_reference};
pub use image_type::{detect_image_type, ImageType};
pub use labels::{get_attachment_labels, render_label_preview};
pub use normalizer::{MetadataRecord, NormalizedBundle, ResultNormalizer};
pub use orchestrator::CapabilityOrchestrator;
pub use policy::{CapabilityOverride, EnrichmentHooks, EnrichmentPolicy, KeywordHook, ProcessHook};
pub use search::{ContentQuery, SearchQueryAugmenter};
pub use trigger::{TriggerDecision, UploadTrigger};
pub use writer::{PersistenceWriter, WriteSummary};
