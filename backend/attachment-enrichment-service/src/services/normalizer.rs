//! Result normalization: metadata records and search keywords
use super::policy::KeywordHook;
use crate::models::{
    AttachmentId, Capability, CapabilityPayload, CapabilityResult, EnrichmentBundle, KeywordSet,
};
use serde_json::{json, Value};
use tracing::warn;

/// A value to persist under one capability-scoped metadata key
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    pub capability: Capability,
    pub key: String,
    pub value: Value,
    pub is_error: bool,
}

/// Everything the writer persists for one run
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBundle {
    pub records: Vec<MetadataRecord>,
    pub keywords: KeywordSet,
}

/// Error record stored for a failed capability
pub fn error_record(message: &str) -> Value {
    json!({
        "code": "provider_error",
        "message": message,
    })
}

/// Keyword candidates contributed by one successful capability
pub fn keyword_candidates(payload: &CapabilityPayload) -> Vec<String> {
    match payload {
        CapabilityPayload::Labels(labels) => labels.iter().map(|l| l.name.clone()).collect(),
        CapabilityPayload::Moderation(labels) => labels.iter().map(|l| l.name.clone()).collect(),
        CapabilityPayload::Faces(faces) => {
            let mut candidates = Vec::new();
            for face in faces {
                if let Some(gender) = &face.gender {
                    candidates.push(gender.value.clone());
                }
                if let Some(emotions) = &face.emotions {
                    candidates.extend(emotions.iter().map(|e| e.kind.clone()));
                }
            }
            candidates
        }
        CapabilityPayload::Celebrities(celebrities) => {
            celebrities.iter().map(|c| c.name.clone()).collect()
        }
        CapabilityPayload::Text(detections) => detections
            .iter()
            .map(|t| t.detected_text.clone())
            .collect(),
    }
}

/// Shapes an [`EnrichmentBundle`] into persistable records and keywords
#[derive(Clone, Default)]
pub struct ResultNormalizer {
    keyword_hooks: Vec<KeywordHook>,
}

impl ResultNormalizer {
    pub fn new(keyword_hooks: Vec<KeywordHook>) -> Self {
        Self { keyword_hooks }
    }

    pub fn normalize(&self, id: AttachmentId, bundle: &EnrichmentBundle) -> NormalizedBundle {
        let mut records = Vec::with_capacity(bundle.len());
        let mut candidates: Vec<String> = Vec::new();

        for (capability, result) in bundle.iter() {
            match result {
                CapabilityResult::Success(payload) => match serde_json::to_value(payload) {
                    Ok(value) => {
                        candidates.extend(keyword_candidates(payload));
                        records.push(MetadataRecord {
                            capability,
                            key: capability.data_key(),
                            value,
                            is_error: false,
                        });
                    }
                    Err(e) => {
                        warn!(
                            attachment_id = %id,
                            capability = %capability,
                            error = %e,
                            "Failed to serialize capability result"
                        );
                        records.push(MetadataRecord {
                            capability,
                            key: capability.error_key(),
                            value: error_record(&format!("serialization failed: {}", e)),
                            is_error: true,
                        });
                    }
                },
                CapabilityResult::Failure(message) => records.push(MetadataRecord {
                    capability,
                    key: capability.error_key(),
                    value: error_record(message),
                    is_error: true,
                }),
            }
        }

        let mut keywords = KeywordSet::from_candidates(candidates).into_vec();
        for hook in &self.keyword_hooks {
            keywords = hook(keywords, bundle, id);
        }

        NormalizedBundle {
            records,
            keywords: KeywordSet::from_candidates(keywords),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        CelebrityRecord, EmotionRecord, FaceRecord, GenderRecord, LabelRecord,
        ModerationLabelRecord, TextDetectionRecord,
    };
    use std::sync::Arc;
    use uuid::Uuid;

    fn labels(names: &[(&str, f32)]) -> CapabilityResult {
        CapabilityResult::Success(CapabilityPayload::Labels(
            names
                .iter()
                .map(|(n, c)| LabelRecord {
                    name: n.to_string(),
                    confidence: *c,
                })
                .collect(),
        ))
    }

    #[test]
    fn test_labels_become_records_and_keywords() {
        let mut bundle = EnrichmentBundle::new();
        bundle.insert(Capability::Labels, labels(&[("Cat", 95.2), ("Animal", 88.0)]));

        let normalized = ResultNormalizer::default().normalize(Uuid::new_v4(), &bundle);

        assert_eq!(normalized.records.len(), 1);
        let record = &normalized.records[0];
        assert_eq!(record.key, "enrichment_labels");
        assert!(!record.is_error);
        assert_eq!(record.value[0]["Name"], "Cat");
        assert_eq!(normalized.keywords.to_blob(), "Cat\nAnimal");
    }

    #[test]
    fn test_failures_store_error_records_without_keywords() {
        let mut bundle = EnrichmentBundle::new();
        bundle.insert(Capability::Labels, labels(&[("Cat", 95.2)]));
        bundle.insert(
            Capability::Faces,
            CapabilityResult::Failure("AccessDenied".to_string()),
        );

        let normalized = ResultNormalizer::default().normalize(Uuid::new_v4(), &bundle);

        let keys: Vec<&str> = normalized.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["enrichment_labels", "enrichment_error_faces"]);
        assert_eq!(normalized.records[1].value["message"], "AccessDenied");
        assert_eq!(normalized.keywords.into_vec(), vec!["Cat"]);
    }

    #[test]
    fn test_overlapping_keywords_are_collapsed() {
        let face = FaceRecord {
            gender: Some(GenderRecord {
                value: "Female".to_string(),
                confidence: 99.0,
            }),
            emotions: Some(vec![
                EmotionRecord {
                    kind: "HAPPY".to_string(),
                    confidence: 90.0,
                },
                EmotionRecord {
                    kind: String::new(),
                    confidence: 1.0,
                },
            ]),
            ..FaceRecord::default()
        };

        let mut bundle = EnrichmentBundle::new();
        bundle.insert(Capability::Labels, labels(&[("Person", 99.0), ("Female", 90.0)]));
        bundle.insert(
            Capability::Faces,
            CapabilityResult::Success(CapabilityPayload::Faces(vec![face.clone(), face])),
        );
        bundle.insert(
            Capability::Celebrities,
            CapabilityResult::Success(CapabilityPayload::Celebrities(vec![CelebrityRecord {
                name: "Person".to_string(),
                id: None,
                match_confidence: Some(97.0),
                urls: vec![],
            }])),
        );
        bundle.insert(
            Capability::Text,
            CapabilityResult::Success(CapabilityPayload::Text(vec![
                TextDetectionRecord {
                    detected_text: "HAPPY".to_string(),
                    kind: Some("LINE".to_string()),
                    id: Some(0),
                    parent_id: None,
                    confidence: Some(99.0),
                },
                TextDetectionRecord {
                    detected_text: "  ".to_string(),
                    kind: Some("WORD".to_string()),
                    id: Some(1),
                    parent_id: Some(0),
                    confidence: Some(99.0),
                },
            ])),
        );

        let normalized = ResultNormalizer::default().normalize(Uuid::new_v4(), &bundle);
        assert_eq!(
            normalized.keywords.into_vec(),
            vec!["Person", "Female", "HAPPY"]
        );
    }

    #[test]
    fn test_keyword_hooks_run_in_order_and_are_resanitized() {
        let mut bundle = EnrichmentBundle::new();
        bundle.insert(Capability::Labels, labels(&[("Cat", 95.2)]));

        let add_pet: KeywordHook = Arc::new(|mut keywords: Vec<String>, _: &EnrichmentBundle, _: AttachmentId| {
            keywords.push("pet".to_string());
            keywords.push(String::new());
            keywords
        });
        let add_pet_again: KeywordHook =
            Arc::new(|mut keywords: Vec<String>, _: &EnrichmentBundle, _: AttachmentId| {
                keywords.push("pet".to_string());
                keywords
            });
        let normalizer = ResultNormalizer::new(vec![add_pet, add_pet_again]);

        let normalized = normalizer.normalize(Uuid::new_v4(), &bundle);
        assert_eq!(normalized.keywords.into_vec(), vec!["Cat", "pet"]);
    }

    #[test]
    fn test_moderation_names_become_keywords() {
        let mut bundle = EnrichmentBundle::new();
        bundle.insert(Capability::Labels, labels(&[("Beach", 92.0)]));
        bundle.insert(
            Capability::Moderation,
            CapabilityResult::Success(CapabilityPayload::Moderation(vec![
                ModerationLabelRecord {
                    name: "Swimwear".to_string(),
                    confidence: 80.0,
                    parent_name: Some("Suggestive".to_string()),
                },
                ModerationLabelRecord {
                    name: "Beach".to_string(),
                    confidence: 85.0,
                    parent_name: None,
                },
            ])),
        );

        let normalized = ResultNormalizer::default().normalize(Uuid::new_v4(), &bundle);

        let moderation = &normalized.records[1];
        assert_eq!(moderation.key, "enrichment_moderation");
        assert_eq!(moderation.value[0]["Name"], "Swimwear");
        assert_eq!(moderation.value[0]["ParentName"], "Suggestive");
        assert_eq!(normalized.keywords.to_blob(), "Beach\nSwimwear");
    }
}
