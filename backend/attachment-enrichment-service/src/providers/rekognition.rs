//! AWS Rekognition integration for image analysis
use super::{
    AgeRange, BoundingBox, CelebrityRecord, EmotionRecord, FaceAttribute, FaceRecord,
    GenderRecord, LabelRecord, ModerationLabelRecord, ProviderError, TextDetectionRecord,
    VisionProvider,
};
use crate::config::Config;
use crate::models::ImageReference;
use async_trait::async_trait;
use aws_sdk_rekognition::config::{Credentials, Region};
use aws_sdk_rekognition::error::DisplayErrorContext;
use aws_sdk_rekognition::primitives::Blob;
use aws_sdk_rekognition::types::{Attribute, Image, S3Object};
use aws_sdk_rekognition::Client;
use std::time::Instant;
use tracing::{debug, info};

/// Load the shared AWS configuration
///
/// Region and static credentials come from [`Config`] when set, otherwise the
/// default provider chains are used.
pub async fn load_aws_config(config: &Config) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

    if let Some(region) = &config.aws_region {
        loader = loader.region(Region::new(region.clone()));
    }

    if let (Some(access_key_id), Some(secret_access_key)) = (
        &config.rekognition_access_key_id,
        &config.rekognition_secret_access_key,
    ) {
        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "attachment_enrichment",
        );
        loader = loader.credentials_provider(credentials);
    }

    loader.load().await
}

/// Rekognition-backed [`VisionProvider`]
#[derive(Clone)]
pub struct RekognitionProvider {
    client: Client,
}

impl RekognitionProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(sdk_config))
    }
}

fn sdk_image(image: &ImageReference) -> Image {
    match image {
        ImageReference::S3Object { bucket, name } => Image::builder()
            .s3_object(S3Object::builder().bucket(bucket).name(name).build())
            .build(),
        ImageReference::Bytes(bytes) => Image::builder().bytes(Blob::new(bytes.clone())).build(),
    }
}

/// Map requested attributes onto the API's attribute set. Bounding box and
/// confidence are part of the default response.
fn sdk_attributes(attributes: &[FaceAttribute]) -> Vec<Attribute> {
    let mut mapped: Vec<Attribute> = Vec::new();
    for attribute in attributes {
        let sdk = match attribute {
            FaceAttribute::BoundingBox | FaceAttribute::Confidence => Attribute::Default,
            FaceAttribute::Emotions => Attribute::Emotions,
            FaceAttribute::AgeRange => Attribute::AgeRange,
            FaceAttribute::Gender => Attribute::Gender,
        };
        if !mapped.contains(&sdk) {
            mapped.push(sdk);
        }
    }
    mapped
}

fn request_error<E>(operation: &'static str, err: E) -> ProviderError
where
    E: std::error::Error,
{
    ProviderError::Request {
        operation,
        message: DisplayErrorContext(err).to_string(),
    }
}

#[async_trait]
impl VisionProvider for RekognitionProvider {
    fn supports_text_detection(&self) -> bool {
        true
    }

    async fn detect_labels(
        &self,
        image: &ImageReference,
        min_confidence: f32,
    ) -> Result<Vec<LabelRecord>, ProviderError> {
        let start = Instant::now();
        let output = self
            .client
            .detect_labels()
            .image(sdk_image(image))
            .min_confidence(min_confidence)
            .send()
            .await
            .map_err(|e| request_error("DetectLabels", e))?;

        let labels: Vec<LabelRecord> = output
            .labels()
            .iter()
            .filter_map(|label| {
                label.name().map(|name| LabelRecord {
                    name: name.to_string(),
                    confidence: label.confidence().unwrap_or_default(),
                })
            })
            .collect();

        info!(
            labels = labels.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Label detection complete"
        );

        Ok(labels)
    }

    async fn detect_moderation_labels(
        &self,
        image: &ImageReference,
        min_confidence: f32,
    ) -> Result<Vec<ModerationLabelRecord>, ProviderError> {
        let output = self
            .client
            .detect_moderation_labels()
            .image(sdk_image(image))
            .min_confidence(min_confidence)
            .send()
            .await
            .map_err(|e| request_error("DetectModerationLabels", e))?;

        Ok(output
            .moderation_labels()
            .iter()
            .filter_map(|label| {
                label.name().map(|name| ModerationLabelRecord {
                    name: name.to_string(),
                    confidence: label.confidence().unwrap_or_default(),
                    parent_name: label
                        .parent_name()
                        .filter(|p| !p.is_empty())
                        .map(str::to_string),
                })
            })
            .collect())
    }

    async fn detect_faces(
        &self,
        image: &ImageReference,
        attributes: &[FaceAttribute],
    ) -> Result<Vec<FaceRecord>, ProviderError> {
        let output = self
            .client
            .detect_faces()
            .image(sdk_image(image))
            .set_attributes(Some(sdk_attributes(attributes)))
            .send()
            .await
            .map_err(|e| request_error("DetectFaces", e))?;

        let faces: Vec<FaceRecord> = output
            .face_details()
            .iter()
            .map(|face| {
                let emotions: Vec<EmotionRecord> = face
                    .emotions()
                    .iter()
                    .filter_map(|e| {
                        e.r#type().map(|t| EmotionRecord {
                            kind: t.as_str().to_string(),
                            confidence: e.confidence().unwrap_or_default(),
                        })
                    })
                    .collect();

                FaceRecord {
                    bounding_box: face.bounding_box().map(|b| BoundingBox {
                        width: b.width(),
                        height: b.height(),
                        left: b.left(),
                        top: b.top(),
                    }),
                    confidence: face.confidence(),
                    emotions: if emotions.is_empty() {
                        None
                    } else {
                        Some(emotions)
                    },
                    age_range: face.age_range().map(|a| AgeRange {
                        low: a.low(),
                        high: a.high(),
                    }),
                    gender: face.gender().and_then(|g| {
                        g.value().map(|v| GenderRecord {
                            value: v.as_str().to_string(),
                            confidence: g.confidence().unwrap_or_default(),
                        })
                    }),
                }
            })
            .collect();

        debug!(faces = faces.len(), "Face detection complete");
        Ok(faces)
    }

    async fn recognize_celebrities(
        &self,
        image: &ImageReference,
    ) -> Result<Vec<CelebrityRecord>, ProviderError> {
        let output = self
            .client
            .recognize_celebrities()
            .image(sdk_image(image))
            .send()
            .await
            .map_err(|e| request_error("RecognizeCelebrities", e))?;

        Ok(output
            .celebrity_faces()
            .iter()
            .filter_map(|celebrity| {
                celebrity.name().map(|name| CelebrityRecord {
                    name: name.to_string(),
                    id: celebrity.id().map(str::to_string),
                    match_confidence: celebrity.match_confidence(),
                    urls: celebrity.urls().to_vec(),
                })
            })
            .collect())
    }

    async fn detect_text(
        &self,
        image: &ImageReference,
    ) -> Result<Vec<TextDetectionRecord>, ProviderError> {
        let output = self
            .client
            .detect_text()
            .image(sdk_image(image))
            .send()
            .await
            .map_err(|e| request_error("DetectText", e))?;

        Ok(output
            .text_detections()
            .iter()
            .filter_map(|text| {
                text.detected_text().map(|detected| TextDetectionRecord {
                    detected_text: detected.to_string(),
                    kind: text.r#type().map(|t| t.as_str().to_string()),
                    id: text.id(),
                    parent_id: text.parent_id(),
                    confidence: text.confidence(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_attributes_collapse_into_default() {
        let mapped = sdk_attributes(&FaceAttribute::defaults());
        assert_eq!(
            mapped,
            vec![
                Attribute::Default,
                Attribute::Emotions,
                Attribute::AgeRange,
                Attribute::Gender
            ]
        );
    }

    #[test]
    fn test_sdk_image_variants() {
        let s3 = sdk_image(&ImageReference::S3Object {
            bucket: "mybucket".to_string(),
            name: "img.jpg".to_string(),
        });
        let object = s3.s3_object().expect("s3 object");
        assert_eq!(object.bucket(), Some("mybucket"));
        assert_eq!(object.name(), Some("img.jpg"));
        assert!(s3.bytes().is_none());

        let inline = sdk_image(&ImageReference::Bytes(vec![1, 2, 3]));
        assert_eq!(inline.bytes().map(|b| b.as_ref().to_vec()), Some(vec![1, 2, 3]));
    }
}
