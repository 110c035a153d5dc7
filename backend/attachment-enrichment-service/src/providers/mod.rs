//! Vision provider seam
//!
//! The enrichment pipeline talks to the image-analysis provider only through
//! [`VisionProvider`]. Records keep the provider's field casing so stored
//! metadata matches what the provider returned.

pub mod rekognition;

use crate::models::ImageReference;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use rekognition::{load_aws_config, RekognitionProvider};

// ============================================
// Records
// ============================================

/// A detected label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LabelRecord {
    pub name: String,
    #[serde(default)]
    pub confidence: f32,
}

/// A moderation label (explicit or suggestive content category)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModerationLabelRecord {
    pub name: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoundingBox {
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub left: Option<f32>,
    pub top: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmotionRecord {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgeRange {
    pub low: Option<i32>,
    pub high: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GenderRecord {
    pub value: String,
    #[serde(default)]
    pub confidence: f32,
}

/// Per-face attributes; which ones are present depends on the requested
/// [`FaceAttribute`] set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FaceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotions: Option<Vec<EmotionRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_range: Option<AgeRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<GenderRecord>,
}

/// A recognized celebrity face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CelebrityRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_confidence: Option<f32>,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// A detected line or word of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TextDetectionRecord {
    pub detected_text: String,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

// ============================================
// Face attributes
// ============================================

/// Face attributes that can be requested from face detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceAttribute {
    BoundingBox,
    Confidence,
    Emotions,
    AgeRange,
    Gender,
}

impl FaceAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaceAttribute::BoundingBox => "BoundingBox",
            FaceAttribute::Confidence => "Confidence",
            FaceAttribute::Emotions => "Emotions",
            FaceAttribute::AgeRange => "AgeRange",
            FaceAttribute::Gender => "Gender",
        }
    }

    /// BoundingBox, Confidence, Emotions, AgeRange, Gender
    pub fn defaults() -> Vec<FaceAttribute> {
        vec![
            FaceAttribute::BoundingBox,
            FaceAttribute::Confidence,
            FaceAttribute::Emotions,
            FaceAttribute::AgeRange,
            FaceAttribute::Gender,
        ]
    }
}

impl fmt::Display for FaceAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaceAttribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "BoundingBox" => Ok(FaceAttribute::BoundingBox),
            "Confidence" => Ok(FaceAttribute::Confidence),
            "Emotions" => Ok(FaceAttribute::Emotions),
            "AgeRange" => Ok(FaceAttribute::AgeRange),
            "Gender" => Ok(FaceAttribute::Gender),
            other => Err(format!("unknown face attribute '{}'", other)),
        }
    }
}

// ============================================
// Provider trait
// ============================================

/// Errors raised by a provider call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("{operation} failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}

/// Image-analysis provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Whether [`VisionProvider::detect_text`] is available
    fn supports_text_detection(&self) -> bool;

    async fn detect_labels(
        &self,
        image: &ImageReference,
        min_confidence: f32,
    ) -> Result<Vec<LabelRecord>, ProviderError>;

    async fn detect_moderation_labels(
        &self,
        image: &ImageReference,
        min_confidence: f32,
    ) -> Result<Vec<ModerationLabelRecord>, ProviderError>;

    async fn detect_faces(
        &self,
        image: &ImageReference,
        attributes: &[FaceAttribute],
    ) -> Result<Vec<FaceRecord>, ProviderError>;

    async fn recognize_celebrities(
        &self,
        image: &ImageReference,
    ) -> Result<Vec<CelebrityRecord>, ProviderError>;

    async fn detect_text(
        &self,
        image: &ImageReference,
    ) -> Result<Vec<TextDetectionRecord>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_attribute_parse() {
        assert_eq!("AgeRange".parse::<FaceAttribute>(), Ok(FaceAttribute::AgeRange));
        assert_eq!(" Gender ".parse::<FaceAttribute>(), Ok(FaceAttribute::Gender));
        assert!("Mood".parse::<FaceAttribute>().is_err());
    }

    #[test]
    fn test_records_use_provider_casing() {
        let label = LabelRecord {
            name: "Cat".to_string(),
            confidence: 95.2,
        };
        let value = serde_json::to_value(&label).unwrap();
        assert_eq!(value["Name"], "Cat");

        let face: FaceRecord = serde_json::from_value(serde_json::json!({
            "Gender": { "Value": "Female", "Confidence": 99.1 },
            "Emotions": [{ "Type": "HAPPY", "Confidence": 97.0 }]
        }))
        .unwrap();
        assert_eq!(face.gender.unwrap().value, "Female");
        assert_eq!(face.emotions.unwrap()[0].kind, "HAPPY");
        assert!(face.bounding_box.is_none());
    }
}
