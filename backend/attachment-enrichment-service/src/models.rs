//! Enrichment data model
use crate::providers::{
    CelebrityRecord, FaceRecord, LabelRecord, ModerationLabelRecord, TextDetectionRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use uuid::Uuid;

/// Attachments are identified by the host platform's post id
pub type AttachmentId = Uuid;

/// Metadata key prefix for successful capability results
pub const DATA_META_KEY_PREFIX: &str = "enrichment_";

/// Metadata key prefix for failed capability results
pub const ERROR_META_KEY_PREFIX: &str = "enrichment_error_";

/// Metadata key holding the newline-joined keyword blob
pub const KEYWORDS_META_KEY: &str = "enrichment_keywords";

/// Flat taxonomy that detected label names are attached to
pub const LABEL_TAXONOMY: &str = "enrichment_labels";

/// Image handed to every provider call of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    /// Remote object, analysed in place by the provider
    S3Object { bucket: String, name: String },
    /// Inline file content
    Bytes(Vec<u8>),
}

/// One distinct analysis offered by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Labels,
    Moderation,
    Faces,
    Celebrities,
    Text,
}

impl Capability {
    /// All capabilities in the order they are invoked
    pub const ALL: [Capability; 5] = [
        Capability::Labels,
        Capability::Moderation,
        Capability::Faces,
        Capability::Celebrities,
        Capability::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Labels => "labels",
            Capability::Moderation => "moderation",
            Capability::Faces => "faces",
            Capability::Celebrities => "celebrities",
            Capability::Text => "text",
        }
    }

    pub fn data_key(&self) -> String {
        format!("{}{}", DATA_META_KEY_PREFIX, self.as_str())
    }

    pub fn error_key(&self) -> String {
        format!("{}{}", ERROR_META_KEY_PREFIX, self.as_str())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful result of one capability call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CapabilityPayload {
    Labels(Vec<LabelRecord>),
    Moderation(Vec<ModerationLabelRecord>),
    Faces(Vec<FaceRecord>),
    Celebrities(Vec<CelebrityRecord>),
    Text(Vec<TextDetectionRecord>),
}

impl CapabilityPayload {
    pub fn capability(&self) -> Capability {
        match self {
            CapabilityPayload::Labels(_) => Capability::Labels,
            CapabilityPayload::Moderation(_) => Capability::Moderation,
            CapabilityPayload::Faces(_) => Capability::Faces,
            CapabilityPayload::Celebrities(_) => Capability::Celebrities,
            CapabilityPayload::Text(_) => Capability::Text,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CapabilityPayload::Labels(r) => r.len(),
            CapabilityPayload::Moderation(r) => r.len(),
            CapabilityPayload::Faces(r) => r.len(),
            CapabilityPayload::Celebrities(r) => r.len(),
            CapabilityPayload::Text(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of one capability call
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityResult {
    Success(CapabilityPayload),
    Failure(String),
}

impl CapabilityResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CapabilityResult::Success(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            CapabilityResult::Failure(message) => Some(message),
            CapabilityResult::Success(_) => None,
        }
    }
}

/// Results of one enrichment run, keyed and ordered by capability
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentBundle {
    results: BTreeMap<Capability, CapabilityResult>,
}

impl EnrichmentBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, capability: Capability, result: CapabilityResult) {
        self.results.insert(capability, result);
    }

    pub fn get(&self, capability: Capability) -> Option<&CapabilityResult> {
        self.results.get(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Capability, &CapabilityResult)> {
        self.results.iter().map(|(c, r)| (*c, r))
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        self.results.keys().copied().collect()
    }

    pub fn succeeded(&self) -> Vec<Capability> {
        self.iter()
            .filter(|(_, r)| r.is_success())
            .map(|(c, _)| c)
            .collect()
    }

    pub fn failed(&self) -> Vec<Capability> {
        self.iter()
            .filter(|(_, r)| !r.is_success())
            .map(|(c, _)| c)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Deduplicated, insertion-ordered set of non-empty keywords
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet {
    entries: Vec<String>,
    seen: HashSet<String>,
}

impl KeywordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw candidates, dropping blanks and later duplicates
    pub fn from_candidates<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for candidate in candidates {
            set.insert(candidate);
        }
        set
    }

    /// Returns false when the keyword was blank or already present
    pub fn insert(&mut self, keyword: impl Into<String>) -> bool {
        let keyword = keyword.into();
        if keyword.trim().is_empty() || self.seen.contains(&keyword) {
            return false;
        }
        self.seen.insert(keyword.clone());
        self.entries.push(keyword);
        true
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.seen.contains(keyword)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.entries
    }

    /// Newline-joined form persisted for search
    pub fn to_blob(&self) -> String {
        self.entries.join("\n")
    }
}
