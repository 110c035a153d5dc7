//! Capability toggles and extension hooks
use crate::models::{AttachmentId, Capability, EnrichmentBundle};
use crate::providers::{FaceAttribute, VisionProvider};
use std::fmt;
use std::sync::Arc;

/// Per-attachment override: receives the configured toggle, returns the effective one
pub type CapabilityOverride = Arc<dyn Fn(Capability, AttachmentId, bool) -> bool + Send + Sync>;

/// Per-attachment face attributes: receives the configured list, returns the list to request
pub type FaceAttributesOverride =
    Arc<dyn Fn(Vec<FaceAttribute>, AttachmentId) -> Vec<FaceAttribute> + Send + Sync>;

/// Invoked with the provider once all capability calls of a run completed
pub type ProcessHook = Arc<dyn Fn(&dyn VisionProvider, AttachmentId) + Send + Sync>;

/// Rewrites the keyword list before it is persisted
pub type KeywordHook =
    Arc<dyn Fn(Vec<String>, &EnrichmentBundle, AttachmentId) -> Vec<String> + Send + Sync>;

/// Which capabilities run, and with which parameters
#[derive(Clone)]
pub struct EnrichmentPolicy {
    pub labels: bool,
    pub moderation: bool,
    pub faces: bool,
    pub celebrities: bool,
    pub text: bool,
    pub face_attributes: Vec<FaceAttribute>,
    /// Applied to labels and moderation labels
    pub min_confidence: f32,
    pub capability_override: Option<CapabilityOverride>,
    pub face_attributes_override: Option<FaceAttributesOverride>,
}

impl Default for EnrichmentPolicy {
    fn default() -> Self {
        Self {
            labels: true,
            moderation: false,
            faces: false,
            celebrities: false,
            text: false,
            face_attributes: FaceAttribute::defaults(),
            min_confidence: 80.0,
            capability_override: None,
            face_attributes_override: None,
        }
    }
}

impl fmt::Debug for EnrichmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrichmentPolicy")
            .field("labels", &self.labels)
            .field("moderation", &self.moderation)
            .field("faces", &self.faces)
            .field("celebrities", &self.celebrities)
            .field("text", &self.text)
            .field("face_attributes", &self.face_attributes)
            .field("min_confidence", &self.min_confidence)
            .field("capability_override", &self.capability_override.is_some())
            .field(
                "face_attributes_override",
                &self.face_attributes_override.is_some(),
            )
            .finish()
    }
}

impl EnrichmentPolicy {
    /// Policy with every capability enabled
    pub fn all() -> Self {
        Self {
            labels: true,
            moderation: true,
            faces: true,
            celebrities: true,
            text: true,
            ..Self::default()
        }
    }

    pub fn with_capability(mut self, capability: Capability, enabled: bool) -> Self {
        match capability {
            Capability::Labels => self.labels = enabled,
            Capability::Moderation => self.moderation = enabled,
            Capability::Faces => self.faces = enabled,
            Capability::Celebrities => self.celebrities = enabled,
            Capability::Text => self.text = enabled,
        }
        self
    }

    pub fn with_override(mut self, capability_override: CapabilityOverride) -> Self {
        self.capability_override = Some(capability_override);
        self
    }

    pub fn with_face_attributes_override(mut self, attributes: FaceAttributesOverride) -> Self {
        self.face_attributes_override = Some(attributes);
        self
    }

    /// Face attributes to request for one attachment
    pub fn face_attributes_for(&self, attachment_id: AttachmentId) -> Vec<FaceAttribute> {
        let configured = self.face_attributes.clone();
        match &self.face_attributes_override {
            Some(rewrite) => rewrite(configured, attachment_id),
            None => configured,
        }
    }

    fn configured(&self, capability: Capability) -> bool {
        match capability {
            Capability::Labels => self.labels,
            Capability::Moderation => self.moderation,
            Capability::Faces => self.faces,
            Capability::Celebrities => self.celebrities,
            Capability::Text => self.text,
        }
    }

    pub fn is_enabled(&self, capability: Capability, attachment_id: AttachmentId) -> bool {
        let configured = self.configured(capability);
        match &self.capability_override {
            Some(decide) => decide(capability, attachment_id, configured),
            None => configured,
        }
    }

    pub fn enabled_capabilities(&self, attachment_id: AttachmentId) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.is_enabled(*c, attachment_id))
            .collect()
    }
}

/// Ordered callbacks at the two extension points of a run
#[derive(Clone, Default)]
pub struct EnrichmentHooks {
    pub process: Vec<ProcessHook>,
    pub keywords: Vec<KeywordHook>,
}

impl EnrichmentHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_process(mut self, hook: ProcessHook) -> Self {
        self.process.push(hook);
        self
    }

    pub fn on_keywords(mut self, hook: KeywordHook) -> Self {
        self.keywords.push(hook);
        self
    }
}

impl fmt::Debug for EnrichmentHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrichmentHooks")
            .field("process", &self.process.len())
            .field("keywords", &self.keywords.len())
            .finish()
    }
}
