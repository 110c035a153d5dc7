//! One-time admin tokens
//!
//! A token is `{nonce}.{hex(HMAC-SHA256(secret, "{action}:{id}:{tick}:{nonce}"))}`
//! where the nonce is random per issue and the tick advances every half TTL.
//! Tokens from the current or previous tick are accepted, each nonce at most
//! once.
use crate::models::AttachmentId;
use chrono::Utc;
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid signing key: {0}")]
    Key(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAction {
    ViewLabels,
    UpdateLabels,
}

impl TokenAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenAction::ViewLabels => "view-labels",
            TokenAction::UpdateLabels => "update-labels",
        }
    }
}

impl fmt::Display for TokenAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issues and consumes per-attachment action tokens
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl_seconds: i64,
    /// Consumed nonce -> unix time after which its token can no longer validate
    consumed: DashMap<Uuid, i64>,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl_seconds: i64) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl_seconds: ttl_seconds.max(2),
            consumed: DashMap::new(),
        }
    }

    fn half_ttl(&self) -> i64 {
        self.ttl_seconds / 2
    }

    fn tick(&self, now: i64) -> i64 {
        now.div_euclid(self.half_ttl())
    }

    fn mac(
        &self,
        action: TokenAction,
        id: AttachmentId,
        tick: i64,
        nonce: &Uuid,
    ) -> Result<HmacSha256, TokenError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .map_err(|e| TokenError::Key(e.to_string()))?;
        mac.update(format!("{}:{}:{}:{}", action, id, tick, nonce.simple()).as_bytes());
        Ok(mac)
    }

    pub fn generate(&self, action: TokenAction, id: AttachmentId) -> Result<String, TokenError> {
        self.generate_at(action, id, Utc::now().timestamp())
    }

    pub fn generate_at(
        &self,
        action: TokenAction,
        id: AttachmentId,
        now: i64,
    ) -> Result<String, TokenError> {
        let nonce = Uuid::new_v4();
        let mac = self.mac(action, id, self.tick(now), &nonce)?;
        Ok(format!(
            "{}.{}",
            nonce.simple(),
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    /// Validate and consume a token
    pub fn verify(&self, action: TokenAction, id: AttachmentId, token: &str) -> bool {
        self.verify_at(action, id, token, Utc::now().timestamp())
    }

    pub fn verify_at(&self, action: TokenAction, id: AttachmentId, token: &str, now: i64) -> bool {
        self.consumed.retain(|_, expires_at| *expires_at > now);

        let Some((nonce, signature)) = token.split_once('.') else {
            return false;
        };
        let (Ok(nonce), Ok(signature)) = (Uuid::parse_str(nonce), hex::decode(signature)) else {
            return false;
        };

        let tick = self.tick(now);
        let matched = [tick, tick - 1].into_iter().find(|t| {
            self.mac(action, id, *t, &nonce)
                .map(|mac| mac.verify_slice(&signature).is_ok())
                .unwrap_or(false)
        });

        let Some(matched) = matched else {
            return false;
        };

        // Valid until the end of the tick after the one it was issued in
        let expires_at = (matched + 2) * self.half_ttl();
        match self.consumed.entry(nonce) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(expires_at);
                true
            }
        }
    }

    pub fn consumed_count(&self) -> usize {
        self.consumed.len()
    }
}
