// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Verifiable credentials (kind 30503)

use serde::Serialize;
use serde_json::Value;

use crate::event::{Event, Kind};
use crate::key::PublicKey;
use crate::permit;
use crate::types::Timestamp;

/// Issued credential (kind 30503)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Credential {
    /// Credential id (`d` tag)
    pub credential_id: String,
    /// Certified permit (`permit_id` tag)
    pub permit_id: String,
    /// Permit level (`level` tag, falling back to the id suffix)
    pub level: u32,
    /// Holder (`p` tag)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<PublicKey>,
    /// Issuer (event author)
    pub issuer: PublicKey,
    /// Originating request (`e` tag)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Issuance timestamp
    pub issued_at: Timestamp,
    /// Expiry (`expires` tag); valid iff `now < expires`
    pub expires_at: Timestamp,
    /// Unique attesters (`attestor` tags)
    pub attestors: Vec<PublicKey>,
    /// Declared attestation count (`attestations` tag)
    pub attestation_count: usize,
    /// Certified skills (`skill` tags)
    pub skills: Vec<String>,
    /// W3C VC payload (content)
    pub vc: Value,
}

impl Credential {
    /// Parse from a kind-30503 event; requires a `permit_id` tag
    pub fn from_event(event: &Event) -> Option<Self> {
        if event.kind != Kind::PermitCredential {
            return None;
        }

        let permit_id: String = event.tag_content("permit_id")?.to_string();

        let attestors: Vec<PublicKey> = event
            .tag_values("attestor")
            .filter_map(|hex| PublicKey::from_hex(hex).ok())
            .collect();

        Some(Self {
            credential_id: event.identifier().unwrap_or_default().to_string(),
            level: event
                .tag_content("level")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| permit::level(&permit_id)),
            holder: event
                .tag_content("p")
                .and_then(|hex| PublicKey::from_hex(hex).ok()),
            issuer: event.pubkey,
            request_id: event.tag_content("e").map(String::from),
            issued_at: event.created_at,
            expires_at: event
                .tag_content("expires")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            attestation_count: event
                .tag_content("attestations")
                .and_then(|v| v.parse().ok())
                .unwrap_or(attestors.len()),
            skills: event.tag_values("skill").map(String::from).collect(),
            vc: serde_json::from_str(&event.content).unwrap_or(Value::Null),
            attestors,
            permit_id,
        })
    }

    /// A credential is valid iff `now < expires`
    #[inline]
    pub fn is_valid(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }

    /// Days until expiry, zero once expired
    pub fn days_until_expiry(&self, now: Timestamp) -> u64 {
        self.expires_at.days_since(now)
    }
}
