// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Attestations (kind 30502)

use serde::Serialize;

use crate::event::{Event, EventId, Kind};
use crate::key::PublicKey;
use crate::types::Timestamp;

/// Peer attestation endorsing a permit request (kind 30502)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attestation {
    /// Id of the carrying event
    pub event_id: EventId,
    /// Who attests (event author)
    pub attestor: PublicKey,
    /// Request reference: tag `e` (event id) or `a` (addressable ref)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_ref: Option<String>,
    /// Attestation timestamp
    pub created_at: Timestamp,
    /// Free-form comment
    pub comment: String,
}

impl Attestation {
    /// Parse from a kind-30502 event.
    ///
    /// The request reference may be absent here; the oracle rejects such
    /// attestations at processing time.
    pub fn from_event(event: &Event) -> Option<Self> {
        if event.kind != Kind::PermitAttestation {
            return None;
        }

        let request_ref: Option<String> = event
            .tag_content("e")
            .or_else(|| event.tag_content("a"))
            .map(String::from);

        Some(Self {
            event_id: event.id,
            attestor: event.pubkey,
            request_ref,
            created_at: event.created_at,
            comment: event.content.clone(),
        })
    }
}
