// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Permit definitions (kind 30500) and requests (kind 30501)

use serde::Serialize;

use super::content_object;
use crate::event::{Event, EventId, Kind};
use crate::key::PublicKey;
use crate::permit::{self, PermitType};
use crate::types::Timestamp;

/// Permit definition (kind 30500)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermitDefinition {
    /// Permit id (`d` tag)
    pub permit_id: String,
    /// Readable name (`name` tag, falling back to the content)
    pub name: String,
    /// Description (content)
    pub description: String,
    /// Category (`category` tag, default `skill`)
    pub category: String,
    /// Level parsed from the id
    pub level: u32,
    /// Permit family parsed from the id
    pub permit_type: PermitType,
    /// Threshold declared by the definition content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_attestations: Option<usize>,
    /// Associated skills (`skill` tags, falling back to the content list)
    pub skills: Vec<String>,
    /// Parent permit id (`parent` tag)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Market scope (`market` tag)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    /// Definition timestamp
    pub created_at: Timestamp,
    /// Definition author
    pub created_by: PublicKey,
}

impl PermitDefinition {
    /// Parse from a kind-30500 event; requires a valid permit id in `d`
    pub fn from_event(event: &Event) -> Option<Self> {
        if event.kind != Kind::PermitDefinition {
            return None;
        }

        let permit_id: String = event.identifier()?.to_string();
        if !permit::is_valid_id(&permit_id) {
            return None;
        }

        let content = content_object(event);

        let mut skills: Vec<String> = event.tag_values("skill").map(String::from).collect();
        if skills.is_empty() {
            skills = content
                .get("skills")
                .and_then(|v| v.as_array())
                .map(|list| {
                    list.iter()
                        .filter_map(|s| s.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();
        }

        Some(Self {
            level: permit::level(&permit_id),
            permit_type: permit::permit_type(&permit_id),
            name: event
                .tag_content("name")
                .map(String::from)
                .or_else(|| {
                    content
                        .get("name")
                        .and_then(|v| v.as_str())
                        .map(String::from)
                })
                .unwrap_or_default(),
            description: content
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            category: event
                .tag_content("category")
                .unwrap_or("skill")
                .to_string(),
            required_attestations: content
                .get("required_attestations")
                .and_then(|v| v.as_u64())
                .map(|n| n as usize),
            skills,
            parent: event.tag_content("parent").map(String::from),
            market: event.tag_content("market").map(String::from),
            created_at: event.created_at,
            created_by: event.pubkey,
            permit_id,
        })
    }

    /// Attestation threshold for this permit
    #[inline]
    pub fn threshold(&self) -> usize {
        permit::required_attestations(&self.permit_id, self.required_attestations)
    }
}

/// Permit request (kind 30501)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermitRequest {
    /// Request id (`d` tag, falling back to the event id)
    pub request_id: String,
    /// Id of the carrying event
    pub event_id: EventId,
    /// Who asks for the permit (event author)
    pub requester: PublicKey,
    /// Requested permit (`permit_id` tag)
    pub permit_id: String,
    /// Request timestamp
    pub created_at: Timestamp,
}

impl PermitRequest {
    /// Parse from a kind-30501 event; requires a `permit_id` tag
    pub fn from_event(event: &Event) -> Option<Self> {
        if event.kind != Kind::PermitRequest {
            return None;
        }

        Some(Self {
            request_id: event
                .identifier()
                .map(String::from)
                .unwrap_or_else(|| event.id.to_hex()),
            event_id: event.id,
            requester: event.pubkey,
            permit_id: event.tag_content("permit_id")?.to_string(),
            created_at: event.created_at,
        })
    }
}
