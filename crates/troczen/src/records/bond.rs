// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Bonds (kind 30303)

use serde::Serialize;

use super::content_object;
use crate::event::{Event, EventId, Kind};
use crate::key::PublicKey;
use crate::types::time::DAY;
use crate::types::Timestamp;

/// Transferable value unit (kind 30303), owned by its current holder.
///
/// The content is usually encrypted; `hop_count` and `path` are only
/// populated when it happens to be clear JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bond {
    /// Bond id (`d` tag, `zen-` prefix stripped)
    pub bond_id: String,
    /// Id of the carrying event
    pub event_id: EventId,
    /// Current holder (event author)
    pub holder: PublicKey,
    /// Original issuer (`issuer` tag, falling back to the author)
    pub issuer: PublicKey,
    /// Emission timestamp
    pub issued_at: Timestamp,
    /// Expiry (`expires` tag); a bond with `expires <= now` is inactive
    pub expires_at: Timestamp,
    /// Face value in Zen (`value` tag)
    pub value: f64,
    /// Lifecycle status (`status` tag)
    pub status: String,
    /// Normalized market tag
    pub market: String,
    /// Skill certification attached at emission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_cert: Option<String>,
    /// Hops travelled, when the content is observable
    pub hop_count: u32,
    /// Path of holders, when the content is observable
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
}

impl Bond {
    /// Parse from a kind-30303 event
    pub fn from_event(event: &Event) -> Option<Self> {
        if event.kind != Kind::Bond {
            return None;
        }

        let bond_id: String = match event.identifier() {
            Some(d) => d.strip_prefix("zen-").unwrap_or(d).to_string(),
            None => event.id.to_hex(),
        };

        let issuer: PublicKey = event
            .tag_content("issuer")
            .and_then(|hex| PublicKey::from_hex(hex).ok())
            .unwrap_or(event.pubkey);

        let content = content_object(event);

        Some(Self {
            bond_id,
            event_id: event.id,
            holder: event.pubkey,
            issuer,
            issued_at: event.created_at,
            expires_at: event
                .tag_content("expires")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            value: event
                .tag_content("value")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.0),
            status: event.tag_content("status").unwrap_or("active").to_string(),
            market: event.tag_content("market").unwrap_or_default().to_string(),
            skill_cert: event.tag_content("skill_cert").map(String::from),
            hop_count: content
                .get("hop_count")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            path: content
                .get("path")
                .and_then(|v| v.as_array())
                .map(|path| {
                    path.iter()
                        .filter_map(|hop| hop.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    /// A bond with `expires <= now` is inactive and carries zero mass
    #[inline]
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.expires_at > now
    }

    /// Emission TTL in whole days
    #[inline]
    pub fn ttl_days(&self) -> u64 {
        self.expires_at.days_since(self.issued_at)
    }

    /// Remaining lifetime in days (fractional)
    pub fn residual_ttl_days(&self, now: Timestamp) -> f64 {
        self.expires_at.as_u64().saturating_sub(now.as_u64()) as f64 / DAY as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::event::{EventBuilder, Tag};
    use crate::key::Keys;

    fn bond_event(keys: &Keys, d: &str, tags: Vec<Tag>) -> Event {
        let mut all = vec![Tag::identifier(d)];
        all.extend(tags);
        EventBuilder::new(Kind::Bond, "encrypted-p3-blob", all)
            .sign(keys)
            .unwrap()
    }

    #[test]
    fn test_zen_prefix_is_stripped() {
        let keys = Keys::generate();
        let event = bond_event(&keys, "zen-bon-42", vec![]);
        let bond = Bond::from_event(&event).unwrap();
        assert_eq!(bond.bond_id, "bon-42");

        let event = bond_event(&keys, "bon-42", vec![]);
        assert_eq!(Bond::from_event(&event).unwrap().bond_id, "bon-42");
    }

    #[test]
    fn test_issuer_fallback_is_author() {
        let keys = Keys::generate();
        let event = bond_event(&keys, "bon-1", vec![]);
        let bond = Bond::from_event(&event).unwrap();
        assert_eq!(bond.issuer, keys.public_key());

        let issuer = Keys::generate().public_key();
        let event = bond_event(&keys, "bon-1", vec![Tag::custom("issuer", issuer.to_hex())]);
        assert_eq!(Bond::from_event(&event).unwrap().issuer, issuer);
    }

    #[test]
    fn test_activity_and_ttl() {
        let keys = Keys::generate();
        let now = Timestamp::now();
        let event = EventBuilder::new(
            Kind::Bond,
            "",
            vec![
                Tag::identifier("bon-1"),
                Tag::custom("expires", (now + 10 * DAY).to_string()),
                Tag::custom("value", "25.5"),
            ],
        )
        .custom_created_at(now)
        .sign(&keys)
        .unwrap();

        let bond = Bond::from_event(&event).unwrap();
        assert!(bond.is_active(now));
        assert!(!bond.is_active(now + 11 * DAY));
        assert_eq!(bond.ttl_days(), 10);
        assert_eq!(bond.value, 25.5);
    }

    #[test]
    fn test_clear_content_exposes_hops() {
        let keys = Keys::generate();
        let event = EventBuilder::new(
            Kind::Bond,
            r#"{"hop_count":2,"path":["a","b"]}"#,
            vec![Tag::identifier("bon-1")],
        )
        .sign(&keys)
        .unwrap();

        let bond = Bond::from_event(&event).unwrap();
        assert_eq!(bond.hop_count, 2);
        assert_eq!(bond.path, vec!["a", "b"]);
    }
}
