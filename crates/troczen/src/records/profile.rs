// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Profiles (kind 0) and contact lists (kind 3)

use std::collections::BTreeSet;

use serde::Serialize;

use super::content_object;
use crate::event::{Event, Kind};
use crate::key::PublicKey;
use crate::types::Timestamp;

/// Merchant profile (kind 0)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Profile {
    /// Author
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<PublicKey>,
    /// Profile timestamp
    #[serde(skip)]
    pub created_at: Timestamp,
    /// Display name
    pub name: String,
    /// Description
    pub about: String,
    /// Avatar URL
    pub picture: String,
    /// Banner URL
    pub banner: String,
    /// NIP-05 identifier
    pub nip05: String,
    /// Lightning address
    pub lud16: String,
    /// Website URL
    pub website: String,
}

impl Profile {
    /// Parse from a kind-0 event
    pub fn from_event(event: &Event) -> Option<Self> {
        if event.kind != Kind::Metadata {
            return None;
        }

        let content = content_object(event);
        let field = |name: &str| -> String {
            content
                .get(name)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        Some(Self {
            pubkey: Some(event.pubkey),
            created_at: event.created_at,
            name: field("name"),
            about: field("about"),
            picture: field("picture"),
            banner: field("banner"),
            nip05: field("nip05"),
            lud16: field("lud16"),
            website: field("website"),
        })
    }
}

/// Contact list (kind 3)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactList {
    /// Author
    pub pubkey: PublicKey,
    /// List timestamp
    pub created_at: Timestamp,
    /// Followed keys (`p` tags)
    pub follows: BTreeSet<PublicKey>,
}

impl ContactList {
    /// Parse from a kind-3 event; invalid `p` values are skipped
    pub fn from_event(event: &Event) -> Option<Self> {
        if event.kind != Kind::ContactList {
            return None;
        }

        let follows: BTreeSet<PublicKey> = event
            .tag_values("p")
            .filter_map(|value| PublicKey::from_hex(value).ok())
            .collect();

        Some(Self {
            pubkey: event.pubkey,
            created_at: event.created_at,
            follows,
        })
    }

    /// Whether this list follows the given key
    #[inline]
    pub fn follows(&self, pubkey: &PublicKey) -> bool {
        self.follows.contains(pubkey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::event::{EventBuilder, Tag};
    use crate::key::Keys;

    #[test]
    fn test_profile_parse() {
        let keys = Keys::generate();
        let event = EventBuilder::new(
            Kind::Metadata,
            r#"{"name":"Alice","about":"Maraîchère","picture":"https://x/p.png"}"#,
            vec![],
        )
        .sign(&keys)
        .unwrap();

        let profile = Profile::from_event(&event).unwrap();
        assert_eq!(profile.name, "Alice");
        assert_eq!(profile.about, "Maraîchère");
        assert_eq!(profile.nip05, "");
    }

    #[test]
    fn test_profile_tolerates_garbage_content() {
        let keys = Keys::generate();
        let event = EventBuilder::new(Kind::Metadata, "not json", vec![])
            .sign(&keys)
            .unwrap();
        let profile = Profile::from_event(&event).unwrap();
        assert_eq!(profile.name, "");
    }

    #[test]
    fn test_contact_list_parse() {
        let keys = Keys::generate();
        let friend = Keys::generate().public_key();
        let event = EventBuilder::new(
            Kind::ContactList,
            "",
            vec![
                Tag::public_key(friend),
                Tag::custom("p", "not-a-key"),
                Tag::custom("other", "ignored"),
            ],
        )
        .sign(&keys)
        .unwrap();

        let list = ContactList::from_event(&event).unwrap();
        assert_eq!(list.follows.len(), 1);
        assert!(list.follows(&friend));
    }
}
