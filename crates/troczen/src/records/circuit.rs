// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Circuits (kind 30304)

use serde::Serialize;

use super::content_object;
use crate::event::{Event, Kind};
use crate::key::PublicKey;
use crate::types::Timestamp;

/// Closed circuit (kind 30304): a bond's path returned to its issuer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Circuit {
    /// Circuit id (`d` tag)
    pub circuit_id: String,
    /// Id of the looped bond (`bon_id` tag)
    pub bond_id: String,
    /// Original issuer (`issued_by` tag, falling back to the content)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_by: Option<PublicKey>,
    /// Normalized market tag
    pub market: String,
    /// Destination market for inter-market circuits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_market: Option<String>,
    /// Looped value in Zen
    pub value: f64,
    /// Days between emission and closure
    pub age_days: f64,
    /// Hops travelled
    pub hop_count: u32,
    /// Share of the TTL consumed
    pub ttl_consumed: f64,
    /// Skill certification attached at emission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_cert: Option<String>,
    /// Closure timestamp
    pub closed_at: Timestamp,
    /// Who closed the loop (event author)
    pub closed_by: PublicKey,
}

impl Circuit {
    /// Parse from a kind-30304 event
    pub fn from_event(event: &Event) -> Option<Self> {
        if event.kind != Kind::Circuit {
            return None;
        }

        let content = content_object(event);
        let content_str = |name: &str| -> Option<String> {
            content
                .get(name)
                .and_then(|v| v.as_str())
                .map(String::from)
        };
        let content_f64 =
            |name: &str| -> f64 { content.get(name).and_then(|v| v.as_f64()).unwrap_or(0.0) };

        let issued_by: Option<PublicKey> = event
            .tag_content("issued_by")
            .map(String::from)
            .or_else(|| content_str("issued_by"))
            .and_then(|hex| PublicKey::from_hex(hex).ok());

        let market: String = event
            .tag_content("market")
            .map(String::from)
            .or_else(|| content_str("market_id"))
            .unwrap_or_default();

        Some(Self {
            circuit_id: event.identifier().unwrap_or_default().to_string(),
            bond_id: event.tag_content("bon_id").unwrap_or_default().to_string(),
            issued_by,
            market,
            dest_market: content_str("dest_market_id"),
            value: content_f64("value_zen"),
            age_days: content_f64("age_days"),
            hop_count: content
                .get("hop_count")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            ttl_consumed: content_f64("ttl_consumed"),
            skill_cert: content_str("skill_cert"),
            closed_at: event.created_at,
            closed_by: event.pubkey,
        })
    }

    /// True when the circuit crossed into a different market
    pub fn is_intermarket(&self) -> bool {
        match &self.dest_market {
            Some(dest) => !dest.is_empty() && dest != &self.market,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::event::{EventBuilder, Tag};
    use crate::key::Keys;

    #[test]
    fn test_parse_from_tags_and_content() {
        let keys = Keys::generate();
        let issuer = Keys::generate().public_key();
        let event = EventBuilder::new(
            Kind::Circuit,
            r#"{"age_days":12.5,"hop_count":4,"value_zen":30,"skill_cert":"PERMIT_MARAICHAGE_X2","dest_market_id":"market_paris"}"#,
            vec![
                Tag::identifier("circuit-1"),
                Tag::custom("bon_id", "bon-1"),
                Tag::custom("market", "market_toulouse"),
                Tag::custom("issued_by", issuer.to_hex()),
            ],
        )
        .sign(&keys)
        .unwrap();

        let circuit = Circuit::from_event(&event).unwrap();
        assert_eq!(circuit.bond_id, "bon-1");
        assert_eq!(circuit.issued_by, Some(issuer));
        assert_eq!(circuit.age_days, 12.5);
        assert_eq!(circuit.hop_count, 4);
        assert_eq!(circuit.value, 30.0);
        assert_eq!(circuit.skill_cert.as_deref(), Some("PERMIT_MARAICHAGE_X2"));
        assert!(circuit.is_intermarket());
    }

    #[test]
    fn test_same_market_is_not_intermarket() {
        let keys = Keys::generate();
        let event = EventBuilder::new(
            Kind::Circuit,
            r#"{"dest_market_id":"market_toulouse"}"#,
            vec![
                Tag::identifier("circuit-2"),
                Tag::custom("market", "market_toulouse"),
            ],
        )
        .sign(&keys)
        .unwrap();

        assert!(!Circuit::from_event(&event).unwrap().is_intermarket());
    }

    #[test]
    fn test_malformed_content_defaults() {
        let keys = Keys::generate();
        let event = EventBuilder::new(Kind::Circuit, "garbage", vec![Tag::identifier("c")])
            .sign(&keys)
            .unwrap();
        let circuit = Circuit::from_event(&event).unwrap();
        assert_eq!(circuit.age_days, 0.0);
        assert_eq!(circuit.value, 0.0);
        assert!(circuit.issued_by.is_none());
    }
}
