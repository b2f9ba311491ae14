// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Typed domain records
//!
//! Events are parsed once at ingress into one discriminated variant per
//! kind. Parsing never fails a batch: a malformed event is dropped with a
//! warning, an unknown kind silently.

use crate::event::{Event, Kind};

pub mod attestation;
pub mod bond;
pub mod circuit;
pub mod credential;
pub mod permit;
pub mod profile;

pub use self::attestation::Attestation;
pub use self::bond::Bond;
pub use self::circuit::Circuit;
pub use self::credential::Credential;
pub use self::permit::{PermitDefinition, PermitRequest};
pub use self::profile::{ContactList, Profile};

/// A domain record, one variant per handled kind
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Kind 0
    Profile(Profile),
    /// Kind 3
    ContactList(ContactList),
    /// Kind 30303
    Bond(Bond),
    /// Kind 30304
    Circuit(Circuit),
    /// Kind 30500
    PermitDefinition(PermitDefinition),
    /// Kind 30501
    PermitRequest(PermitRequest),
    /// Kind 30502
    Attestation(Attestation),
    /// Kind 30503
    Credential(Credential),
}

impl Record {
    /// Parse an event into its domain record.
    ///
    /// Returns `None` for unknown kinds and for events whose required
    /// fields are missing or malformed (logged at WARN).
    pub fn from_event(event: &Event) -> Option<Self> {
        let record: Option<Self> = match event.kind {
            Kind::Metadata => Profile::from_event(event).map(Self::Profile),
            Kind::ContactList => ContactList::from_event(event).map(Self::ContactList),
            Kind::Bond => Bond::from_event(event).map(Self::Bond),
            Kind::Circuit => Circuit::from_event(event).map(Self::Circuit),
            Kind::PermitDefinition => {
                PermitDefinition::from_event(event).map(Self::PermitDefinition)
            }
            Kind::PermitRequest => PermitRequest::from_event(event).map(Self::PermitRequest),
            Kind::PermitAttestation => Attestation::from_event(event).map(Self::Attestation),
            Kind::PermitCredential => Credential::from_event(event).map(Self::Credential),
            _ => return None,
        };

        if record.is_none() {
            tracing::warn!(
                id = %event.id,
                kind = %event.kind,
                "Dropping malformed event"
            );
        }

        record
    }
}

/// Decode an event content as a JSON object, tolerating anything else.
///
/// Encrypted or malformed contents yield an empty subject.
pub(crate) fn content_object(event: &Event) -> serde_json::Map<String, serde_json::Value> {
    match serde_json::from_str::<serde_json::Value>(&event.content) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::event::{EventBuilder, Tag};
    use crate::key::Keys;

    #[test]
    fn test_unknown_kind_is_dropped() {
        let keys = Keys::generate();
        let event = EventBuilder::new(Kind::Custom(1), "hello", vec![])
            .sign(&keys)
            .unwrap();
        assert!(Record::from_event(&event).is_none());
    }

    #[test]
    fn test_dispatch_by_kind() {
        let keys = Keys::generate();
        let event = EventBuilder::new(
            Kind::Circuit,
            r#"{"age_days":12,"hop_count":3,"value_zen":20}"#,
            vec![
                Tag::identifier("circuit-1"),
                Tag::custom("bon_id", "bon-1"),
                Tag::custom("market", "market_toulouse"),
            ],
        )
        .sign(&keys)
        .unwrap();

        match Record::from_event(&event) {
            Some(Record::Circuit(circuit)) => assert_eq!(circuit.circuit_id, "circuit-1"),
            other => panic!("unexpected record: {other:?}"),
        }
    }
}
