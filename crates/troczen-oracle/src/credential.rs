// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Credential generation
//!
//! W3C Verifiable Credentials carried by kind-30503 events, whose proof
//! is the Nostr signature itself, plus the NIP-58 badge pair.

use bitcoin_hashes::sha256::Hash as Sha256Hash;
use bitcoin_hashes::Hash;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use troczen::event::{Event, EventBuilder, EventId, Kind, Tag};
use troczen::key::{Keys, PublicKey};
use troczen::permit;
use troczen::types::time::DAY;
use troczen::types::Timestamp;

use crate::error::OracleError;

/// JSON-LD contexts stamped on every credential
pub const CONTEXTS: [&str; 2] = [
    "https://www.w3.org/2018/credentials/v1",
    "https://troczen.org/credentials/v1",
];

/// Credential types stamped on every credential
pub const TYPES: [&str; 2] = ["VerifiableCredential", "TrocZenPermitCredential"];

/// Validity of skill permits (days)
pub const VALIDITY_SKILL_DAYS: u64 = 365;
/// Validity of licenses (days)
pub const VALIDITY_LICENSE_DAYS: u64 = 1_825;
/// Validity of authority permits (days)
pub const VALIDITY_AUTHORITY_DAYS: u64 = 3_650;

/// W3C VC issuer block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerInfo {
    /// `did:nostr:<pubkey>`
    pub id: String,
    /// Display name
    pub name: String,
}

/// Permit claim inside the subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermitClaim {
    /// Permit id
    pub id: String,
    /// Level
    pub level: u32,
    /// Readable name
    pub name: String,
}

/// Attestation claim inside the subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationClaim {
    /// Unique attesters
    pub count: usize,
    /// `did:nostr:` references of the attesters
    pub attestors: Vec<String>,
}

/// W3C VC credential subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialSubject {
    /// `did:nostr:<holder>`
    pub id: String,
    /// The certified permit
    pub permit: PermitClaim,
    /// Certified skills
    pub skills: Vec<String>,
    /// Who vouched
    pub attestations: AttestationClaim,
}

/// W3C Verifiable Credential payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiableCredential {
    /// JSON-LD contexts
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    /// Credential types
    #[serde(rename = "type")]
    pub types: Vec<String>,
    /// Issuer block
    pub issuer: IssuerInfo,
    /// Issuance date, ISO 8601
    #[serde(rename = "issuanceDate")]
    pub issuance_date: String,
    /// Expiration date, ISO 8601
    #[serde(rename = "expirationDate")]
    pub expiration_date: String,
    /// Subject
    #[serde(rename = "credentialSubject")]
    pub credential_subject: CredentialSubject,
}

/// A generated credential: the VC payload, its signed envelope and its id
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    /// W3C VC payload
    pub vc: VerifiableCredential,
    /// Signed kind-30503 event carrying the minified payload
    pub event: Event,
    /// Credential id (`d` tag)
    pub credential_id: String,
}

/// Credential generator bound to the issuer key
#[derive(Debug, Clone)]
pub struct CredentialGenerator {
    keys: Keys,
}

impl CredentialGenerator {
    /// New generator signing with the given keys
    pub fn new(keys: Keys) -> Self {
        Self { keys }
    }

    /// Issuer public key
    #[inline]
    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    /// Generate a complete credential.
    ///
    /// Validity defaults by permit family: skills one year, licenses five,
    /// authorities ten.
    pub fn generate(
        &self,
        holder: &PublicKey,
        permit_id: &str,
        request_id: &str,
        attestors: &[PublicKey],
        skills: &[String],
        validity_days: Option<u64>,
    ) -> Result<IssuedCredential, OracleError> {
        let issued_at: Timestamp = Timestamp::now();
        let validity_days: u64 = validity_days.unwrap_or_else(|| validity_for(permit_id));
        let expires_at: Timestamp = issued_at + validity_days * DAY;
        let level: u32 = permit::level(permit_id);

        let issuer_hex: String = self.keys.public_key().to_hex();
        let credential_id: String = credential_id(holder, permit_id, issued_at);

        let vc = VerifiableCredential {
            context: CONTEXTS.iter().map(|c| c.to_string()).collect(),
            types: TYPES.iter().map(|t| t.to_string()).collect(),
            issuer: IssuerInfo {
                id: format!("did:nostr:{issuer_hex}"),
                name: String::from("TrocZen Oracle"),
            },
            issuance_date: iso8601(issued_at),
            expiration_date: iso8601(expires_at),
            credential_subject: CredentialSubject {
                id: format!("did:nostr:{holder}"),
                permit: PermitClaim {
                    id: permit_id.to_string(),
                    level,
                    name: permit::display_name(permit_id),
                },
                skills: skills.to_vec(),
                attestations: AttestationClaim {
                    count: attestors.len(),
                    attestors: attestors
                        .iter()
                        .map(|a| format!("did:nostr:{a}"))
                        .collect(),
                },
            },
        };

        let mut tags: Vec<Tag> = vec![
            Tag::identifier(credential_id.clone()),
            Tag::custom("e", request_id),
            Tag::public_key(*holder),
            Tag::custom("permit_id", permit_id),
            Tag::custom("level", level.to_string()),
            Tag::custom("expires", expires_at.to_string()),
            Tag::custom("attestations", attestors.len().to_string()),
        ];

        for attestor in attestors.iter() {
            tags.push(Tag::custom("attestor", attestor.to_hex()));
        }

        for skill in skills.iter() {
            tags.push(Tag::custom("skill", skill.clone()));
        }

        let content: String =
            serde_json::to_string(&vc).unwrap_or_else(|_| String::from("{}"));

        let event: Event = EventBuilder::new(Kind::PermitCredential, content, tags)
            .custom_created_at(issued_at)
            .sign(&self.keys)?;

        Ok(IssuedCredential {
            vc,
            event,
            credential_id,
        })
    }

    /// NIP-58 badge definition (kind 30008), one per permit
    pub fn badge_definition(
        &self,
        permit_id: &str,
        image_url: Option<&str>,
    ) -> Result<Event, OracleError> {
        let level: u32 = permit::level(permit_id);
        let name: String = permit::display_name(permit_id);

        let image: String = image_url
            .map(String::from)
            .unwrap_or_else(|| format!("https://troczen.org/badges/{permit_id}.png"));
        let thumb: String = image_url
            .map(String::from)
            .unwrap_or_else(|| format!("https://troczen.org/badges/{permit_id}_thumb.png"));

        let event: Event = EventBuilder::new(
            Kind::BadgeDefinition,
            "",
            vec![
                Tag::identifier(format!("badge_{permit_id}")),
                Tag::custom("name", name),
                Tag::custom("description", format!("Mastery badge - level X{level}")),
                Tag::custom("image", image),
                Tag::custom("thumb", thumb),
            ],
        )
        .sign(&self.keys)?;

        Ok(event)
    }

    /// NIP-58 badge award (kind 8), one per obtained credential
    pub fn badge_award(
        &self,
        holder: &PublicKey,
        permit_id: &str,
        credential_event_id: &EventId,
    ) -> Result<Event, OracleError> {
        let name: String = permit::display_name(permit_id);
        let issuer_hex: String = self.keys.public_key().to_hex();

        let event: Event = EventBuilder::new(
            Kind::BadgeAward,
            format!("Congratulations! You earned the {name} badge"),
            vec![
                Tag::custom(
                    "a",
                    format!("30008:{issuer_hex}:badge_{permit_id}"),
                ),
                Tag::public_key(*holder),
                Tag::event(*credential_event_id),
            ],
        )
        .sign(&self.keys)?;

        Ok(event)
    }
}

/// Validity in days by permit family, detected from the id
pub fn validity_for(permit_id: &str) -> u64 {
    if permit_id.contains("LICENSE") || permit_id.contains("DRIVER") {
        VALIDITY_LICENSE_DAYS
    } else if permit_id.contains("AUTHORITY") || permit_id.contains("ADMIN") {
        VALIDITY_AUTHORITY_DAYS
    } else {
        VALIDITY_SKILL_DAYS
    }
}

/// `vc_` + the first 16 hex chars of `sha256(holder:permit:issued_at)`
fn credential_id(holder: &PublicKey, permit_id: &str, issued_at: Timestamp) -> String {
    let data: String = format!("{holder}:{permit_id}:{issued_at}");
    let hash: Sha256Hash = Sha256Hash::hash(data.as_bytes());
    let hex: String = hex::encode(hash.to_byte_array());
    format!("vc_{}", &hex[..16])
}

/// Unix seconds to `YYYY-MM-DDTHH:MM:SSZ`
fn iso8601(ts: Timestamp) -> String {
    match DateTime::from_timestamp(ts.as_i64(), 0) {
        Some(datetime) => datetime.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        None => String::from("1970-01-01T00:00:00Z"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use troczen::records::Credential;

    #[test]
    fn test_validity_by_family() {
        assert_eq!(validity_for("PERMIT_MARAICHAGE_X1"), 365);
        assert_eq!(validity_for("PERMIT_DRIVER_LICENSE_V1"), 1_825);
        assert_eq!(validity_for("PERMIT_MARKET_ADMIN_V1"), 3_650);
    }

    #[test]
    fn test_iso8601() {
        assert_eq!(iso8601(Timestamp::from_secs(0)), "1970-01-01T00:00:00Z");
        assert_eq!(
            iso8601(Timestamp::from_secs(1_700_000_000)),
            "2023-11-14T22:13:20Z"
        );
    }

    #[test]
    fn test_generate_produces_a_valid_envelope() {
        let issuer = Keys::generate();
        let holder = Keys::generate().public_key();
        let attestor = Keys::generate().public_key();
        let generator = CredentialGenerator::new(issuer.clone());

        let issued = generator
            .generate(
                &holder,
                "PERMIT_MARAICHAGE_X1",
                "req-1",
                &[attestor],
                &[String::from("semis")],
                None,
            )
            .unwrap();

        issued.event.verify().unwrap();
        assert_eq!(issued.event.kind, Kind::PermitCredential);
        assert_eq!(issued.event.pubkey, issuer.public_key());
        assert!(issued.credential_id.starts_with("vc_"));
        assert_eq!(issued.credential_id.len(), 3 + 16);

        let parsed = Credential::from_event(&issued.event).unwrap();
        assert_eq!(parsed.permit_id, "PERMIT_MARAICHAGE_X1");
        assert_eq!(parsed.holder, Some(holder));
        assert_eq!(parsed.attestors, vec![attestor]);
        assert_eq!(parsed.skills, vec!["semis"]);
        assert_eq!(
            parsed.expires_at.as_u64() - parsed.issued_at.as_u64(),
            365 * DAY
        );

        // the minified payload round-trips
        let vc: VerifiableCredential =
            serde_json::from_str(&issued.event.content).unwrap();
        assert_eq!(vc, issued.vc);
        assert_eq!(vc.credential_subject.permit.name, "Maraichage");
        assert_eq!(vc.credential_subject.attestations.count, 1);
    }

    #[test]
    fn test_explicit_validity_wins() {
        let issuer = Keys::generate();
        let holder = Keys::generate().public_key();
        let generator = CredentialGenerator::new(issuer);

        let issued = generator
            .generate(&holder, "PERMIT_MARAICHAGE_X1", "req-1", &[], &[], Some(30))
            .unwrap();

        let parsed = Credential::from_event(&issued.event).unwrap();
        assert_eq!(
            parsed.expires_at.as_u64() - parsed.issued_at.as_u64(),
            30 * DAY
        );
    }

    #[test]
    fn test_badge_pair() {
        let issuer = Keys::generate();
        let holder = Keys::generate().public_key();
        let generator = CredentialGenerator::new(issuer.clone());

        let definition = generator
            .badge_definition("PERMIT_MARAICHAGE_X2", None)
            .unwrap();
        definition.verify().unwrap();
        assert_eq!(definition.kind, Kind::BadgeDefinition);
        assert_eq!(definition.identifier(), Some("badge_PERMIT_MARAICHAGE_X2"));

        let award = generator
            .badge_award(&holder, "PERMIT_MARAICHAGE_X2", &definition.id)
            .unwrap();
        award.verify().unwrap();
        assert_eq!(award.kind, Kind::BadgeAward);
        assert_eq!(award.tag_content("p"), Some(holder.to_hex().as_str()));
        assert_eq!(
            award.tag_content("a"),
            Some(
                format!(
                    "30008:{}:badge_PERMIT_MARAICHAGE_X2",
                    issuer.public_key().to_hex()
                )
                .as_str()
            )
        );
    }
}
