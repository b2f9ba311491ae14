// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Event

use core::fmt;
use core::str::FromStr;

use secp256k1::schnorr::Signature;
use secp256k1::Message;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod builder;
pub mod id;
pub mod kind;
pub mod tag;

pub use self::builder::EventBuilder;
pub use self::id::EventId;
pub use self::kind::Kind;
pub use self::tag::Tag;
use crate::key::PublicKey;
use crate::types::Timestamp;
use crate::util::{JsonUtil, SECP256K1};

/// [`Event`] error
#[derive(Debug)]
pub enum Error {
    /// Event id doesn't match the event data
    InvalidId,
    /// Schnorr signature verification failed
    InvalidSignature,
    /// JSON de/serialization error
    Json(serde_json::Error),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidId => write!(f, "Invalid event id"),
            Self::InvalidSignature => write!(f, "Invalid signature"),
            Self::Json(e) => write!(f, "Json: {e}"),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Signed event
///
/// Field order matches the wire representation: `{id, pubkey, created_at,
/// kind, tags, content, sig}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Id
    pub id: EventId,
    /// Author
    pub pubkey: PublicKey,
    /// Timestamp (seconds)
    pub created_at: Timestamp,
    /// Kind
    pub kind: Kind,
    /// Tag list
    pub tags: Vec<Tag>,
    /// Content
    pub content: String,
    /// Signature
    #[serde(serialize_with = "sig_to_string", deserialize_with = "sig_from_string")]
    pub sig: Signature,
}

fn sig_to_string<S>(sig: &Signature, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&sig.to_string())
}

fn sig_from_string<'de, D>(deserializer: D) -> Result<Signature, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = String::deserialize(deserializer)?;
    Signature::from_str(&s).map_err(serde::de::Error::custom)
}

impl Event {
    /// Verify both the id and the signature
    pub fn verify(&self) -> Result<(), Error> {
        if !self.verify_id() {
            return Err(Error::InvalidId);
        }

        if !self.verify_signature() {
            return Err(Error::InvalidSignature);
        }

        Ok(())
    }

    /// Verify that the id matches the event data
    pub fn verify_id(&self) -> bool {
        let id: EventId = EventId::new(
            &self.pubkey,
            &self.created_at,
            &self.kind,
            &self.tags,
            &self.content,
        );
        id == self.id
    }

    /// Verify the Schnorr signature against the id
    pub fn verify_signature(&self) -> bool {
        let message = Message::from_digest(self.id.to_bytes());
        SECP256K1
            .verify_schnorr(&self.sig, &message, self.pubkey.as_x_only())
            .is_ok()
    }

    /// Value of the first tag with the given name
    pub fn tag_content(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.name() == name)
            .and_then(|tag| tag.content())
    }

    /// Values of every tag with the given name (for multi-valued tags
    /// like `p`, `attestor` and `skill`)
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |tag| tag.name() == name)
            .filter_map(|tag| tag.content())
    }

    /// Value of the `d` tag, the replaceable identifier
    #[inline]
    pub fn identifier(&self) -> Option<&str> {
        self.tag_content("d")
    }
}

impl JsonUtil for Event {
    type Err = Error;
}
