// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Event builder

use secp256k1::Message;

use super::{Event, EventId, Kind, Tag};
use crate::key::Keys;
use crate::types::Timestamp;

/// Unsigned event data, signed into an [`Event`] with [`EventBuilder::sign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBuilder {
    kind: Kind,
    tags: Vec<Tag>,
    content: String,
    custom_created_at: Option<Timestamp>,
}

impl EventBuilder {
    /// New event builder
    pub fn new<S>(kind: Kind, content: S, tags: Vec<Tag>) -> Self
    where
        S: Into<String>,
    {
        Self {
            kind,
            tags,
            content: content.into(),
            custom_created_at: None,
        }
    }

    /// Append a tag
    pub fn tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// Use a fixed timestamp instead of the current time
    pub fn custom_created_at(mut self, created_at: Timestamp) -> Self {
        self.custom_created_at = Some(created_at);
        self
    }

    /// Compute the id and sign with Schnorr
    pub fn sign(self, keys: &Keys) -> Result<Event, crate::key::Error> {
        let pubkey = keys.public_key();
        let created_at: Timestamp = self.custom_created_at.unwrap_or_else(Timestamp::now);

        let id: EventId = EventId::new(&pubkey, &created_at, &self.kind, &self.tags, &self.content);
        let message = Message::from_digest(id.to_bytes());

        Ok(Event {
            id,
            pubkey,
            created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            sig: keys.sign_schnorr(&message),
        })
    }
}
