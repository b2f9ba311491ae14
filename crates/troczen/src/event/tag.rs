// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Tag

use core::fmt;
use std::vec::IntoIter;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::EventId;
use crate::key::PublicKey;

/// [`Tag`] error
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// Empty tag
    EmptyTag,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTag => write!(f, "empty tag"),
        }
    }
}

/// Event tag: an ordered, non-empty sequence of strings.
///
/// The first element is the tag name, the second (if any) its value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    buf: Vec<String>,
}

impl Tag {
    /// Construct from a list of string slots.
    ///
    /// Returns an error if the list is empty.
    pub fn parse<I, S>(slots: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let buf: Vec<String> = slots.into_iter().map(|s| s.into()).collect();

        if buf.is_empty() {
            return Err(Error::EmptyTag);
        }

        Ok(Self { buf })
    }

    /// Construct a `[name, value]` pair
    pub fn custom<S1, S2>(name: S1, value: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            buf: vec![name.into(), value.into()],
        }
    }

    /// Construct a `d` (identifier) tag
    #[inline]
    pub fn identifier<S>(identifier: S) -> Self
    where
        S: Into<String>,
    {
        Self::custom("d", identifier)
    }

    /// Construct an `e` (event reference) tag
    #[inline]
    pub fn event(event_id: EventId) -> Self {
        Self::custom("e", event_id.to_hex())
    }

    /// Construct a `p` (public key) tag
    #[inline]
    pub fn public_key(public_key: PublicKey) -> Self {
        Self::custom("p", public_key.to_hex())
    }

    /// Tag name (the first element)
    #[inline]
    pub fn name(&self) -> &str {
        &self.buf[0]
    }

    /// Tag value (the second element, if any)
    #[inline]
    pub fn content(&self) -> Option<&str> {
        self.buf.get(1).map(|s| s.as_str())
    }

    /// All slots
    #[inline]
    pub fn as_slice(&self) -> &[String] {
        &self.buf
    }

    /// Consume the tag and return its slots
    #[inline]
    pub fn to_vec(self) -> Vec<String> {
        self.buf
    }
}

impl IntoIterator for Tag {
    type Item = String;
    type IntoIter = IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.buf.into_iter()
    }
}

impl Serialize for Tag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.buf.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let buf: Vec<String> = Vec::deserialize(deserializer)?;
        Self::parse(buf).map_err(serde::de::Error::custom)
    }
}
