// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Subscription filters

use std::collections::{BTreeMap, BTreeSet};

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::event::{Event, EventId, Kind};
use crate::key::PublicKey;
use crate::types::Timestamp;
use crate::util::JsonUtil;

type GenericTags = BTreeMap<String, BTreeSet<String>>;

/// Subscription filter
///
/// Tag filters are serialized with a `#` prefix (`#market`, `#e`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Filter {
    /// List of event ids
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub ids: Option<BTreeSet<EventId>>,
    /// List of authors
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub authors: Option<BTreeSet<PublicKey>>,
    /// List of kinds
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub kinds: Option<BTreeSet<Kind>>,
    /// Events must be newer than this to pass
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub since: Option<Timestamp>,
    /// Events must be older than this to pass
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub until: Option<Timestamp>,
    /// Maximum number of events to be returned
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub limit: Option<usize>,
    /// Generic tag queries
    #[serde(
        flatten,
        serialize_with = "serialize_generic_tags",
        deserialize_with = "deserialize_generic_tags"
    )]
    #[serde(default)]
    pub generic_tags: GenericTags,
}

impl Filter {
    /// Create a new empty [`Filter`]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event id
    pub fn id(mut self, id: EventId) -> Self {
        self.ids.get_or_insert_with(BTreeSet::new).insert(id);
        self
    }

    /// Add event ids
    pub fn ids<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = EventId>,
    {
        self.ids.get_or_insert_with(BTreeSet::new).extend(ids);
        self
    }

    /// Add an author
    pub fn author(mut self, author: PublicKey) -> Self {
        self.authors.get_or_insert_with(BTreeSet::new).insert(author);
        self
    }

    /// Add authors
    pub fn authors<I>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = PublicKey>,
    {
        self.authors.get_or_insert_with(BTreeSet::new).extend(authors);
        self
    }

    /// Add a kind
    pub fn kind(mut self, kind: Kind) -> Self {
        self.kinds.get_or_insert_with(BTreeSet::new).insert(kind);
        self
    }

    /// Add kinds
    pub fn kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = Kind>,
    {
        self.kinds.get_or_insert_with(BTreeSet::new).extend(kinds);
        self
    }

    /// Set the `since` bound
    pub fn since(mut self, since: Timestamp) -> Self {
        self.since = Some(since);
        self
    }

    /// Set the `until` bound
    pub fn until(mut self, until: Timestamp) -> Self {
        self.until = Some(until);
        self
    }

    /// Set the result limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Add a `#<name>` tag filter value
    pub fn custom_tag<S1, S2>(mut self, name: S1, value: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.generic_tags
            .entry(name.into())
            .or_default()
            .insert(value.into());
        self
    }

    /// Filter on the `d` (identifier) tag
    #[inline]
    pub fn identifier<S>(self, identifier: S) -> Self
    where
        S: Into<String>,
    {
        self.custom_tag("d", identifier)
    }

    /// Filter on the `e` (event reference) tag
    #[inline]
    pub fn event(self, id: EventId) -> Self {
        self.custom_tag("e", id.to_hex())
    }

    /// Filter on the `p` (public key) tag
    #[inline]
    pub fn pubkey(self, pubkey: PublicKey) -> Self {
        self.custom_tag("p", pubkey.to_hex())
    }

    /// Check if the filter is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self == &Filter::default()
    }

    fn ids_match(&self, event: &Event) -> bool {
        self.ids
            .as_ref()
            .map_or(true, |ids| ids.is_empty() || ids.contains(&event.id))
    }

    fn authors_match(&self, event: &Event) -> bool {
        self.authors.as_ref().map_or(true, |authors| {
            authors.is_empty() || authors.contains(&event.pubkey)
        })
    }

    fn kind_match(&self, event: &Event) -> bool {
        self.kinds.as_ref().map_or(true, |kinds| {
            kinds.is_empty() || kinds.contains(&event.kind)
        })
    }

    fn tag_match(&self, event: &Event) -> bool {
        if self.generic_tags.is_empty() {
            return true;
        }

        if event.tags.is_empty() {
            return false;
        }

        self.generic_tags.iter().all(|(tag_name, set)| {
            event
                .tag_values(tag_name)
                .any(|value| set.contains(value))
        })
    }

    /// Determine if the filter matches the given [`Event`].
    pub fn match_event(&self, event: &Event) -> bool {
        self.ids_match(event)
            && self.authors_match(event)
            && self.kind_match(event)
            && self.since.map_or(true, |t| event.created_at >= t)
            && self.until.map_or(true, |t| event.created_at <= t)
            && self.tag_match(event)
    }
}

impl JsonUtil for Filter {
    type Err = serde_json::Error;
}

fn serialize_generic_tags<S>(generic_tags: &GenericTags, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(generic_tags.len()))?;
    for (tag, values) in generic_tags.iter() {
        map.serialize_entry(&format!("#{tag}"), values)?;
    }
    map.end()
}

fn deserialize_generic_tags<'de, D>(deserializer: D) -> Result<GenericTags, D::Error>
where
    D: Deserializer<'de>,
{
    let map: BTreeMap<String, Value> = BTreeMap::deserialize(deserializer)?;
    let mut generic_tags: GenericTags = GenericTags::new();

    for (key, value) in map.into_iter() {
        if let Some(tag_name) = key.strip_prefix('#') {
            let values: BTreeSet<String> =
                serde_json::from_value(value).map_err(serde::de::Error::custom)?;
            generic_tags.insert(tag_name.to_string(), values);
        }
    }

    Ok(generic_tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::event::{EventBuilder, Tag};
    use crate::key::Keys;

    #[test]
    fn test_serialization() {
        let filter = Filter::new()
            .kind(Kind::Bond)
            .custom_tag("market", "market_toulouse")
            .limit(10);
        assert_eq!(
            filter.as_json(),
            r##"{"kinds":[30303],"limit":10,"#market":["market_toulouse"]}"##
        );
    }

    #[test]
    fn test_deserialization() {
        let json = r##"{"kinds":[30502],"#e":["abc"],"since":100,"limit":0}"##;
        let filter = Filter::from_json(json).unwrap();
        assert_eq!(filter.limit, Some(0));
        assert_eq!(filter.since, Some(Timestamp::from_secs(100)));
        assert_eq!(
            filter.generic_tags.get("e"),
            Some(&BTreeSet::from(["abc".to_string()]))
        );
    }

    #[test]
    fn test_match_event() {
        let keys = Keys::generate();
        let event = EventBuilder::new(
            Kind::Bond,
            "",
            vec![
                Tag::identifier("bon-1"),
                Tag::custom("market", "market_toulouse"),
            ],
        )
        .custom_created_at(Timestamp::from_secs(1_000))
        .sign(&keys)
        .unwrap();

        assert!(Filter::new().kind(Kind::Bond).match_event(&event));
        assert!(Filter::new().author(keys.public_key()).match_event(&event));
        assert!(Filter::new()
            .custom_tag("market", "market_toulouse")
            .match_event(&event));
        assert!(Filter::new().identifier("bon-1").match_event(&event));
        assert!(Filter::new()
            .since(Timestamp::from_secs(900))
            .until(Timestamp::from_secs(1_100))
            .match_event(&event));

        assert!(!Filter::new().kind(Kind::Circuit).match_event(&event));
        assert!(!Filter::new()
            .custom_tag("market", "market_paris")
            .match_event(&event));
        assert!(!Filter::new()
            .until(Timestamp::from_secs(900))
            .match_event(&event));
        assert!(!Filter::new().author(Keys::generate().public_key()).match_event(&event));
    }
}
