// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! TrocZen protocol core.
//!
//! Implements the Nostr event model this platform is built on (events,
//! keys, wire messages, subscription filters) together with the TrocZen
//! kind semantics: typed records for bonds, circuits, permits,
//! attestations and credentials, permit-id logic and market-tag
//! normalization.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod event;
pub mod filter;
pub mod key;
pub mod market;
pub mod message;
pub mod permit;
pub mod prelude;
pub mod records;
pub mod types;
pub mod util;

pub use self::event::{Event, EventBuilder, EventId, Kind, Tag};
pub use self::filter::Filter;
pub use self::key::{Keys, PublicKey, SecretKey};
pub use self::message::{ClientMessage, RelayMessage, SubscriptionId};
pub use self::types::Timestamp;
pub use self::util::JsonUtil;
