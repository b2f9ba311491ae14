// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! TrocZen DRAGON engines.
//!
//! Stateless analytics over the relay: every computation opens its own
//! short-lived connection, queries what it needs, and discards everything
//! at the end of the request. The relay is the single source of truth.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod circuits;
pub mod dashboard;
pub mod directory;
pub mod du;
pub mod error;
pub mod params;
pub mod service;
pub mod stats;

pub use self::dashboard::{Dashboard, SignalThresholds};
pub use self::error::EngineError;
pub use self::service::DragonService;

use troczen::event::Event;

/// Parse a batch of events, dropping malformed ones with a warning.
pub(crate) fn parse_events<T, F>(events: &[Event], parse: F) -> Vec<T>
where
    F: Fn(&Event) -> Option<T>,
{
    events
        .iter()
        .filter_map(|event| {
            let record = parse(event);
            if record.is_none() {
                tracing::warn!(id = %event.id, kind = %event.kind, "Dropping malformed event");
            }
            record
        })
        .collect()
}
