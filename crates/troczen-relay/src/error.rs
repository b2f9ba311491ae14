// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Relay client errors

use thiserror::Error;
use troczen::Event;

/// Relay client error
#[derive(Debug, Error)]
pub enum Error {
    /// WebSocket transport error
    #[error("transport: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    /// The operation did not complete in time
    #[error("timeout")]
    Timeout,
    /// The relay closed the connection
    #[error("connection closed by relay")]
    ConnectionClosed,
}

/// A query that failed after receiving part of its results.
///
/// Queries are best-effort: everything received before the failure is
/// returned alongside the error.
#[derive(Debug, Error)]
#[error("query failed after {} events: {source}", partial.len())]
pub struct QueryFailure {
    /// Events received before the failure
    pub partial: Vec<Event>,
    /// The underlying error
    #[source]
    pub source: Error,
}

impl QueryFailure {
    /// Wrap an error with the events collected so far
    pub fn new(partial: Vec<Event>, source: Error) -> Self {
        Self { partial, source }
    }
}

impl From<Error> for QueryFailure {
    fn from(source: Error) -> Self {
        Self {
            partial: Vec::new(),
            source,
        }
    }
}
