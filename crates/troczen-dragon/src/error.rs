// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Engine errors

use thiserror::Error;

/// DRAGON engine error
#[derive(Debug, Error)]
pub enum EngineError {
    /// Relay transport error
    #[error("relay: {0}")]
    Relay(#[from] troczen_relay::Error),
    /// Query failed (partial results are discarded by the engines)
    #[error("query: {0}")]
    Query(#[from] troczen_relay::QueryFailure),
}
