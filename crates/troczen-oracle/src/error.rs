// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Oracle errors

use thiserror::Error;

/// Oracle error
#[derive(Debug, Error)]
pub enum OracleError {
    /// Relay transport error
    #[error("relay: {0}")]
    Relay(#[from] troczen_relay::Error),
    /// Query failed
    #[error("query: {0}")]
    Query(#[from] troczen_relay::QueryFailure),
    /// Signing failed
    #[error("signing: {0}")]
    Key(#[from] troczen::key::Error),
}
