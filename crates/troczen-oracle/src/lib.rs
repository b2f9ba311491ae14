// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! TrocZen ORACLE.
//!
//! Peer certification without a database: the relay holds the web of
//! trust, the oracle watches attestations (kind 30502), verifies
//! eligibility, counts unique attesters and issues W3C Verifiable
//! Credentials (kind 30503) back to the relay once the threshold is met.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod credential;
pub mod error;
pub mod service;

pub use self::credential::{CredentialGenerator, IssuedCredential, VerifiableCredential};
pub use self::error::OracleError;
pub use self::service::{OracleOptions, OracleService, Outcome, RejectReason};
