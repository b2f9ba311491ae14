// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! TrocZen relay client.
//!
//! One WebSocket to one relay: REQ/EVENT/EOSE collection, cursored
//! pagination, fire-and-forget publishing and the long-lived subscription
//! primitive the oracle daemon is built on. Ships an in-process mock relay
//! for integration tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod mock;
pub mod options;
pub mod prelude;

pub use self::client::{RelayClient, RelayConnection};
pub use self::error::{Error, QueryFailure};
pub use self::options::RelayOptions;
