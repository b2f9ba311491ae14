// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Wire messages

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

pub mod client;
pub mod relay;

pub use self::client::ClientMessage;
pub use self::relay::RelayMessage;

/// Messages error
#[derive(Debug)]
pub enum MessageHandleError {
    /// Impossible to deserialize the message
    InvalidMessage,
    /// JSON de/serialization error
    Json(serde_json::Error),
    /// Event error
    Event(crate::event::Error),
}

impl std::error::Error for MessageHandleError {}

impl fmt::Display for MessageHandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMessage => write!(f, "Message has an invalid format"),
            Self::Json(e) => write!(f, "Json: {e}"),
            Self::Event(e) => write!(f, "Event: {e}"),
        }
    }
}

impl From<serde_json::Error> for MessageHandleError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<crate::event::Error> for MessageHandleError {
    fn from(e: crate::event::Error) -> Self {
        Self::Event(e)
    }
}

static SUBSCRIPTION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Subscription ID
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Construct from an arbitrary string
    pub fn new<S>(id: S) -> Self
    where
        S: Into<String>,
    {
        Self(id.into())
    }

    /// Generate a subscription id unique for this process
    pub fn generate() -> Self {
        let n: u64 = SUBSCRIPTION_COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("troczen-{n}"))
    }

    /// Get as `&str`
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = SubscriptionId::generate();
        let b = SubscriptionId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("troczen-"));
    }
}
