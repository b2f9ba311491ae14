// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Relay options

use std::time::Duration;

/// Default events per pagination page
pub const DEFAULT_PAGE_SIZE: usize = 500;
/// Default cap on paginated results
pub const DEFAULT_MAX_RESULTS: usize = 10_000;
/// Default per-query timeout
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Relay client options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOptions {
    /// Events per pagination page
    pub page_size: usize,
    /// Cap on paginated results
    pub max_results: usize,
    /// Per-query timeout
    pub query_timeout: Duration,
    /// Connection timeout
    pub connection_timeout: Duration,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_results: DEFAULT_MAX_RESULTS,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }
}

impl RelayOptions {
    /// New options with defaults
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pagination page size
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set the cap on paginated results
    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Set the per-query timeout
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Set the connection timeout
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Read `NOSTR_PAGE_SIZE` and `NOSTR_MAX_RESULTS` from the environment,
    /// keeping defaults for anything absent or unparsable.
    pub fn from_env() -> Self {
        let mut opts = Self::default();

        if let Some(page_size) = env_usize("NOSTR_PAGE_SIZE") {
            opts = opts.page_size(page_size);
        }

        if let Some(max_results) = env_usize("NOSTR_MAX_RESULTS") {
            opts = opts.max_results(max_results);
        }

        opts
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok()?.parse().ok()
}
