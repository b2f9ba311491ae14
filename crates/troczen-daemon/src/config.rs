// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Daemon configuration, read once from the environment at startup.

use std::path::PathBuf;

use thiserror::Error;
use troczen::key::{Keys, PublicKey};
use troczen_relay::RelayOptions;

/// Default relay URL
pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:7777";

/// Configuration error; fatal at startup (exit code 1)
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `ORACLE_NSEC_HEX` missing or empty
    #[error("ORACLE_NSEC_HEX is not set")]
    MissingIssuerKey,
    /// `ORACLE_NSEC_HEX` is not a valid 32-byte hex key
    #[error("invalid ORACLE_NSEC_HEX: {0}")]
    InvalidIssuerKey(troczen::key::Error),
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Relay URL (`NOSTR_RELAY`)
    pub relay_url: String,
    /// Issuer keys (`ORACLE_NSEC_HEX`)
    pub keys: Keys,
    /// Relay pagination/timeout options
    pub relay_opts: RelayOptions,
    /// Log filter (`LOG_LEVEL`)
    pub log_level: String,
    /// Optional log file (`LOG_FILE`)
    pub log_file: Option<PathBuf>,
    /// Production formatting (`PRODUCTION`)
    pub production: bool,
}

impl Config {
    /// Read the configuration from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let relay_url: String =
            env_string("NOSTR_RELAY").unwrap_or_else(|| DEFAULT_RELAY_URL.to_string());

        let nsec: String = env_string("ORACLE_NSEC_HEX").ok_or(ConfigError::MissingIssuerKey)?;
        let keys: Keys = Keys::parse(nsec).map_err(ConfigError::InvalidIssuerKey)?;

        // ORACLE_PUBKEY is derived from the nsec; a configured value that
        // disagrees is a deployment mistake worth surfacing
        if let Some(configured) = env_string("ORACLE_PUBKEY") {
            match PublicKey::from_hex(&configured) {
                Ok(configured) if configured != keys.public_key() => {
                    tracing::warn!(
                        "ORACLE_PUBKEY does not match the key derived from ORACLE_NSEC_HEX; using the derived one"
                    );
                }
                Ok(_) => {}
                Err(_) => tracing::warn!("Ignoring unparsable ORACLE_PUBKEY"),
            }
        }

        Ok(Self {
            relay_url,
            keys,
            relay_opts: RelayOptions::from_env(),
            log_level: env_string("LOG_LEVEL").unwrap_or_else(|| String::from("info")),
            log_file: env_string("LOG_FILE").map(PathBuf::from),
            production: env_string("PRODUCTION")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}

fn env_string(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
