// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Secret key

use core::fmt;
use core::str::FromStr;

use super::Error;

/// Secret key (32 bytes)
///
/// The inner bytes are never printed by [`fmt::Debug`].
#[derive(Clone)]
pub struct SecretKey(secp256k1::SecretKey);

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(<redacted>)")
    }
}

impl SecretKey {
    /// Parse from a 64-char hex string
    pub fn from_hex<S>(hex: S) -> Result<Self, Error>
    where
        S: AsRef<str>,
    {
        Ok(Self(
            secp256k1::SecretKey::from_str(hex.as_ref()).map_err(|_| Error::InvalidSecretKey)?,
        ))
    }

    /// Get as hex string
    #[inline]
    pub fn to_secret_hex(&self) -> String {
        hex::encode(self.0.secret_bytes())
    }

    /// Get the inner [`secp256k1::SecretKey`]
    #[inline]
    pub fn as_secp256k1(&self) -> &secp256k1::SecretKey {
        &self.0
    }
}

impl From<secp256k1::SecretKey> for SecretKey {
    fn from(sk: secp256k1::SecretKey) -> Self {
        Self(sk)
    }
}

impl FromStr for SecretKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
