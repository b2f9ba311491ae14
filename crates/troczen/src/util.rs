// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Util

use once_cell::sync::Lazy;
use secp256k1::{All, Secp256k1};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Secp256k1 global context
pub static SECP256K1: Lazy<Secp256k1<All>> = Lazy::new(|| {
    let mut ctx = Secp256k1::new();
    let mut rng = rand::thread_rng();
    ctx.randomize(&mut rng);
    ctx
});

/// JSON util
pub trait JsonUtil: Sized + Serialize + DeserializeOwned
where
    <Self as JsonUtil>::Err: From<serde_json::Error>,
{
    /// Error
    type Err;

    /// Deserialize JSON
    fn from_json<T>(json: T) -> Result<Self, Self::Err>
    where
        T: AsRef<[u8]>,
    {
        Ok(serde_json::from_slice(json.as_ref())?)
    }

    /// Serialize to JSON string
    fn as_json(&self) -> String {
        serde_json::to_string(self).expect("serialization can't fail")
    }
}
