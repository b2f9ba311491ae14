// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Basic types

pub mod time;

pub use self::time::Timestamp;
