// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Prelude

#![allow(unknown_lints)]
#![allow(ambiguous_glob_reexports)]
#![doc(hidden)]

pub use troczen::prelude::*;

pub use crate::client::*;
pub use crate::error::*;
pub use crate::mock::{MockRelay, MockRelayOptions};
pub use crate::options::*;
