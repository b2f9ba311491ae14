// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Prelude

#![allow(unknown_lints)]
#![allow(ambiguous_glob_reexports)]
#![doc(hidden)]

pub use crate::event::builder::*;
pub use crate::event::id::*;
pub use crate::event::kind::*;
pub use crate::event::tag::*;
pub use crate::event::*;
pub use crate::filter::*;
pub use crate::key::*;
pub use crate::market::*;
pub use crate::message::*;
pub use crate::permit::{self, PermitType};
pub use crate::records::*;
pub use crate::types::*;
pub use crate::util::*;
pub use crate::*;
