// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Event kind

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Event kind
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Kind {
    /// Profile metadata (kind 0)
    Metadata,
    /// Contact list (kind 3)
    ContactList,
    /// Badge award (kind 8)
    BadgeAward,
    /// Badge definition (kind 30008)
    BadgeDefinition,
    /// Zen bond (kind 30303)
    Bond,
    /// Closed circuit (kind 30304)
    Circuit,
    /// Permit definition (kind 30500)
    PermitDefinition,
    /// Permit request (kind 30501)
    PermitRequest,
    /// Permit attestation (kind 30502)
    PermitAttestation,
    /// Verifiable credential (kind 30503)
    PermitCredential,
    /// Any other kind
    Custom(u16),
}

impl Kind {
    /// Get kind as 16-bit unsigned number
    pub const fn as_u16(&self) -> u16 {
        match self {
            Self::Metadata => 0,
            Self::ContactList => 3,
            Self::BadgeAward => 8,
            Self::BadgeDefinition => 30008,
            Self::Bond => 30303,
            Self::Circuit => 30304,
            Self::PermitDefinition => 30500,
            Self::PermitRequest => 30501,
            Self::PermitAttestation => 30502,
            Self::PermitCredential => 30503,
            Self::Custom(u) => *u,
        }
    }

    /// Get kind as 64-bit unsigned number
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.as_u16() as u64
    }

    /// Replaceable by (author, kind): kinds 0, 3 and 10000-19999
    pub const fn is_replaceable(&self) -> bool {
        let k: u16 = self.as_u16();
        k == 0 || k == 3 || (10_000 <= k && k < 20_000)
    }

    /// Addressable by (author, kind, `d` tag): kinds 30000-39999
    pub const fn is_addressable(&self) -> bool {
        let k: u16 = self.as_u16();
        30_000 <= k && k < 40_000
    }
}

impl From<u16> for Kind {
    fn from(kind: u16) -> Self {
        match kind {
            0 => Self::Metadata,
            3 => Self::ContactList,
            8 => Self::BadgeAward,
            30008 => Self::BadgeDefinition,
            30303 => Self::Bond,
            30304 => Self::Circuit,
            30500 => Self::PermitDefinition,
            30501 => Self::PermitRequest,
            30502 => Self::PermitAttestation,
            30503 => Self::PermitCredential,
            k => Self::Custom(k),
        }
    }
}

impl From<Kind> for u16 {
    fn from(kind: Kind) -> Self {
        kind.as_u16()
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

impl Serialize for Kind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16(self.as_u16())
    }
}

impl<'de> Deserialize<'de> for Kind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let kind: u16 = u16::deserialize(deserializer)?;
        Ok(Self::from(kind))
    }
}
