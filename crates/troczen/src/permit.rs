// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Permit identifiers
//!
//! A permit id matches `PERMIT_<NAME>_(X|V)<level>`. `V` marks an official
//! permit, `X` a community (WoTx2) one. Progression is always expressed in
//! the `X` form: the next level of `PERMIT_FOO_V1` is `PERMIT_FOO_X2`.

use core::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PERMIT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^PERMIT_[A-Z0-9_]+_(X|V)\d+$").expect("Invalid regex"));
static PERMIT_LEVEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_(X|V)(\d+)$").expect("Invalid regex"));
static SKILL_CERT_LEVEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_X(\d+)$").expect("Invalid regex"));

/// Permit family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermitType {
    /// Official permit (`_V<n>` suffix); threshold read from the definition
    Official,
    /// Community WoTx2 permit (`_X<n>` suffix); one attestation suffices
    Wotx2,
}

impl PermitType {
    /// String form used in permit definition contents
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Wotx2 => "wotx2",
        }
    }
}

impl fmt::Display for PermitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Check if a permit id matches the `PERMIT_<NAME>_(X|V)<level>` pattern
#[inline]
pub fn is_valid_id(permit_id: &str) -> bool {
    PERMIT_ID.is_match(permit_id)
}

/// Extract the level (`X2` or `V2` -> 2), defaulting to 1
pub fn level(permit_id: &str) -> u32 {
    PERMIT_LEVEL
        .captures(permit_id)
        .and_then(|caps| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(1)
}

/// Extract the base name, without the level suffix
pub fn base(permit_id: &str) -> String {
    PERMIT_LEVEL.replace(permit_id, "").into_owned()
}

/// Id of the next level.
///
/// Progression always uses the `X` form, even when the input was official.
pub fn next_level_id(permit_id: &str) -> String {
    format!("{}_X{}", base(permit_id), level(permit_id) + 1)
}

/// Id of the parent permit, `None` at level 1
pub fn parent_id(permit_id: &str) -> Option<String> {
    let level: u32 = level(permit_id);

    if level <= 1 {
        return None;
    }

    Some(format!("{}_X{}", base(permit_id), level - 1))
}

/// Family of a permit id
pub fn permit_type(permit_id: &str) -> PermitType {
    match PERMIT_LEVEL.captures(permit_id).and_then(|caps| caps.get(1)) {
        Some(m) if m.as_str() == "V" => PermitType::Official,
        _ => PermitType::Wotx2,
    }
}

/// Number of unique attestations required before a credential is issued.
///
/// Official permits read `required_attestations` from their definition
/// content (`defined`), defaulting to 2. Community permits always need one.
pub fn required_attestations(permit_id: &str, defined: Option<usize>) -> usize {
    match permit_type(permit_id) {
        PermitType::Official => defined.unwrap_or(2),
        PermitType::Wotx2 => 1,
    }
}

/// Level carried by a circuit's `skill_cert` (`_X<n>` suffix), defaulting to 1
pub fn skill_cert_level(skill_cert: &str) -> u32 {
    SKILL_CERT_LEVEL
        .captures(skill_cert)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(1)
}

/// Human-readable name: `PERMIT_MARAICHAGE_BIO_X2` -> `Maraichage Bio`
pub fn display_name(permit_id: &str) -> String {
    let name: String = base(permit_id)
        .trim_start_matches("PERMIT_")
        .to_string();

    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => format!("{}{}", first, chars.as_str().to_lowercase()),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id("PERMIT_MARAICHAGE_X1"));
        assert!(is_valid_id("PERMIT_SAFETY_V1"));
        assert!(is_valid_id("PERMIT_MARAICHAGE_BIO_X12"));
        assert!(!is_valid_id("MARAICHAGE_X1"));
        assert!(!is_valid_id("PERMIT_MARAICHAGE"));
        assert!(!is_valid_id("PERMIT_maraichage_X1"));
        assert!(!is_valid_id("PERMIT_MARAICHAGE_Y1"));
    }

    #[test]
    fn test_level_and_base() {
        assert_eq!(level("PERMIT_MARAICHAGE_X3"), 3);
        assert_eq!(level("PERMIT_SAFETY_V2"), 2);
        assert_eq!(level("PERMIT_WITHOUT_SUFFIX"), 1);
        assert_eq!(base("PERMIT_MARAICHAGE_X3"), "PERMIT_MARAICHAGE");
        assert_eq!(base("PERMIT_SAFETY_V2"), "PERMIT_SAFETY");
    }

    #[test]
    fn test_progression() {
        assert_eq!(next_level_id("PERMIT_MARAICHAGE_X1"), "PERMIT_MARAICHAGE_X2");
        // official progression continues in the X form
        assert_eq!(next_level_id("PERMIT_SAFETY_V1"), "PERMIT_SAFETY_X2");
        assert_eq!(parent_id("PERMIT_MARAICHAGE_X2"), Some("PERMIT_MARAICHAGE_X1".into()));
        assert_eq!(parent_id("PERMIT_MARAICHAGE_X1"), None);
        assert_eq!(parent_id("PERMIT_SAFETY_V1"), None);
    }

    #[test]
    fn test_parent_next_inverse() {
        // for every valid id with level >= 2, next(parent(p)) == p
        for id in ["PERMIT_MARAICHAGE_X2", "PERMIT_CUISINE_X5", "PERMIT_A_B_C_X9"] {
            assert!(is_valid_id(id));
            let parent = parent_id(id).unwrap();
            assert_eq!(next_level_id(&parent), id);
        }
    }

    #[test]
    fn test_types_and_thresholds() {
        assert_eq!(permit_type("PERMIT_SAFETY_V1"), PermitType::Official);
        assert_eq!(permit_type("PERMIT_MARAICHAGE_X1"), PermitType::Wotx2);
        assert_eq!(required_attestations("PERMIT_MARAICHAGE_X1", None), 1);
        assert_eq!(required_attestations("PERMIT_MARAICHAGE_X1", Some(7)), 1);
        assert_eq!(required_attestations("PERMIT_SAFETY_V1", None), 2);
        assert_eq!(required_attestations("PERMIT_SAFETY_V1", Some(3)), 3);
    }

    #[test]
    fn test_skill_cert_level() {
        assert_eq!(skill_cert_level("PERMIT_MARAICHAGE_X3"), 3);
        assert_eq!(skill_cert_level("maraichage"), 1);
        assert_eq!(skill_cert_level("PERMIT_SAFETY_V2"), 1);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("PERMIT_MARAICHAGE_X1"), "Maraichage");
        assert_eq!(display_name("PERMIT_MARAICHAGE_BIO_X2"), "Maraichage Bio");
    }
}
