// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Market directory
//!
//! Joins kind-0 profiles to a market's bonds via the `issuer` tag, for
//! the market browsing pages.

use std::collections::HashMap;

use serde::Serialize;
use troczen::event::Kind;
use troczen::filter::Filter;
use troczen::key::PublicKey;
use troczen::market::market_tag;
use troczen::records::{Bond, Profile};
use troczen_relay::RelayConnection;

use crate::error::EngineError;
use crate::parse_events;

/// Fetch every profile, deduplicated to the newest per author
pub async fn merchant_profiles(
    conn: &mut RelayConnection,
) -> Result<Vec<Profile>, EngineError> {
    let events = conn
        .query_paginated(&[Kind::Metadata], Filter::new())
        .await?;

    let mut newest: HashMap<PublicKey, Profile> = HashMap::new();
    for profile in parse_events(&events, Profile::from_event).into_iter() {
        let author: PublicKey = match profile.pubkey {
            Some(author) => author,
            None => continue,
        };
        match newest.get(&author) {
            Some(existing) if existing.created_at >= profile.created_at => {}
            _ => {
                newest.insert(author, profile);
            }
        }
    }

    Ok(newest.into_values().collect())
}

/// One merchant and their bonds in a market
#[derive(Debug, Clone, Serialize)]
pub struct MerchantListing {
    /// Merchant key
    pub pubkey: PublicKey,
    /// Profile, when one was published
    pub profile: Profile,
    /// The merchant's bonds in this market
    pub bonds: Vec<Bond>,
    /// Bond count
    pub bonds_count: usize,
}

/// All merchants of a market
#[derive(Debug, Clone, Serialize)]
pub struct MarketDirectory {
    /// Normalized market tag
    pub market: String,
    /// Merchant listings
    pub merchants: Vec<MerchantListing>,
    /// Total bonds across merchants
    pub total_bonds: usize,
    /// Number of merchants
    pub total_merchants: usize,
}

/// Build the merchant directory of a market.
///
/// Bonds are grouped by their `issuer` tag (author fallback); merchants
/// without a published profile get an empty one.
pub async fn market_directory(
    conn: &mut RelayConnection,
    market: &str,
) -> Result<MarketDirectory, EngineError> {
    let profiles: Vec<Profile> = merchant_profiles(conn).await?;
    let profiles_by_key: HashMap<PublicKey, Profile> = profiles
        .into_iter()
        .filter_map(|p| p.pubkey.map(|key| (key, p)))
        .collect();

    let events = conn
        .query(vec![Filter::new()
            .kind(Kind::Bond)
            .custom_tag("market", market_tag(market))])
        .await?;
    let bonds: Vec<Bond> = parse_events(&events, Bond::from_event);
    let total_bonds: usize = bonds.len();

    let mut by_issuer: HashMap<PublicKey, Vec<Bond>> = HashMap::new();
    for bond in bonds.into_iter() {
        by_issuer.entry(bond.issuer).or_default().push(bond);
    }

    let mut merchants: Vec<MerchantListing> = by_issuer
        .into_iter()
        .map(|(pubkey, bonds)| {
            let profile: Profile = match profiles_by_key.get(&pubkey) {
                Some(profile) => profile.clone(),
                None => {
                    tracing::debug!(issuer = %pubkey, "Bond issuer without a profile");
                    Profile::default()
                }
            };

            MerchantListing {
                pubkey,
                profile,
                bonds_count: bonds.len(),
                bonds,
            }
        })
        .collect();

    // deterministic output order
    merchants.sort_by(|a, b| b.bonds_count.cmp(&a.bonds_count).then(a.pubkey.cmp(&b.pubkey)));

    Ok(MarketDirectory {
        market: market_tag(market),
        total_merchants: merchants.len(),
        total_bonds,
        merchants,
    })
}
