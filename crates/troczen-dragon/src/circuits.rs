// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Circuit indexing
//!
//! Bonds (kind 30303) and closed circuits (kind 30304) of a market,
//! queried on demand.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use troczen::event::Kind;
use troczen::filter::Filter;
use troczen::key::PublicKey;
use troczen::market::market_tag;
use troczen::records::{Bond, Circuit};
use troczen::types::Timestamp;
use troczen_relay::RelayConnection;

use crate::error::EngineError;
use crate::parse_events;
use crate::stats;

/// Analysis window in days
pub const WINDOW_DAYS: u64 = 30;

/// Upper bound on circuits fetched for market-wide computations
const MARKET_CIRCUITS_LIMIT: usize = 1_000;

/// Active (non-expired) bonds of a market, optionally restricted to one
/// holder.
pub async fn active_bonds(
    conn: &mut RelayConnection,
    market: &str,
    owner: Option<&PublicKey>,
) -> Result<Vec<Bond>, EngineError> {
    let now: Timestamp = Timestamp::now();
    let bonds: Vec<Bond> = market_bonds(conn, market, owner).await?;
    Ok(bonds.into_iter().filter(|b| b.is_active(now)).collect())
}

/// Every bond of a market regardless of expiry
async fn market_bonds(
    conn: &mut RelayConnection,
    market: &str,
    owner: Option<&PublicKey>,
) -> Result<Vec<Bond>, EngineError> {
    let mut filter: Filter = Filter::new()
        .kind(Kind::Bond)
        .custom_tag("market", market_tag(market));

    if let Some(owner) = owner {
        filter = filter.author(*owner);
    }

    let events = conn.query(vec![filter]).await?;
    Ok(parse_events(&events, Bond::from_event))
}

/// Look a bond up by id.
///
/// Bonds may be stored under the raw id or the `zen-` prefixed form; both
/// are tried in one filter.
pub async fn bond_by_id(
    conn: &mut RelayConnection,
    bond_id: &str,
) -> Result<Option<Bond>, EngineError> {
    let filter: Filter = Filter::new()
        .kind(Kind::Bond)
        .identifier(bond_id)
        .identifier(format!("zen-{bond_id}"))
        .limit(1);

    let event = conn.query_first(filter).await?;
    Ok(event.as_ref().and_then(Bond::from_event))
}

/// The circuit that closed the given bond, if any
pub async fn circuit_by_bond_id(
    conn: &mut RelayConnection,
    bond_id: &str,
) -> Result<Option<Circuit>, EngineError> {
    let filter: Filter = Filter::new()
        .kind(Kind::Circuit)
        .custom_tag("bon_id", bond_id)
        .limit(1);

    let event = conn.query_first(filter).await?;
    Ok(event.as_ref().and_then(Circuit::from_event))
}

/// Closed circuits of a market
pub async fn circuits(
    conn: &mut RelayConnection,
    market: &str,
    issuer: Option<&PublicKey>,
    since: Option<Timestamp>,
    limit: usize,
) -> Result<Vec<Circuit>, EngineError> {
    let mut filter: Filter = Filter::new()
        .kind(Kind::Circuit)
        .custom_tag("market", market_tag(market))
        .limit(limit);

    if let Some(issuer) = issuer {
        filter = filter.custom_tag("issued_by", issuer.to_hex());
    }

    if let Some(since) = since {
        filter = filter.since(since);
    }

    let events = conn.query(vec![filter]).await?;
    Ok(parse_events(&events, Circuit::from_event))
}

/// Aggregate statistics of a market
#[derive(Debug, Clone, Serialize)]
pub struct MarketStats {
    /// Normalized market tag
    pub market: String,
    /// Number of active bonds
    pub active_bonds_count: usize,
    /// Summed value of active bonds
    pub active_bonds_value: f64,
    /// Circuits closed in the last 30 days
    pub loops_30d: usize,
    /// Mean age of those circuits in days
    pub avg_circuit_age_days: f64,
    /// Circuits of the window bucketed by `skill_cert` (`none` when absent)
    pub skill_distribution: BTreeMap<String, usize>,
    /// Closed circuits over expired-unreturned bonds, floor 0.1, cap 2
    pub health_ratio: f64,
    /// Computation timestamp
    pub computed_at: Timestamp,
}

/// Compute [`MarketStats`] for a market
pub async fn market_stats(
    conn: &mut RelayConnection,
    market: &str,
) -> Result<MarketStats, EngineError> {
    let now: Timestamp = Timestamp::now();
    let cutoff: Timestamp = now.days_ago(WINDOW_DAYS);

    let bonds: Vec<Bond> = market_bonds(conn, market, None).await?;

    // one circuit query covers both the 30-day window and the looped-bond
    // set used for expiry accounting
    let all_circuits: Vec<Circuit> =
        circuits(conn, market, None, None, MARKET_CIRCUITS_LIMIT).await?;
    let window_circuits: Vec<&Circuit> = all_circuits
        .iter()
        .filter(|c| c.closed_at >= cutoff)
        .collect();

    let active: Vec<&Bond> = bonds.iter().filter(|b| b.is_active(now)).collect();
    let active_value: f64 = active.iter().map(|b| b.value).sum();

    let ages: Vec<f64> = window_circuits
        .iter()
        .map(|c| c.age_days)
        .filter(|age| *age > 0.0)
        .collect();

    let mut skill_distribution: BTreeMap<String, usize> = BTreeMap::new();
    for circuit in window_circuits.iter() {
        let bucket: String = circuit
            .skill_cert
            .clone()
            .unwrap_or_else(|| String::from("none"));
        *skill_distribution.entry(bucket).or_insert(0) += 1;
    }

    let looped: BTreeSet<&str> = all_circuits.iter().map(|c| c.bond_id.as_str()).collect();
    let expired_unreturned: usize = bonds
        .iter()
        .filter(|b| {
            b.expires_at.as_u64() > 0
                && !b.is_active(now)
                && !looped.contains(b.bond_id.as_str())
        })
        .count();

    let health_ratio: f64 =
        (window_circuits.len() as f64 / (expired_unreturned as f64).max(0.1)).min(2.0);

    Ok(MarketStats {
        market: market_tag(market),
        active_bonds_count: active.len(),
        active_bonds_value: active_value,
        loops_30d: window_circuits.len(),
        avg_circuit_age_days: stats::mean(&ages),
        skill_distribution,
        health_ratio,
        computed_at: now,
    })
}

/// Emergent inter-market exchange rates.
///
/// For every unordered market pair with flow in the last 30 days,
/// `rate(A->B) = flow(A->B) / (flow(A->B) + flow(B->A))`; both directions
/// are populated and sum to one. Pairs with zero total flow are omitted.
pub async fn intermarket_rates(
    conn: &mut RelayConnection,
) -> Result<BTreeMap<String, BTreeMap<String, f64>>, EngineError> {
    let cutoff: Timestamp = Timestamp::now().days_ago(WINDOW_DAYS);

    let events = conn
        .query(vec![Filter::new()
            .kind(Kind::Circuit)
            .since(cutoff)
            .limit(MARKET_CIRCUITS_LIMIT)])
        .await?;
    let circuits: Vec<Circuit> = parse_events(&events, Circuit::from_event);

    // flow per ordered pair (smaller, larger): (a_to_b, b_to_a)
    let mut flows: BTreeMap<(String, String), (f64, f64)> = BTreeMap::new();

    for circuit in circuits.iter().filter(|c| c.is_intermarket()) {
        let from: &str = circuit.market.as_str();
        let dest: &str = match circuit.dest_market.as_deref() {
            Some(dest) => dest,
            None => continue,
        };

        if from.is_empty() {
            continue;
        }

        let key: (String, String) = if from < dest {
            (from.to_string(), dest.to_string())
        } else {
            (dest.to_string(), from.to_string())
        };

        let flow = flows.entry(key).or_insert((0.0, 0.0));
        if from < dest {
            flow.0 += circuit.value;
        } else {
            flow.1 += circuit.value;
        }
    }

    let mut rates: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();

    for ((a, b), (a_to_b, b_to_a)) in flows.into_iter() {
        let total: f64 = a_to_b + b_to_a;
        if total <= 0.0 {
            continue;
        }

        let rate: f64 = a_to_b / total;
        rates.entry(a.clone()).or_default().insert(b.clone(), rate);
        rates.entry(b).or_default().insert(a, 1.0 - rate);
    }

    Ok(rates)
}

/// Circulation of one user within a market
#[derive(Debug, Clone, Serialize)]
pub struct CirculationStats {
    /// User
    pub user: PublicKey,
    /// Normalized market tag
    pub market: String,
    /// Circuits closed in the window where the user is the issuer
    pub loops_30d: usize,
    /// Summed looped value
    pub total_looped_value: f64,
    /// Median age of the user's circuits in days
    pub median_circuit_age_days: f64,
    /// Mean hop count of those circuits
    pub avg_hop_count: f64,
    /// Active bonds held by the user
    pub active_bonds_count: usize,
    /// Active bonds with at least one hop
    pub in_transit_count: usize,
    /// Summed value of in-transit bonds
    pub in_transit_value: f64,
    /// Mean residual TTL of active bonds in days
    pub avg_residual_ttl_days: f64,
    /// Computation timestamp
    pub computed_at: Timestamp,
}

/// Compute [`CirculationStats`] for one user
pub async fn user_circulation_stats(
    conn: &mut RelayConnection,
    user: &PublicKey,
    market: &str,
) -> Result<CirculationStats, EngineError> {
    let now: Timestamp = Timestamp::now();
    let cutoff: Timestamp = now.days_ago(WINDOW_DAYS);

    let issued: Vec<Circuit> = circuits(
        conn,
        market,
        Some(user),
        Some(cutoff),
        MARKET_CIRCUITS_LIMIT,
    )
    .await?;
    let bonds: Vec<Bond> = active_bonds(conn, market, Some(user)).await?;

    let ages: Vec<f64> = issued
        .iter()
        .map(|c| c.age_days)
        .filter(|age| *age > 0.0)
        .collect();
    let hops: Vec<f64> = issued.iter().map(|c| c.hop_count as f64).collect();

    let in_transit: Vec<&Bond> = bonds.iter().filter(|b| b.hop_count > 0).collect();
    let residual_ttls: Vec<f64> = bonds.iter().map(|b| b.residual_ttl_days(now)).collect();

    Ok(CirculationStats {
        user: *user,
        market: market_tag(market),
        loops_30d: issued.len(),
        total_looped_value: issued.iter().map(|c| c.value).sum(),
        median_circuit_age_days: stats::median(&ages),
        avg_hop_count: stats::mean(&hops),
        active_bonds_count: bonds.len(),
        in_transit_count: in_transit.len(),
        in_transit_value: in_transit.iter().map(|b| b.value).sum(),
        avg_residual_ttl_days: stats::mean(&residual_ttls),
        computed_at: now,
    })
}
