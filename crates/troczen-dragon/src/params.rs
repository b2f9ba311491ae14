// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Dynamic protocol parameters
//!
//! C² measures network velocity health, α whether certified skill
//! predicts return speed. Both are recomputed from the last 30 days of
//! relay events on every call.

use serde::Serialize;
use troczen::event::Kind;
use troczen::filter::Filter;
use troczen::key::PublicKey;
use troczen::market::market_tag;
use troczen::permit;
use troczen::records::{Bond, Circuit};
use troczen::types::Timestamp;
use troczen_relay::RelayConnection;

use crate::error::EngineError;
use crate::parse_events;
use crate::stats::{clip, mean, median, pearson};

/// C² lower bound
pub const C2_MIN: f64 = 0.02;
/// C² upper bound
pub const C2_MAX: f64 = 0.25;
/// C² when there is not enough data
pub const C2_DEFAULT: f64 = 0.07;

/// α lower bound
pub const ALPHA_MIN: f64 = 0.0;
/// α upper bound
pub const ALPHA_MAX: f64 = 1.0;
/// α when there is not enough data
pub const ALPHA_DEFAULT: f64 = 0.3;

/// TTL suggestion lower bound (days)
pub const TTL_MIN: u32 = 7;
/// TTL suggestion upper bound (days)
pub const TTL_MAX: u32 = 365;
/// TTL suggestion without circulation history (days)
pub const TTL_DEFAULT: u32 = 28;

/// Analysis window in days
pub const ANALYSIS_WINDOW_DAYS: u64 = 30;

/// Minimum certified circuits before α is computed
const MIN_SKILL_SAMPLES: usize = 5;

/// C² and its intermediate metrics
#[derive(Debug, Clone, Serialize)]
pub struct C2Metrics {
    /// Network velocity coefficient, in `[0.02, 0.25]`
    pub c2: f64,
    /// Median age of the window's circuits in days
    pub median_return_age: f64,
    /// Median TTL of the bonds emitted in the window in days
    pub median_ttl: f64,
    /// Closed loops over expired-unreturned bonds, floor 0.1, cap 2
    pub health_ratio: f64,
    /// Window-over-window loop growth, in `[0, 0.5]`
    pub n1_growth: f64,
    /// Circuits closed in the window
    pub loops_count: usize,
    /// Emitted bonds that expired without a circuit
    pub expired_count: usize,
    /// Computation timestamp
    pub computed_at: Timestamp,
}

/// α and its intermediate metrics
#[derive(Debug, Clone, Serialize)]
pub struct AlphaMetrics {
    /// Skill-velocity correlation multiplier, in `[0, 1]`
    pub alpha: f64,
    /// Certified circuits in the window
    pub skill_loops_count: usize,
    /// Raw Pearson correlation between level and return speed
    pub correlation: f64,
    /// Mean certified level
    pub avg_skill_level: f64,
    /// Computation timestamp
    pub computed_at: Timestamp,
}

/// All dynamic parameters of one user in one market
#[derive(Debug, Clone, Serialize)]
pub struct Params {
    /// Network velocity coefficient
    pub c2: f64,
    /// Skill multiplier
    pub alpha: f64,
    /// Suggested bond TTL in days
    pub ttl_optimal: u32,
    /// C² intermediates
    pub c2_details: C2Metrics,
    /// α intermediates
    pub alpha_details: AlphaMetrics,
    /// Computation timestamp
    pub computed_at: Timestamp,
}

impl Params {
    /// Documented defaults, substituted when the relay is unreachable
    pub fn defaults() -> Self {
        let now: Timestamp = Timestamp::now();
        Self {
            c2: C2_DEFAULT,
            alpha: ALPHA_DEFAULT,
            ttl_optimal: TTL_DEFAULT,
            c2_details: C2Metrics {
                c2: C2_DEFAULT,
                median_return_age: 0.0,
                median_ttl: TTL_DEFAULT as f64,
                health_ratio: 1.0,
                n1_growth: 0.0,
                loops_count: 0,
                expired_count: 0,
                computed_at: now,
            },
            alpha_details: AlphaMetrics {
                alpha: ALPHA_DEFAULT,
                skill_loops_count: 0,
                correlation: 0.0,
                avg_skill_level: 0.0,
                computed_at: now,
            },
            computed_at: now,
        }
    }
}

/// Circuits closed by `user` in the current window
async fn window_loops(
    conn: &mut RelayConnection,
    user: &PublicKey,
    market: &str,
) -> Result<Vec<Circuit>, EngineError> {
    let since: Timestamp = Timestamp::now().days_ago(ANALYSIS_WINDOW_DAYS);

    let events = conn
        .query(vec![Filter::new()
            .kind(Kind::Circuit)
            .custom_tag("issued_by", user.to_hex())
            .custom_tag("market", market_tag(market))
            .since(since)])
        .await?;

    Ok(parse_events(&events, Circuit::from_event))
}

/// Circuits closed by `user` in the preceding window
async fn previous_window_loops(
    conn: &mut RelayConnection,
    user: &PublicKey,
    market: &str,
) -> Result<Vec<Circuit>, EngineError> {
    let now: Timestamp = Timestamp::now();

    let events = conn
        .query(vec![Filter::new()
            .kind(Kind::Circuit)
            .custom_tag("issued_by", user.to_hex())
            .custom_tag("market", market_tag(market))
            .since(now.days_ago(2 * ANALYSIS_WINDOW_DAYS))
            .until(now.days_ago(ANALYSIS_WINDOW_DAYS))])
        .await?;

    Ok(parse_events(&events, Circuit::from_event))
}

/// Bonds emitted by `user` in the current window
async fn emitted_bonds(
    conn: &mut RelayConnection,
    user: &PublicKey,
    market: &str,
) -> Result<Vec<Bond>, EngineError> {
    let since: Timestamp = Timestamp::now().days_ago(ANALYSIS_WINDOW_DAYS);

    let events = conn
        .query(vec![Filter::new()
            .kind(Kind::Bond)
            .author(*user)
            .custom_tag("market", market_tag(market))
            .since(since)])
        .await?;

    Ok(parse_events(&events, Bond::from_event))
}

/// Count emitted bonds that expired without an associated circuit.
///
/// One circuit query covers every bond, instead of one lookup per bond.
async fn expired_without_circuit(
    conn: &mut RelayConnection,
    user: &PublicKey,
    market: &str,
    emitted: &[Bond],
) -> Result<usize, EngineError> {
    let now: Timestamp = Timestamp::now();

    let expired: Vec<&Bond> = emitted
        .iter()
        .filter(|b| b.expires_at.as_u64() > 0 && !b.is_active(now))
        .collect();

    if expired.is_empty() {
        return Ok(0);
    }

    let events = conn
        .query(vec![Filter::new()
            .kind(Kind::Circuit)
            .custom_tag("issued_by", user.to_hex())
            .custom_tag("market", market_tag(market))])
        .await?;
    let circuits: Vec<Circuit> = parse_events(&events, Circuit::from_event);

    let looped: std::collections::BTreeSet<&str> =
        circuits.iter().map(|c| c.bond_id.as_str()).collect();

    Ok(expired
        .iter()
        .filter(|b| !looped.contains(b.bond_id.as_str()))
        .count())
}

/// Compute C² for one user in one market
pub async fn c_squared(
    conn: &mut RelayConnection,
    user: &PublicKey,
    market: &str,
) -> Result<C2Metrics, EngineError> {
    tracing::debug!(user = %user, market, "Computing C²");

    let loops: Vec<Circuit> = window_loops(conn, user, market).await?;
    let ages: Vec<f64> = loops.iter().map(|c| c.age_days).collect();
    let median_return: f64 = median(&ages);

    let emitted: Vec<Bond> = emitted_bonds(conn, user, market).await?;
    let ttls: Vec<f64> = emitted
        .iter()
        .filter(|b| b.expires_at > b.issued_at)
        .map(|b| b.ttl_days() as f64)
        .collect();
    let median_ttl: f64 = if ttls.is_empty() {
        TTL_DEFAULT as f64
    } else {
        median(&ttls)
    };

    let expired_count: usize = expired_without_circuit(conn, user, market, &emitted).await?;
    let health_ratio: f64 = (loops.len() as f64 / (expired_count as f64).max(0.1)).min(2.0);

    let previous: Vec<Circuit> = previous_window_loops(conn, user, market).await?;
    let n1_growth: f64 = ((loops.len() as f64 - previous.len() as f64)
        / (previous.len() as f64).max(1.0))
    .max(0.0)
    .min(0.5);

    let c2: f64 = if median_return > 0.0 && median_ttl > 0.0 {
        clip(
            (median_return / median_ttl) * health_ratio * (1.0 + n1_growth),
            C2_MIN,
            C2_MAX,
        )
    } else {
        C2_DEFAULT
    };

    tracing::debug!(c2, median_return, health_ratio, "C² computed");

    Ok(C2Metrics {
        c2,
        median_return_age: median_return,
        median_ttl,
        health_ratio,
        n1_growth,
        loops_count: loops.len(),
        expired_count,
        computed_at: Timestamp::now(),
    })
}

/// Compute α for one user in one market
pub async fn alpha(
    conn: &mut RelayConnection,
    user: &PublicKey,
    market: &str,
) -> Result<AlphaMetrics, EngineError> {
    tracing::debug!(user = %user, market, "Computing α");

    let loops: Vec<Circuit> = window_loops(conn, user, market).await?;
    let certified: Vec<&Circuit> = loops
        .iter()
        .filter(|c| c.skill_cert.as_deref().is_some_and(|s| !s.is_empty()))
        .collect();

    let levels: Vec<f64> = certified
        .iter()
        .filter_map(|c| c.skill_cert.as_deref())
        .map(|cert| permit::skill_cert_level(cert) as f64)
        .collect();

    if certified.len() < MIN_SKILL_SAMPLES {
        tracing::debug!(
            samples = certified.len(),
            "Not enough certified circuits, default α"
        );
        return Ok(AlphaMetrics {
            alpha: ALPHA_DEFAULT,
            skill_loops_count: certified.len(),
            correlation: 0.0,
            avg_skill_level: mean(&levels),
            computed_at: Timestamp::now(),
        });
    }

    // faster return scores higher
    let speeds: Vec<f64> = certified.iter().map(|c| -c.age_days).collect();

    let correlation: f64 = pearson(&levels, &speeds);
    let alpha: f64 = clip(0.8 * correlation, ALPHA_MIN, ALPHA_MAX);

    tracing::debug!(alpha, correlation, "α computed");

    Ok(AlphaMetrics {
        alpha,
        skill_loops_count: certified.len(),
        correlation,
        avg_skill_level: mean(&levels),
        computed_at: Timestamp::now(),
    })
}

/// TTL suggestion from a median return age
pub fn ttl_from_median_return(median_return: f64) -> u32 {
    if median_return > 0.0 {
        clip(
            (1.5 * median_return).round(),
            TTL_MIN as f64,
            TTL_MAX as f64,
        ) as u32
    } else {
        TTL_DEFAULT
    }
}

/// Suggested optimal TTL for the user's next emissions
pub async fn ttl_optimal(
    conn: &mut RelayConnection,
    user: &PublicKey,
    market: &str,
) -> Result<u32, EngineError> {
    let loops: Vec<Circuit> = window_loops(conn, user, market).await?;
    let ages: Vec<f64> = loops.iter().map(|c| c.age_days).collect();
    Ok(ttl_from_median_return(median(&ages)))
}

/// Compute every dynamic parameter in one pass
pub async fn all_params(
    conn: &mut RelayConnection,
    user: &PublicKey,
    market: &str,
) -> Result<Params, EngineError> {
    let c2_details: C2Metrics = c_squared(conn, user, market).await?;
    let alpha_details: AlphaMetrics = alpha(conn, user, market).await?;
    let ttl: u32 = ttl_from_median_return(c2_details.median_return_age);

    Ok(Params {
        c2: c2_details.c2,
        alpha: alpha_details.alpha,
        ttl_optimal: ttl,
        c2_details,
        alpha_details,
        computed_at: Timestamp::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_from_median_return() {
        assert_eq!(ttl_from_median_return(0.0), TTL_DEFAULT);
        assert_eq!(ttl_from_median_return(20.0), 30);
        assert_eq!(ttl_from_median_return(2.0), TTL_MIN);
        assert_eq!(ttl_from_median_return(500.0), TTL_MAX);
    }
}
