// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! User dashboard
//!
//! Aggregates dividend, parameters, circulation, credentials and derived
//! signals per market. When the relay misbehaves mid-build, each block
//! degrades to its documented defaults instead of failing the snapshot;
//! the root cause is logged.

use std::collections::BTreeSet;

use serde::Serialize;
use troczen::event::Kind;
use troczen::filter::Filter;
use troczen::key::PublicKey;
use troczen::market::market_tag;
use troczen::records::{Bond, Credential};
use troczen::types::Timestamp;
use troczen_relay::RelayConnection;

use crate::circuits::{self, CirculationStats};
use crate::du::{self, DuResult, MIN_N1};
use crate::error::EngineError;
use crate::params::{self, Params, ALPHA_DEFAULT, C2_DEFAULT, TTL_DEFAULT};
use crate::parse_events;

/// Market used when the user has no bonds anywhere
pub const DEFAULT_MARKET: &str = "market_hackathon";

/// Credentials listed inline in the dashboard
const CREDENTIAL_PREVIEW: usize = 5;

/// Signal trigger thresholds.
///
/// Configurable, but the defaults are part of the protocol surface and
/// changing them requires a migration note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalThresholds {
    /// Health ratio below which expiry is flagged
    pub health_low: f64,
    /// Health ratio above which the network is flagged healthy
    pub health_high: f64,
    /// C² above which the network is accelerating
    pub c2_high: f64,
    /// C² below which the network is slow
    pub c2_low: f64,
    /// Suggested TTL below which the network is fast (days)
    pub ttl_fast: u32,
    /// Suggested TTL above which the network is patient (days)
    pub ttl_slow: u32,
    /// α above which skills are highly valued
    pub alpha_high: f64,
    /// α below which skills barely differentiate
    pub alpha_low: f64,
    /// Daily dividend above which the network is very active
    pub du_high: f64,
    /// Monthly loops above which circulation is excellent
    pub loops_high: usize,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            health_low: 1.0,
            health_high: 1.5,
            c2_high: 0.12,
            c2_low: 0.05,
            ttl_fast: 14,
            ttl_slow: 60,
            alpha_high: 0.5,
            alpha_low: 0.1,
            du_high: 20.0,
            loops_high: 10,
        }
    }
}

/// Network weaver category derived from (N1, N2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NetworkCategory {
    /// Fewer than 2 reciprocal peers
    Starter,
    /// At least 2 reciprocal peers
    Emergent,
    /// At least 5 reciprocal peers
    Actif,
    /// At least 10 reciprocal peers and 50 second-order peers
    Tisseur,
}

impl NetworkCategory {
    fn from_counts(n1: usize, n2: usize) -> Self {
        if n1 >= 10 && n2 >= 50 {
            Self::Tisseur
        } else if n1 >= 5 {
            Self::Actif
        } else if n1 >= 2 {
            Self::Emergent
        } else {
            Self::Starter
        }
    }
}

/// Position in the social graph
#[derive(Debug, Clone, Serialize)]
pub struct NetworkPosition {
    /// Reciprocal peers
    pub n1: usize,
    /// Second-order peers
    pub n2: usize,
    /// N2 per N1
    pub n2_per_n1: f64,
    /// Weaver category
    pub category: NetworkCategory,
}

/// Dividend block of one market
#[derive(Debug, Clone, Serialize)]
pub struct DuBlock {
    /// Daily dividend
    pub daily: f64,
    /// Monthly projection
    pub monthly: f64,
    /// Base before the skill multiplier
    pub base: f64,
    /// Skill bonus
    pub skill_bonus: f64,
    /// Multiplier applied
    pub multiplier: f64,
    /// Whether the dividend is active
    pub active: bool,
}

impl DuBlock {
    fn inactive() -> Self {
        Self {
            daily: 0.0,
            monthly: 0.0,
            base: 0.0,
            skill_bonus: 0.0,
            multiplier: 1.0,
            active: false,
        }
    }
}

impl From<&DuResult> for DuBlock {
    fn from(du: &DuResult) -> Self {
        Self {
            daily: du.du,
            monthly: du.du_monthly,
            base: du.du_base,
            skill_bonus: du.du_skill,
            multiplier: du.multiplier,
            active: du.active,
        }
    }
}

/// Parameter block of one market
#[derive(Debug, Clone, Serialize)]
pub struct ParamsBlock {
    /// C²
    pub c2: f64,
    /// α
    pub alpha: f64,
    /// Suggested TTL in days
    pub ttl_optimal_days: u32,
    /// Health ratio behind C²
    pub health_ratio: f64,
}

impl ParamsBlock {
    fn defaults() -> Self {
        Self {
            c2: C2_DEFAULT,
            alpha: ALPHA_DEFAULT,
            ttl_optimal_days: TTL_DEFAULT,
            health_ratio: 1.0,
        }
    }
}

impl From<&Params> for ParamsBlock {
    fn from(params: &Params) -> Self {
        Self {
            c2: params.c2,
            alpha: params.alpha,
            ttl_optimal_days: params.ttl_optimal,
            health_ratio: params.c2_details.health_ratio,
        }
    }
}

/// Circulation block of one market
#[derive(Debug, Clone, Serialize)]
pub struct CirculationBlock {
    /// Loops closed this month
    pub loops_this_month: usize,
    /// Median return age in days
    pub median_return_age_days: f64,
    /// Bonds in transit
    pub in_transit_count: usize,
    /// Value in transit
    pub in_transit_value: f64,
    /// Mean residual TTL of active bonds
    pub avg_residual_ttl_days: f64,
}

impl CirculationBlock {
    fn empty() -> Self {
        Self {
            loops_this_month: 0,
            median_return_age_days: 0.0,
            in_transit_count: 0,
            in_transit_value: 0.0,
            avg_residual_ttl_days: 0.0,
        }
    }
}

impl From<&CirculationStats> for CirculationBlock {
    fn from(stats: &CirculationStats) -> Self {
        Self {
            loops_this_month: stats.loops_30d,
            median_return_age_days: stats.median_circuit_age_days,
            in_transit_count: stats.in_transit_count,
            in_transit_value: stats.in_transit_value,
            avg_residual_ttl_days: stats.avg_residual_ttl_days,
        }
    }
}

/// One credential, summarized
#[derive(Debug, Clone, Serialize)]
pub struct CredentialCard {
    /// Permit id
    pub permit_id: String,
    /// Level
    pub level: u32,
    /// Expiry
    pub expires_at: Timestamp,
}

/// Credential summary of one user
#[derive(Debug, Clone, Serialize)]
pub struct CredentialSummary {
    /// Total credentials held
    pub count: usize,
    /// First few of them
    pub list: Vec<CredentialCard>,
}

/// Relative position. Percentiles are placeholders: a faithful value
/// would need a market-wide sample.
#[derive(Debug, Clone, Serialize)]
pub struct PositionBlock {
    /// Dividend percentile (coarse approximation)
    pub du_percentile: u8,
    /// Loops percentile (placeholder)
    pub loops_percentile: u8,
    /// Caveat for consumers
    pub note: &'static str,
}

impl PositionBlock {
    fn approximate(du: &DuBlock) -> Self {
        let du_percentile: u8 = if du.active {
            if du.daily > 20.0 {
                25
            } else if du.daily > 15.0 {
                40
            } else if du.daily < 10.0 {
                60
            } else {
                50
            }
        } else {
            50
        };

        Self {
            du_percentile,
            loops_percentile: 50,
            note: "approximate - full percentile computation pending",
        }
    }
}

/// Everything the dashboard knows about one market
#[derive(Debug, Clone, Serialize)]
pub struct MarketDashboard {
    /// Normalized market tag
    pub market: String,
    /// Dividend block
    pub du: DuBlock,
    /// Parameter block
    pub params: ParamsBlock,
    /// Circulation block
    pub circulation: CirculationBlock,
    /// Credential summary
    pub credentials: CredentialSummary,
    /// Relative position
    pub position: PositionBlock,
    /// Derived textual signals
    pub signals: Vec<String>,
}

/// Dashboard summary across markets
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// Summed daily dividend
    pub total_du_daily: f64,
    /// Summed monthly projection
    pub total_du_monthly: f64,
    /// Summed loops of the month
    pub total_loops_30d: usize,
    /// Markets with an active dividend
    pub active_markets: usize,
    /// Weaver category
    pub network_category: NetworkCategory,
}

/// The complete user snapshot
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    /// User
    pub npub: PublicKey,
    /// Computation timestamp
    pub computed_at: Timestamp,
    /// Social graph position
    pub network: NetworkPosition,
    /// Per-market blocks
    pub markets: Vec<MarketDashboard>,
    /// Cross-market summary
    pub summary: Summary,
}

/// Build the complete dashboard for a user.
///
/// Markets are those tagged on the user's bonds, or [`DEFAULT_MARKET`]
/// when there are none; an explicit `market` restricts the build to it.
pub async fn build_dashboard(
    conn: &mut RelayConnection,
    user: &PublicKey,
    market: Option<&str>,
    issuer: Option<&PublicKey>,
    thresholds: &SignalThresholds,
) -> Result<Dashboard, EngineError> {
    tracing::debug!(user = %user, "Building dashboard");

    let markets: Vec<String> = match market {
        Some(market) => vec![market_tag(market)],
        None => user_markets(conn, user).await?,
    };

    let n1_list: Vec<PublicKey> = du::n1(conn, user).await?;
    let n2_list: Vec<PublicKey> = du::n2(conn, user, &n1_list).await?;
    let network: NetworkPosition = NetworkPosition {
        n1: n1_list.len(),
        n2: n2_list.len(),
        n2_per_n1: if n1_list.is_empty() {
            0.0
        } else {
            n2_list.len() as f64 / n1_list.len() as f64
        },
        category: NetworkCategory::from_counts(n1_list.len(), n2_list.len()),
    };

    let mut market_blocks: Vec<MarketDashboard> = Vec::with_capacity(markets.len());
    for market in markets.iter() {
        market_blocks.push(build_market(conn, user, market, issuer, thresholds).await);
    }

    let summary: Summary = Summary {
        total_du_daily: market_blocks.iter().map(|m| m.du.daily).sum(),
        total_du_monthly: market_blocks.iter().map(|m| m.du.monthly).sum(),
        total_loops_30d: market_blocks
            .iter()
            .map(|m| m.circulation.loops_this_month)
            .sum(),
        active_markets: market_blocks.iter().filter(|m| m.du.active).count(),
        network_category: network.category,
    };

    tracing::debug!(markets = market_blocks.len(), "Dashboard built");

    Ok(Dashboard {
        npub: *user,
        computed_at: Timestamp::now(),
        network,
        markets: market_blocks,
        summary,
    })
}

/// Markets where the user has authored bonds
async fn user_markets(
    conn: &mut RelayConnection,
    user: &PublicKey,
) -> Result<Vec<String>, EngineError> {
    let events = conn
        .query(vec![Filter::new()
            .kind(Kind::Bond)
            .author(*user)
            .limit(100)])
        .await?;

    let markets: BTreeSet<String> = parse_events(&events, Bond::from_event)
        .into_iter()
        .filter(|bond| !bond.market.is_empty())
        .map(|bond| bond.market)
        .collect();

    if markets.is_empty() {
        return Ok(vec![DEFAULT_MARKET.to_string()]);
    }

    Ok(markets.into_iter().collect())
}

/// Build one market's blocks, degrading each to its documented defaults
/// on relay failure.
async fn build_market(
    conn: &mut RelayConnection,
    user: &PublicKey,
    market: &str,
    issuer: Option<&PublicKey>,
    thresholds: &SignalThresholds,
) -> MarketDashboard {
    let du_block: DuBlock = match du::dividend(conn, user, market, issuer).await {
        Ok(du) => DuBlock::from(&du),
        Err(e) => {
            tracing::warn!(market, "Dividend unavailable, substituting defaults: {e}");
            DuBlock::inactive()
        }
    };

    let params_block: ParamsBlock = match params::all_params(conn, user, market).await {
        Ok(params) => ParamsBlock::from(&params),
        Err(e) => {
            tracing::warn!(market, "Params unavailable, substituting defaults: {e}");
            ParamsBlock::defaults()
        }
    };

    let circulation_block: CirculationBlock =
        match circuits::user_circulation_stats(conn, user, market).await {
            Ok(stats) => CirculationBlock::from(&stats),
            Err(e) => {
                tracing::warn!(market, "Circulation unavailable, substituting defaults: {e}");
                CirculationBlock::empty()
            }
        };

    let credentials: CredentialSummary = match user_credentials(conn, user, issuer).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!(market, "Credentials unavailable, substituting empty: {e}");
            CredentialSummary {
                count: 0,
                list: Vec::new(),
            }
        }
    };

    let signals: Vec<String> =
        build_signals(&params_block, &du_block, &circulation_block, thresholds);
    let position: PositionBlock = PositionBlock::approximate(&du_block);

    MarketDashboard {
        market: market_tag(market),
        du: du_block,
        params: params_block,
        circulation: circulation_block,
        credentials,
        position,
        signals,
    }
}

/// Credentials held by the user, issued by the oracle key
async fn user_credentials(
    conn: &mut RelayConnection,
    user: &PublicKey,
    issuer: Option<&PublicKey>,
) -> Result<CredentialSummary, EngineError> {
    let issuer: &PublicKey = match issuer {
        Some(issuer) => issuer,
        None => {
            return Ok(CredentialSummary {
                count: 0,
                list: Vec::new(),
            })
        }
    };

    let events = conn
        .query(vec![Filter::new()
            .kind(Kind::PermitCredential)
            .author(*issuer)
            .pubkey(*user)])
        .await?;

    let credentials: Vec<Credential> = parse_events(&events, Credential::from_event);

    Ok(CredentialSummary {
        count: credentials.len(),
        list: credentials
            .iter()
            .take(CREDENTIAL_PREVIEW)
            .map(|c| CredentialCard {
                permit_id: c.permit_id.clone(),
                level: c.level,
                expires_at: c.expires_at,
            })
            .collect(),
    })
}

/// Deterministic textual predicates over the numbers
fn build_signals(
    params: &ParamsBlock,
    du: &DuBlock,
    circulation: &CirculationBlock,
    thresholds: &SignalThresholds,
) -> Vec<String> {
    let mut signals: Vec<String> = Vec::new();

    if params.health_ratio < thresholds.health_low {
        signals.push("High expiry rate - network needs revitalizing".into());
    } else if params.health_ratio > thresholds.health_high {
        signals.push("Network in good health".into());
    }

    if params.c2 > thresholds.c2_high {
        signals.push("Network accelerating strongly".into());
    } else if params.c2 < thresholds.c2_low {
        signals.push("Slow network - consider widening N1".into());
    }

    if params.ttl_optimal_days < thresholds.ttl_fast {
        signals.push(format!(
            "Fast network - consider a TTL around {} days",
            params.ttl_optimal_days
        ));
    } else if params.ttl_optimal_days > thresholds.ttl_slow {
        signals.push(format!(
            "Patient network - suggested TTL: {} days",
            params.ttl_optimal_days
        ));
    }

    if params.alpha > thresholds.alpha_high {
        signals.push("Skills highly valued in this market".into());
    } else if params.alpha < thresholds.alpha_low {
        signals.push("Skills barely differentiating here - pure TRM".into());
    }

    if !du.active {
        signals.push(format!(
            "Dividend inactive - {MIN_N1} reciprocal peers needed"
        ));
    } else if du.daily > thresholds.du_high {
        signals.push("High dividend - very active network".into());
    }

    if circulation.loops_this_month > thresholds.loops_high {
        signals.push(format!(
            "{} loops this month - excellent circulation",
            circulation.loops_this_month
        ));
    } else if circulation.loops_this_month == 0 {
        signals.push("No loop this month - emit bonds".into());
    }

    if signals.is_empty() {
        signals.push("Stable network - keep going".into());
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        assert_eq!(NetworkCategory::from_counts(0, 0), NetworkCategory::Starter);
        assert_eq!(NetworkCategory::from_counts(1, 10), NetworkCategory::Starter);
        assert_eq!(NetworkCategory::from_counts(2, 0), NetworkCategory::Emergent);
        assert_eq!(NetworkCategory::from_counts(5, 0), NetworkCategory::Actif);
        assert_eq!(NetworkCategory::from_counts(9, 100), NetworkCategory::Actif);
        assert_eq!(NetworkCategory::from_counts(10, 50), NetworkCategory::Tisseur);
        assert_eq!(NetworkCategory::from_counts(10, 49), NetworkCategory::Actif);
    }

    #[test]
    fn test_signals_defaults_to_stable() {
        let thresholds = SignalThresholds::default();
        let params = ParamsBlock {
            c2: 0.07,
            alpha: 0.3,
            ttl_optimal_days: 28,
            health_ratio: 1.2,
        };
        let du = DuBlock {
            daily: 12.0,
            monthly: 360.0,
            base: 12.0,
            skill_bonus: 0.0,
            multiplier: 1.0,
            active: true,
        };
        let circulation = CirculationBlock {
            loops_this_month: 3,
            median_return_age_days: 10.0,
            in_transit_count: 1,
            in_transit_value: 10.0,
            avg_residual_ttl_days: 12.0,
        };

        let signals = build_signals(&params, &du, &circulation, &thresholds);
        assert_eq!(signals, vec!["Stable network - keep going".to_string()]);
    }

    #[test]
    fn test_signals_trigger_on_thresholds() {
        let thresholds = SignalThresholds::default();
        let params = ParamsBlock {
            c2: 0.15,
            alpha: 0.6,
            ttl_optimal_days: 10,
            health_ratio: 0.5,
        };
        let du = DuBlock::inactive();
        let circulation = CirculationBlock::empty();

        let signals = build_signals(&params, &du, &circulation, &thresholds);
        assert!(signals.iter().any(|s| s.contains("expiry rate")));
        assert!(signals.iter().any(|s| s.contains("accelerating")));
        assert!(signals.iter().any(|s| s.contains("TTL around 10")));
        assert!(signals.iter().any(|s| s.contains("highly valued")));
        assert!(signals.iter().any(|s| s.contains("Dividend inactive")));
        assert!(signals.iter().any(|s| s.contains("No loop")));
    }
}
