// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! DRAGON service
//!
//! Facade invoked by the HTTP handlers: every call opens its own relay
//! connection, runs its queries in order, and disconnects. No state
//! survives the call.

use std::collections::BTreeMap;

use serde::Serialize;
use troczen::event::Kind;
use troczen::filter::Filter;
use troczen::key::PublicKey;
use troczen::market::market_tag;
use troczen::records::{Bond, Circuit};
use troczen::types::Timestamp;
use troczen_relay::{RelayClient, RelayConnection, RelayOptions};

use crate::circuits::{self, MarketStats};
use crate::dashboard::{self, Dashboard, SignalThresholds};
use crate::directory::{self, MarketDirectory};
use crate::du::{self, DuResult};
use crate::error::EngineError;
use crate::params::{self, Params};
use crate::parse_events;

/// Default relay URL
pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:7777";
/// Default monthly infrastructure cost in EUR
const DEFAULT_MONTHLY_SERVER_COST: f64 = 42.0;
/// Default Zen/EUR exchange rate
const DEFAULT_ZEN_EUR_RATE: f64 = 1.0;
/// Bonds assumed per user for the fee estimate
const BONDS_PER_USER_ESTIMATE: usize = 3;
/// Event cap for the global snapshot
const GLOBAL_SNAPSHOT_LIMIT: usize = 1_000;

/// Market health label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// `health >= 1.5` and `loops >= 10`
    Excellent,
    /// `health >= 1` and `loops >= 5`
    Good,
    /// `health >= 0.5`
    Moderate,
    /// Anything below
    NeedsAttention,
}

impl HealthStatus {
    fn from_stats(stats: &MarketStats) -> Self {
        if stats.health_ratio >= 1.5 && stats.loops_30d >= 10 {
            Self::Excellent
        } else if stats.health_ratio >= 1.0 && stats.loops_30d >= 5 {
            Self::Good
        } else if stats.health_ratio >= 0.5 {
            Self::Moderate
        } else {
            Self::NeedsAttention
        }
    }
}

/// Market statistics with a derived status label
#[derive(Debug, Clone, Serialize)]
pub struct MarketHealth {
    /// The underlying statistics
    #[serde(flatten)]
    pub stats: MarketStats,
    /// Derived label
    pub status: HealthStatus,
}

/// One page of a market's circuits
#[derive(Debug, Clone, Serialize)]
pub struct CircuitsPage {
    /// Normalized market tag
    pub market: String,
    /// 1-based page number
    pub page: usize,
    /// Page size
    pub limit: usize,
    /// Circuits on this page
    pub count: usize,
    /// The circuits, newest first
    pub circuits: Vec<Circuit>,
}

/// Inter-market rate matrix
#[derive(Debug, Clone, Serialize)]
pub struct IntermarketRates {
    /// `rates[A][B]` is the A->B rate in `[0, 1]`
    pub rates: BTreeMap<String, BTreeMap<String, f64>>,
    /// Computation timestamp
    pub computed_at: Timestamp,
}

/// Infrastructure participation fee.
///
/// The user count is a heuristic proxy (active bonds divided by three);
/// the formula is deliberately trivial to replace.
#[derive(Debug, Clone, Serialize)]
pub struct InfrastructureFee {
    /// Normalized market tag
    pub market: String,
    /// Monthly fee in Zen
    pub monthly_paf_zen: f64,
    /// Monthly fee in EUR
    pub monthly_paf_eur: f64,
    /// Zen/EUR rate used
    pub zen_eur_rate: f64,
    /// Estimated active users
    pub estimated_users: usize,
    /// Monthly infrastructure cost in EUR
    pub infrastructure_cost_eur: f64,
    /// Computation timestamp
    pub computed_at: Timestamp,
}

/// System-wide snapshot
#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    /// Active bonds
    pub active_bonds: usize,
    /// Summed active value
    pub total_active_value: f64,
    /// Circuits seen
    pub total_circuits: usize,
    /// Distinct bond authors
    pub unique_users: usize,
    /// Markets with bonds
    pub active_markets: usize,
    /// First few market tags
    pub markets: Vec<String>,
    /// Computation timestamp
    pub computed_at: Timestamp,
}

/// DRAGON facade
#[derive(Debug, Clone)]
pub struct DragonService {
    relay: RelayClient,
    oracle_pubkey: Option<PublicKey>,
    thresholds: SignalThresholds,
    monthly_server_cost: f64,
    zen_eur_rate: f64,
}

impl DragonService {
    /// New service talking to the given relay
    pub fn new(relay: RelayClient, oracle_pubkey: Option<PublicKey>) -> Self {
        Self {
            relay,
            oracle_pubkey,
            thresholds: SignalThresholds::default(),
            monthly_server_cost: DEFAULT_MONTHLY_SERVER_COST,
            zen_eur_rate: DEFAULT_ZEN_EUR_RATE,
        }
    }

    /// Build from the environment: `NOSTR_RELAY`, `ORACLE_PUBKEY`,
    /// `NOSTR_PAGE_SIZE`, `NOSTR_MAX_RESULTS`, `MONTHLY_SERVER_COST`,
    /// `ZEN_EUR_RATE`.
    pub fn from_env() -> Self {
        let url: String =
            std::env::var("NOSTR_RELAY").unwrap_or_else(|_| DEFAULT_RELAY_URL.to_string());
        let relay = RelayClient::with_opts(url, RelayOptions::from_env());

        let oracle_pubkey: Option<PublicKey> = match std::env::var("ORACLE_PUBKEY") {
            Ok(hex) if !hex.is_empty() => match PublicKey::from_hex(&hex) {
                Ok(pubkey) => Some(pubkey),
                Err(e) => {
                    tracing::warn!("Ignoring invalid ORACLE_PUBKEY: {e}");
                    None
                }
            },
            _ => None,
        };

        let mut service = Self::new(relay, oracle_pubkey);

        if let Some(cost) = env_f64("MONTHLY_SERVER_COST") {
            service.monthly_server_cost = cost;
        }
        if let Some(rate) = env_f64("ZEN_EUR_RATE") {
            service.zen_eur_rate = rate;
        }

        service
    }

    /// Override the signal thresholds
    pub fn thresholds(mut self, thresholds: SignalThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// The oracle key used for credential lookups
    #[inline]
    pub fn oracle_pubkey(&self) -> Option<&PublicKey> {
        self.oracle_pubkey.as_ref()
    }

    /// Build the complete dashboard for a user
    pub async fn dashboard(
        &self,
        user: &PublicKey,
        market: Option<&str>,
    ) -> Result<Dashboard, EngineError> {
        let mut conn: RelayConnection = self.relay.connect().await?;
        let result = dashboard::build_dashboard(
            &mut conn,
            user,
            market,
            self.oracle_pubkey.as_ref(),
            &self.thresholds,
        )
        .await;
        conn.disconnect().await;
        result
    }

    /// Compute the universal dividend for one user in one market
    pub async fn dividend(
        &self,
        user: &PublicKey,
        market: &str,
    ) -> Result<DuResult, EngineError> {
        let mut conn: RelayConnection = self.relay.connect().await?;
        let result = du::dividend(&mut conn, user, market, self.oracle_pubkey.as_ref()).await;
        conn.disconnect().await;
        result
    }

    /// Compute all dynamic parameters for one user in one market
    pub async fn params(&self, user: &PublicKey, market: &str) -> Result<Params, EngineError> {
        let mut conn: RelayConnection = self.relay.connect().await?;
        let result = params::all_params(&mut conn, user, market).await;
        conn.disconnect().await;
        result
    }

    /// Paginate a market's circuits, newest first
    pub async fn circuits_page(
        &self,
        market: &str,
        page: usize,
        limit: usize,
    ) -> Result<CircuitsPage, EngineError> {
        let page: usize = page.max(1);
        let limit: usize = limit.max(1);

        let mut conn: RelayConnection = self.relay.connect().await?;
        let result = circuits::circuits(&mut conn, market, None, None, page * limit).await;
        conn.disconnect().await;

        let mut circuits: Vec<Circuit> = result?;
        circuits.sort_by(|a, b| b.closed_at.cmp(&a.closed_at));

        let circuits: Vec<Circuit> = circuits
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect();

        Ok(CircuitsPage {
            market: market_tag(market),
            page,
            limit,
            count: circuits.len(),
            circuits,
        })
    }

    /// Market statistics with the derived health label
    pub async fn market_health(&self, market: &str) -> Result<MarketHealth, EngineError> {
        let mut conn: RelayConnection = self.relay.connect().await?;
        let result = circuits::market_stats(&mut conn, market).await;
        conn.disconnect().await;

        let stats: MarketStats = result?;
        let status: HealthStatus = HealthStatus::from_stats(&stats);

        Ok(MarketHealth { stats, status })
    }

    /// The emergent inter-market rate matrix
    pub async fn intermarket_rates(&self) -> Result<IntermarketRates, EngineError> {
        let mut conn: RelayConnection = self.relay.connect().await?;
        let result = circuits::intermarket_rates(&mut conn).await;
        conn.disconnect().await;

        Ok(IntermarketRates {
            rates: result?,
            computed_at: Timestamp::now(),
        })
    }

    /// The merchant directory of a market
    pub async fn market_directory(&self, market: &str) -> Result<MarketDirectory, EngineError> {
        let mut conn: RelayConnection = self.relay.connect().await?;
        let result = directory::market_directory(&mut conn, market).await;
        conn.disconnect().await;
        result
    }

    /// Infrastructure participation fee of a market
    pub async fn infrastructure_fee(
        &self,
        market: &str,
    ) -> Result<InfrastructureFee, EngineError> {
        let mut conn: RelayConnection = self.relay.connect().await?;
        let result = circuits::market_stats(&mut conn, market).await;
        conn.disconnect().await;

        let stats: MarketStats = result?;
        let estimated_users: usize =
            (stats.active_bonds_count / BONDS_PER_USER_ESTIMATE).max(1);

        let monthly_paf_eur: f64 = self.monthly_server_cost / estimated_users as f64;
        let monthly_paf_zen: f64 = monthly_paf_eur / self.zen_eur_rate;

        Ok(InfrastructureFee {
            market: market_tag(market),
            monthly_paf_zen,
            monthly_paf_eur,
            zen_eur_rate: self.zen_eur_rate,
            estimated_users,
            infrastructure_cost_eur: self.monthly_server_cost,
            computed_at: Timestamp::now(),
        })
    }

    /// System-wide snapshot
    pub async fn global_stats(&self) -> Result<GlobalStats, EngineError> {
        let mut conn: RelayConnection = self.relay.connect().await?;

        let bond_events = match conn
            .query(vec![Filter::new()
                .kind(Kind::Bond)
                .limit(GLOBAL_SNAPSHOT_LIMIT)])
            .await
        {
            Ok(events) => events,
            Err(e) => {
                conn.disconnect().await;
                return Err(e.into());
            }
        };

        let circuit_events = match conn
            .query(vec![Filter::new()
                .kind(Kind::Circuit)
                .limit(GLOBAL_SNAPSHOT_LIMIT)])
            .await
        {
            Ok(events) => events,
            Err(e) => {
                conn.disconnect().await;
                return Err(e.into());
            }
        };

        conn.disconnect().await;

        let now: Timestamp = Timestamp::now();
        let bonds: Vec<Bond> = parse_events(&bond_events, Bond::from_event);

        let active: Vec<&Bond> = bonds.iter().filter(|b| b.is_active(now)).collect();
        let users: std::collections::BTreeSet<PublicKey> =
            bonds.iter().map(|b| b.holder).collect();
        let markets: std::collections::BTreeSet<&str> = bonds
            .iter()
            .map(|b| b.market.as_str())
            .filter(|m| !m.is_empty())
            .collect();

        Ok(GlobalStats {
            active_bonds: active.len(),
            total_active_value: active.iter().map(|b| b.value).sum(),
            total_circuits: circuit_events.len(),
            unique_users: users.len(),
            active_markets: markets.len(),
            markets: markets.into_iter().take(10).map(String::from).collect(),
            computed_at: now,
        })
    }
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok()?.parse().ok()
}
