// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Universal Dividend
//!
//! TRM formula extended with a skill multiplier:
//!
//! ```text
//! DU_base  = DU_prev + C² × (M_N1 + M_N2/√N2) / (N1 + √N2)
//! DU_final = DU_base × (1 + α × S_i)
//! ```
//!
//! The dividend is memoryless: no prior state is persisted anywhere, so
//! `DU_prev` is always [`DU_INITIAL`].

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use troczen::event::Kind;
use troczen::filter::Filter;
use troczen::key::PublicKey;
use troczen::market::market_tag;
use troczen::records::{Bond, ContactList, Credential};
use troczen::types::Timestamp;
use troczen_relay::RelayConnection;

use crate::error::EngineError;
use crate::params;
use crate::parse_events;
use crate::stats::mean;

/// Minimum reciprocal peers before the dividend activates
pub const MIN_N1: usize = 5;
/// Universal starting dividend in Zen per day
pub const DU_INITIAL: f64 = 10.0;
/// Authors per active-mass batch query
const MASS_BATCH_SIZE: usize = 50;

/// Reciprocal first-order neighborhood.
///
/// A follower is in N1 iff the user follows them and they follow the user
/// back. Every follower's contact list is fetched in one batch query.
pub async fn n1(
    conn: &mut RelayConnection,
    user: &PublicKey,
) -> Result<Vec<PublicKey>, EngineError> {
    let own_list = conn
        .query_first(Filter::new().kind(Kind::ContactList).author(*user).limit(1))
        .await?;

    let follows: Vec<PublicKey> = match own_list.as_ref().and_then(ContactList::from_event) {
        Some(list) => list.follows.into_iter().collect(),
        None => return Ok(Vec::new()),
    };

    if follows.is_empty() {
        return Ok(Vec::new());
    }

    let lists: HashMap<PublicKey, ContactList> =
        contact_lists_of(conn, follows.iter().copied()).await?;

    Ok(follows
        .into_iter()
        .filter(|follow| {
            lists
                .get(follow)
                .map_or(false, |list| list.follows(user))
        })
        .collect())
}

/// Second-order neighborhood: union of the N1 members' follows, minus N1
/// and the user.
pub async fn n2(
    conn: &mut RelayConnection,
    user: &PublicKey,
    n1: &[PublicKey],
) -> Result<Vec<PublicKey>, EngineError> {
    if n1.is_empty() {
        return Ok(Vec::new());
    }

    let lists: HashMap<PublicKey, ContactList> =
        contact_lists_of(conn, n1.iter().copied()).await?;

    let n1_set: BTreeSet<&PublicKey> = n1.iter().collect();
    let mut second: BTreeSet<PublicKey> = BTreeSet::new();

    for list in lists.values() {
        for follow in list.follows.iter() {
            if follow != user && !n1_set.contains(follow) {
                second.insert(*follow);
            }
        }
    }

    Ok(second.into_iter().collect())
}

/// Fetch the newest contact list of each author in one batch query
async fn contact_lists_of<I>(
    conn: &mut RelayConnection,
    authors: I,
) -> Result<HashMap<PublicKey, ContactList>, EngineError>
where
    I: IntoIterator<Item = PublicKey>,
{
    let authors: Vec<PublicKey> = authors.into_iter().collect();
    let limit: usize = authors.len();

    let events = conn
        .query(vec![Filter::new()
            .kind(Kind::ContactList)
            .authors(authors)
            .limit(limit)])
        .await?;

    let mut lists: HashMap<PublicKey, ContactList> = HashMap::new();
    for list in parse_events(&events, ContactList::from_event).into_iter() {
        match lists.get(&list.pubkey) {
            Some(existing) if existing.created_at >= list.created_at => {}
            _ => {
                lists.insert(list.pubkey, list);
            }
        }
    }

    Ok(lists)
}

/// Active monetary mass held by a set of keys in a market.
///
/// Queries in batches of 50 authors; expired bonds contribute zero.
pub async fn active_mass(
    conn: &mut RelayConnection,
    pubkeys: &[PublicKey],
    market: &str,
) -> Result<f64, EngineError> {
    if pubkeys.is_empty() {
        return Ok(0.0);
    }

    let now: Timestamp = Timestamp::now();
    let tag: String = market_tag(market);
    let mut total: f64 = 0.0;

    for batch in pubkeys.chunks(MASS_BATCH_SIZE) {
        let events = conn
            .query(vec![Filter::new()
                .kind(Kind::Bond)
                .authors(batch.iter().copied())
                .custom_tag("market", tag.clone())])
            .await?;

        total += parse_events(&events, Bond::from_event)
            .iter()
            .filter(|b| b.is_active(now))
            .map(|b| b.value)
            .sum::<f64>();
    }

    Ok(total)
}

/// Mean certified level of the user's credentials issued by the oracle
pub async fn skill_score(
    conn: &mut RelayConnection,
    issuer: &PublicKey,
    user: &PublicKey,
) -> Result<f64, EngineError> {
    let events = conn
        .query(vec![Filter::new()
            .kind(Kind::PermitCredential)
            .author(*issuer)
            .pubkey(*user)])
        .await?;

    let levels: Vec<f64> = parse_events(&events, Credential::from_event)
        .iter()
        .map(|c| troczen::permit::level(&c.permit_id) as f64)
        .collect();

    Ok(mean(&levels))
}

/// Universal dividend of one user in one market
#[derive(Debug, Clone, Serialize)]
pub struct DuResult {
    /// Daily dividend in Zen
    pub du: f64,
    /// Dividend before the skill multiplier
    pub du_base: f64,
    /// Skill bonus part
    pub du_skill: f64,
    /// Monthly projection
    pub du_monthly: f64,
    /// C² used
    pub c2: f64,
    /// α used
    pub alpha: f64,
    /// Skill score
    pub s_i: f64,
    /// Skill multiplier applied to the base
    pub multiplier: f64,
    /// Reciprocal peers
    pub n1: usize,
    /// Second-order peers
    pub n2: usize,
    /// Active mass of N1
    pub m_n1: f64,
    /// Active mass of N2
    pub m_n2: f64,
    /// Whether the dividend is active
    pub active: bool,
    /// Why it is inactive, when it is
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Computation timestamp
    pub computed_at: Timestamp,
}

impl DuResult {
    /// Inactive dividend with the given network counts
    pub fn inactive<S>(reason: S, n1: usize, n2: usize) -> Self
    where
        S: Into<String>,
    {
        Self {
            du: 0.0,
            du_base: 0.0,
            du_skill: 0.0,
            du_monthly: 0.0,
            c2: 0.0,
            alpha: 0.0,
            s_i: 0.0,
            multiplier: 1.0,
            n1,
            n2,
            m_n1: 0.0,
            m_n2: 0.0,
            active: false,
            reason: Some(reason.into()),
            computed_at: Timestamp::now(),
        }
    }
}

/// Compute the dividend for one user in one market.
///
/// `issuer` is the oracle key whose credentials carry the skill score;
/// without it the score is zero.
pub async fn dividend(
    conn: &mut RelayConnection,
    user: &PublicKey,
    market: &str,
    issuer: Option<&PublicKey>,
) -> Result<DuResult, EngineError> {
    tracing::debug!(user = %user, market, "Computing dividend");

    let n1_list: Vec<PublicKey> = n1(conn, user).await?;
    let n2_list: Vec<PublicKey> = n2(conn, user, &n1_list).await?;

    let n1_count: usize = n1_list.len();
    let n2_count: usize = n2_list.len();

    if n1_count < MIN_N1 {
        tracing::debug!(n1 = n1_count, "Below the N1 floor, dividend inactive");
        return Ok(DuResult::inactive(
            format!("N1<{MIN_N1}"),
            n1_count,
            n2_count,
        ));
    }

    let m_n1: f64 = active_mass(conn, &n1_list, market).await?;
    let m_n2: f64 = active_mass(conn, &n2_list, market).await?;

    let params = params::all_params(conn, user, market).await?;

    let s_i: f64 = match issuer {
        Some(issuer) => skill_score(conn, issuer, user).await?,
        None => 0.0,
    };

    // memoryless: every computation starts from the universal initial value
    let prev: f64 = DU_INITIAL;

    let sq_n2: f64 = (n2_count.max(1) as f64).sqrt();
    let du_increment: f64 = params.c2 * (m_n1 + m_n2 / sq_n2) / (n1_count as f64 + sq_n2);
    let du_base: f64 = prev + du_increment;

    let multiplier: f64 = 1.0 + params.alpha * s_i;
    let du: f64 = du_base * multiplier;
    let du_skill: f64 = du_base * (multiplier - 1.0);

    tracing::debug!(du, du_base, du_skill, "Dividend computed");

    Ok(DuResult {
        du,
        du_base,
        du_skill,
        du_monthly: du * 30.0,
        c2: params.c2,
        alpha: params.alpha,
        s_i,
        multiplier,
        n1: n1_count,
        n2: n2_count,
        m_n1,
        m_n2,
        active: true,
        reason: None,
        computed_at: Timestamp::now(),
    })
}
