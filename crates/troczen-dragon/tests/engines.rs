// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Engine scenarios against the in-process mock relay.

use troczen::event::{Event, EventBuilder, Kind, Tag};
use troczen::key::{Keys, PublicKey};
use troczen::types::time::DAY;
use troczen::types::Timestamp;
use troczen_dragon::{circuits, du, params};
use troczen_relay::mock::MockRelay;
use troczen_relay::{RelayClient, RelayConnection};

fn contact_list(keys: &Keys, follows: &[PublicKey]) -> Event {
    let tags: Vec<Tag> = follows.iter().map(|pk| Tag::public_key(*pk)).collect();
    EventBuilder::new(Kind::ContactList, "", tags)
        .sign(keys)
        .unwrap()
}

fn bond(keys: &Keys, d: &str, market: &str, value: f64, created_at: Timestamp, expires: Timestamp) -> Event {
    EventBuilder::new(
        Kind::Bond,
        "",
        vec![
            Tag::identifier(d),
            Tag::custom("market", market),
            Tag::custom("value", value.to_string()),
            Tag::custom("expires", expires.to_string()),
        ],
    )
    .custom_created_at(created_at)
    .sign(keys)
    .unwrap()
}

#[allow(clippy::too_many_arguments)]
fn circuit(
    keys: &Keys,
    d: &str,
    bond_id: &str,
    market: &str,
    issued_by: &PublicKey,
    age_days: f64,
    value: f64,
    skill_cert: Option<&str>,
    dest_market: Option<&str>,
    closed_at: Timestamp,
) -> Event {
    let mut content = serde_json::json!({
        "age_days": age_days,
        "hop_count": 2,
        "value_zen": value,
    });
    if let Some(cert) = skill_cert {
        content["skill_cert"] = serde_json::json!(cert);
    }
    if let Some(dest) = dest_market {
        content["dest_market_id"] = serde_json::json!(dest);
    }

    EventBuilder::new(
        Kind::Circuit,
        content.to_string(),
        vec![
            Tag::identifier(d),
            Tag::custom("bon_id", bond_id),
            Tag::custom("market", market),
            Tag::custom("issued_by", issued_by.to_hex()),
        ],
    )
    .custom_created_at(closed_at)
    .sign(keys)
    .unwrap()
}

async fn connect(relay: &MockRelay) -> RelayConnection {
    RelayClient::new(relay.url()).connect().await.unwrap()
}

#[tokio::test]
async fn reciprocal_graph() {
    let relay = MockRelay::run().await.unwrap();

    let a = Keys::generate();
    let b = Keys::generate();
    let c = Keys::generate();
    let d = Keys::generate();
    let e = Keys::generate().public_key();
    let f = Keys::generate().public_key();

    relay
        .seed(contact_list(
            &a,
            &[b.public_key(), c.public_key(), d.public_key()],
        ))
        .await;
    relay.seed(contact_list(&b, &[a.public_key(), e])).await;
    relay.seed(contact_list(&c, &[e])).await;
    relay.seed(contact_list(&d, &[a.public_key(), f])).await;

    let mut conn = connect(&relay).await;

    let n1 = du::n1(&mut conn, &a.public_key()).await.unwrap();
    let mut expected_n1 = vec![b.public_key(), d.public_key()];
    expected_n1.sort();
    let mut got_n1 = n1.clone();
    got_n1.sort();
    assert_eq!(got_n1, expected_n1);

    let n2 = du::n2(&mut conn, &a.public_key(), &n1).await.unwrap();
    let mut expected_n2 = vec![e, f];
    expected_n2.sort();
    assert_eq!(n2, expected_n2);

    conn.disconnect().await;
    relay.shutdown();
}

#[tokio::test]
async fn dividend_floor_below_five_reciprocals() {
    let relay = MockRelay::run().await.unwrap();

    let user = Keys::generate();
    let peers: Vec<Keys> = (0..3).map(|_| Keys::generate()).collect();
    let peer_keys: Vec<PublicKey> = peers.iter().map(|k| k.public_key()).collect();

    relay.seed(contact_list(&user, &peer_keys)).await;
    for peer in peers.iter() {
        relay.seed(contact_list(peer, &[user.public_key()])).await;
    }

    let mut conn = connect(&relay).await;
    let result = du::dividend(&mut conn, &user.public_key(), "Toulouse", None)
        .await
        .unwrap();

    assert!(!result.active);
    assert_eq!(result.du, 0.0);
    assert_eq!(result.n1, 3);
    assert_eq!(result.reason.as_deref(), Some("N1<5"));

    conn.disconnect().await;
    relay.shutdown();
}

#[tokio::test]
async fn dividend_activates_with_five_reciprocals() {
    let relay = MockRelay::run().await.unwrap();
    let now = Timestamp::now();

    let user = Keys::generate();
    let peers: Vec<Keys> = (0..5).map(|_| Keys::generate()).collect();
    let peer_keys: Vec<PublicKey> = peers.iter().map(|k| k.public_key()).collect();

    relay.seed(contact_list(&user, &peer_keys)).await;
    for (i, peer) in peers.iter().enumerate() {
        relay.seed(contact_list(peer, &[user.public_key()])).await;
        // each reciprocal peer holds one active bond of 12 Zen
        relay
            .seed(bond(
                peer,
                &format!("peer-bond-{i}"),
                "market_toulouse",
                12.0,
                now.days_ago(1),
                now + 20 * DAY,
            ))
            .await;
    }

    let mut conn = connect(&relay).await;
    let result = du::dividend(&mut conn, &user.public_key(), "Toulouse", None)
        .await
        .unwrap();

    // N1 = 5, N2 = 0, M1 = 60: du = 10 + 0.07 * 60 / (5 + 1) = 10.7
    assert!(result.active);
    assert_eq!(result.n1, 5);
    assert_eq!(result.n2, 0);
    assert!((result.m_n1 - 60.0).abs() < 1e-9);
    assert!((result.du - 10.7).abs() < 1e-9);
    // no oracle key: the skill multiplier stays neutral
    assert!((result.multiplier - 1.0).abs() < 1e-9);

    conn.disconnect().await;
    relay.shutdown();
}

#[tokio::test]
async fn c_squared_is_clamped_at_the_ceiling() {
    let relay = MockRelay::run().await.unwrap();
    let now = Timestamp::now();

    let user = Keys::generate();
    let closer = Keys::generate();

    // one closed circuit of age 50 days in the window
    relay
        .seed(circuit(
            &closer,
            "circuit-1",
            "bon-1",
            "market_toulouse",
            &user.public_key(),
            50.0,
            20.0,
            None,
            None,
            now.days_ago(1),
        ))
        .await;

    // one emitted bond with a 10-day TTL, still active (zero expired)
    relay
        .seed(bond(
            &user,
            "bon-2",
            "market_toulouse",
            20.0,
            now.days_ago(1),
            now.days_ago(1) + 10 * DAY,
        ))
        .await;

    let mut conn = connect(&relay).await;
    let metrics = params::c_squared(&mut conn, &user.public_key(), "Toulouse")
        .await
        .unwrap();

    // unclamped: (50/10) * min(1/0.1, 2) * (1 + 0.5) = 15
    assert_eq!(metrics.loops_count, 1);
    assert_eq!(metrics.expired_count, 0);
    assert!((metrics.median_return_age - 50.0).abs() < 1e-9);
    assert!((metrics.median_ttl - 10.0).abs() < 1e-9);
    assert!((metrics.health_ratio - 2.0).abs() < 1e-9);
    assert!((metrics.n1_growth - 0.5).abs() < 1e-9);
    assert!((metrics.c2 - params::C2_MAX).abs() < 1e-9);

    conn.disconnect().await;
    relay.shutdown();
}

#[tokio::test]
async fn c_squared_defaults_without_history() {
    let relay = MockRelay::run().await.unwrap();
    let user = Keys::generate();

    let mut conn = connect(&relay).await;
    let metrics = params::c_squared(&mut conn, &user.public_key(), "Toulouse")
        .await
        .unwrap();

    assert!((metrics.c2 - params::C2_DEFAULT).abs() < 1e-9);

    let ttl = params::ttl_optimal(&mut conn, &user.public_key(), "Toulouse")
        .await
        .unwrap();
    assert_eq!(ttl, params::TTL_DEFAULT);

    conn.disconnect().await;
    relay.shutdown();
}

#[tokio::test]
async fn alpha_needs_five_certified_samples() {
    let relay = MockRelay::run().await.unwrap();
    let now = Timestamp::now();

    let user = Keys::generate();
    let closer = Keys::generate();

    for i in 0..4 {
        relay
            .seed(circuit(
                &closer,
                &format!("circuit-{i}"),
                &format!("bon-{i}"),
                "market_toulouse",
                &user.public_key(),
                10.0 + i as f64,
                20.0,
                Some("PERMIT_MARAICHAGE_X2"),
                None,
                now.days_ago(1),
            ))
            .await;
    }

    let mut conn = connect(&relay).await;
    let metrics = params::alpha(&mut conn, &user.public_key(), "Toulouse")
        .await
        .unwrap();

    assert_eq!(metrics.skill_loops_count, 4);
    assert!((metrics.alpha - params::ALPHA_DEFAULT).abs() < 1e-9);
    assert_eq!(metrics.correlation, 0.0);

    conn.disconnect().await;
    relay.shutdown();
}

#[tokio::test]
async fn alpha_follows_a_perfect_correlation() {
    let relay = MockRelay::run().await.unwrap();
    let now = Timestamp::now();

    let user = Keys::generate();
    let closer = Keys::generate();

    // higher level -> faster return: level n comes back in (30 - 5n) days
    for level in 1..=5u32 {
        relay
            .seed(circuit(
                &closer,
                &format!("circuit-{level}"),
                &format!("bon-{level}"),
                "market_toulouse",
                &user.public_key(),
                30.0 - 5.0 * level as f64,
                20.0,
                Some(&format!("PERMIT_MARAICHAGE_X{level}")),
                None,
                now.days_ago(1),
            ))
            .await;
    }

    let mut conn = connect(&relay).await;
    let metrics = params::alpha(&mut conn, &user.public_key(), "Toulouse")
        .await
        .unwrap();

    assert_eq!(metrics.skill_loops_count, 5);
    assert!((metrics.correlation - 1.0).abs() < 1e-6);
    assert!((metrics.alpha - 0.8).abs() < 1e-6);
    assert!((metrics.avg_skill_level - 3.0).abs() < 1e-9);

    conn.disconnect().await;
    relay.shutdown();
}

#[tokio::test]
async fn active_bonds_exclude_expired_and_match_market_stats() {
    let relay = MockRelay::run().await.unwrap();
    let now = Timestamp::now();

    let holder = Keys::generate();

    relay
        .seed(bond(&holder, "b-active-1", "market_toulouse", 25.0, now.days_ago(2), now + 10 * DAY))
        .await;
    relay
        .seed(bond(&holder, "b-active-2", "market_toulouse", 15.0, now.days_ago(2), now + 5 * DAY))
        .await;
    relay
        .seed(bond(&holder, "b-expired", "market_toulouse", 40.0, now.days_ago(20), now.days_ago(1)))
        .await;
    relay
        .seed(bond(&holder, "b-elsewhere", "market_paris", 99.0, now.days_ago(2), now + 10 * DAY))
        .await;

    let mut conn = connect(&relay).await;

    let bonds = circuits::active_bonds(&mut conn, "Toulouse", None).await.unwrap();
    assert_eq!(bonds.len(), 2);
    assert!(bonds.iter().all(|b| b.is_active(now)));

    let stats = circuits::market_stats(&mut conn, "Toulouse").await.unwrap();
    assert_eq!(stats.active_bonds_count, 2);
    let total: f64 = bonds.iter().map(|b| b.value).sum();
    assert!((stats.active_bonds_value - total).abs() < 1e-9);
    assert!((stats.active_bonds_value - 40.0).abs() < 1e-9);

    conn.disconnect().await;
    relay.shutdown();
}

#[tokio::test]
async fn intermarket_rates_split_the_flow() {
    let relay = MockRelay::run().await.unwrap();
    let now = Timestamp::now();

    let closer = Keys::generate();
    let issuer = Keys::generate().public_key();

    // alpha -> beta: 30 Zen, beta -> alpha: 10 Zen
    relay
        .seed(circuit(
            &closer,
            "c-ab",
            "bon-ab",
            "market_alpha",
            &issuer,
            10.0,
            30.0,
            None,
            Some("market_beta"),
            now.days_ago(2),
        ))
        .await;
    relay
        .seed(circuit(
            &closer,
            "c-ba",
            "bon-ba",
            "market_beta",
            &issuer,
            10.0,
            10.0,
            None,
            Some("market_alpha"),
            now.days_ago(3),
        ))
        .await;

    let mut conn = connect(&relay).await;
    let rates = circuits::intermarket_rates(&mut conn).await.unwrap();

    let ab: f64 = rates["market_alpha"]["market_beta"];
    let ba: f64 = rates["market_beta"]["market_alpha"];
    assert!((ab - 0.75).abs() < 1e-6);
    assert!((ba - 0.25).abs() < 1e-6);
    assert!((ab + ba - 1.0).abs() < 1e-6);

    conn.disconnect().await;
    relay.shutdown();
}

#[tokio::test]
async fn circulation_stats_for_one_user() {
    let relay = MockRelay::run().await.unwrap();
    let now = Timestamp::now();

    let user = Keys::generate();
    let closer = Keys::generate();

    for (i, age) in [10.0, 20.0, 30.0].iter().enumerate() {
        relay
            .seed(circuit(
                &closer,
                &format!("c-{i}"),
                &format!("bon-{i}"),
                "market_toulouse",
                &user.public_key(),
                *age,
                15.0,
                None,
                None,
                now.days_ago(1 + i as u64),
            ))
            .await;
    }

    // one active bond, still at its issuer (zero hops)
    relay
        .seed(bond(&user, "b-1", "market_toulouse", 25.0, now.days_ago(1), now + 10 * DAY))
        .await;

    let mut conn = connect(&relay).await;
    let stats = circuits::user_circulation_stats(&mut conn, &user.public_key(), "Toulouse")
        .await
        .unwrap();

    assert_eq!(stats.loops_30d, 3);
    assert!((stats.total_looped_value - 45.0).abs() < 1e-9);
    assert!((stats.median_circuit_age_days - 20.0).abs() < 1e-9);
    assert_eq!(stats.active_bonds_count, 1);
    assert_eq!(stats.in_transit_count, 0);
    // created one day ago with a ten-day TTL: about nine days left
    assert!((stats.avg_residual_ttl_days - 9.0).abs() < 0.1);

    conn.disconnect().await;
    relay.shutdown();
}
