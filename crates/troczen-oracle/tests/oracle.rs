// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Attestation-to-credential scenarios against the in-process mock relay.

use std::time::Duration;

use troczen::event::{Event, EventBuilder, Kind, Tag};
use troczen::key::Keys;
use troczen::records::Credential;
use troczen::types::time::DAY;
use troczen_oracle::{CredentialGenerator, OracleOptions, OracleService, Outcome, RejectReason};
use troczen_relay::mock::MockRelay;
use troczen_relay::RelayClient;

fn permit_definition(author: &Keys, permit_id: &str, required: Option<usize>) -> Event {
    let content = match required {
        Some(required) => format!(r#"{{"required_attestations":{required}}}"#),
        None => String::from("{}"),
    };

    EventBuilder::new(
        Kind::PermitDefinition,
        content,
        vec![
            Tag::identifier(permit_id),
            Tag::custom("name", "Test permit"),
            Tag::custom("category", "skill"),
            Tag::custom("skill", "semis"),
        ],
    )
    .sign(author)
    .unwrap()
}

fn permit_request(author: &Keys, d: Option<&str>, permit_id: &str) -> Event {
    let mut tags: Vec<Tag> = vec![Tag::custom("permit_id", permit_id)];
    if let Some(d) = d {
        tags.insert(0, Tag::identifier(d));
    }

    EventBuilder::new(Kind::PermitRequest, "", tags)
        .sign(author)
        .unwrap()
}

fn attestation(author: &Keys, request_ref: &str) -> Event {
    EventBuilder::new(
        Kind::PermitAttestation,
        "well deserved",
        vec![Tag::custom("e", request_ref)],
    )
    .sign(author)
    .unwrap()
}

fn oracle_for(relay: &MockRelay, keys: &Keys) -> OracleService {
    OracleService::new(RelayClient::new(relay.url()), keys.clone())
}

async fn credentials_of(relay: &MockRelay) -> Vec<Credential> {
    // let the fire-and-forget publication settle
    tokio::time::sleep(Duration::from_millis(100)).await;
    relay
        .events()
        .await
        .iter()
        .filter(|e| e.kind == Kind::PermitCredential)
        .filter_map(Credential::from_event)
        .collect()
}

#[tokio::test]
async fn community_permit_issues_on_first_attestation() {
    let relay = MockRelay::run().await.unwrap();
    let oracle_keys = Keys::generate();
    let requester = Keys::generate();
    let attestor = Keys::generate();

    relay
        .seed(permit_definition(&oracle_keys, "PERMIT_MARAICHAGE_X1", None))
        .await;
    relay
        .seed(permit_request(&requester, Some("req-1"), "PERMIT_MARAICHAGE_X1"))
        .await;
    let att = attestation(&attestor, "req-1");
    relay.seed(att.clone()).await;

    let oracle = oracle_for(&relay, &oracle_keys);
    let outcome = oracle.process_attestation(&att).await.unwrap();
    assert!(matches!(outcome, Outcome::Issued { .. }));

    let credentials = credentials_of(&relay).await;
    assert_eq!(credentials.len(), 1);

    let credential = &credentials[0];
    assert_eq!(credential.holder, Some(requester.public_key()));
    assert_eq!(credential.permit_id, "PERMIT_MARAICHAGE_X1");
    assert_eq!(credential.attestors, vec![attestor.public_key()]);
    assert_eq!(credential.request_id.as_deref(), Some("req-1"));
    assert_eq!(
        credential.expires_at.as_u64() - credential.issued_at.as_u64(),
        365 * DAY
    );
    // skills flow in from the permit definition
    assert_eq!(credential.skills, vec!["semis"]);

    // the signed envelope on the relay verifies
    let stored: Vec<Event> = relay.events().await;
    let envelope = stored
        .iter()
        .find(|e| e.kind == Kind::PermitCredential)
        .unwrap();
    envelope.verify().unwrap();
    assert_eq!(envelope.pubkey, oracle_keys.public_key());

    // badge pair published alongside
    assert!(stored.iter().any(|e| e.kind == Kind::BadgeDefinition));
    assert!(stored.iter().any(|e| e.kind == Kind::BadgeAward));

    relay.shutdown();
}

#[tokio::test]
async fn official_permit_waits_for_the_threshold() {
    let relay = MockRelay::run().await.unwrap();
    let oracle_keys = Keys::generate();
    let requester = Keys::generate();
    let v1 = Keys::generate();
    let v2 = Keys::generate();
    let v3 = Keys::generate();

    relay
        .seed(permit_definition(&oracle_keys, "PERMIT_SAFETY_V1", Some(2)))
        .await;
    relay
        .seed(permit_request(&requester, Some("req-safety"), "PERMIT_SAFETY_V1"))
        .await;

    let oracle = oracle_for(&relay, &oracle_keys);

    // first attestation: below the threshold
    let first = attestation(&v1, "req-safety");
    relay.seed(first.clone()).await;
    let outcome = oracle.process_attestation(&first).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::BelowThreshold {
            unique: 1,
            required: 2
        }
    );
    assert!(credentials_of(&relay).await.is_empty());

    // second attestation: threshold reached, attesters sorted
    let second = attestation(&v2, "req-safety");
    relay.seed(second.clone()).await;
    let outcome = oracle.process_attestation(&second).await.unwrap();
    assert!(matches!(outcome, Outcome::Issued { .. }));

    let credentials = credentials_of(&relay).await;
    assert_eq!(credentials.len(), 1);
    let mut expected = vec![v1.public_key(), v2.public_key()];
    expected.sort();
    assert_eq!(credentials[0].attestors, expected);
    assert_eq!(credentials[0].attestation_count, 2);

    // third attestation: idempotent, still exactly one credential
    let third = attestation(&v3, "req-safety");
    relay.seed(third.clone()).await;
    let outcome = oracle.process_attestation(&third).await.unwrap();
    assert_eq!(outcome, Outcome::AlreadyIssued);
    assert_eq!(credentials_of(&relay).await.len(), 1);

    relay.shutdown();
}

#[tokio::test]
async fn processing_the_same_attestation_twice_is_idempotent() {
    let relay = MockRelay::run().await.unwrap();
    let oracle_keys = Keys::generate();
    let requester = Keys::generate();
    let attestor = Keys::generate();

    relay
        .seed(permit_request(&requester, Some("req-1"), "PERMIT_MARAICHAGE_X1"))
        .await;
    let att = attestation(&attestor, "req-1");
    relay.seed(att.clone()).await;

    let oracle = oracle_for(&relay, &oracle_keys);

    assert!(matches!(
        oracle.process_attestation(&att).await.unwrap(),
        Outcome::Issued { .. }
    ));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        oracle.process_attestation(&att).await.unwrap(),
        Outcome::AlreadyIssued
    );

    let credentials = credentials_of(&relay).await;
    assert_eq!(credentials.len(), 1);

    relay.shutdown();
}

#[tokio::test]
async fn self_attestation_is_rejected() {
    let relay = MockRelay::run().await.unwrap();
    let oracle_keys = Keys::generate();
    let requester = Keys::generate();

    relay
        .seed(permit_request(&requester, Some("req-1"), "PERMIT_MARAICHAGE_X1"))
        .await;
    let att = attestation(&requester, "req-1");
    relay.seed(att.clone()).await;

    let oracle = oracle_for(&relay, &oracle_keys);
    assert_eq!(
        oracle.process_attestation(&att).await.unwrap(),
        Outcome::Rejected(RejectReason::SelfAttestation)
    );
    assert!(credentials_of(&relay).await.is_empty());

    relay.shutdown();
}

#[tokio::test]
async fn level_two_requires_the_parent_credential() {
    let relay = MockRelay::run().await.unwrap();
    let oracle_keys = Keys::generate();
    let requester = Keys::generate();
    let attestor = Keys::generate();

    relay
        .seed(permit_request(&requester, Some("req-x2"), "PERMIT_MARAICHAGE_X2"))
        .await;
    let att = attestation(&attestor, "req-x2");
    relay.seed(att.clone()).await;

    let oracle = oracle_for(&relay, &oracle_keys);

    // no parent credential yet: the attester is not qualified
    assert_eq!(
        oracle.process_attestation(&att).await.unwrap(),
        Outcome::Rejected(RejectReason::UnqualifiedAttestor)
    );

    // the oracle certifies the attester at level 1
    let generator = CredentialGenerator::new(oracle_keys.clone());
    let parent = generator
        .generate(
            &attestor.public_key(),
            "PERMIT_MARAICHAGE_X1",
            "req-parent",
            &[requester.public_key()],
            &[],
            None,
        )
        .unwrap();
    relay.seed(parent.event).await;

    // now the same attestation goes through
    assert!(matches!(
        oracle.process_attestation(&att).await.unwrap(),
        Outcome::Issued { .. }
    ));

    let credentials = credentials_of(&relay).await;
    assert!(credentials
        .iter()
        .any(|c| c.permit_id == "PERMIT_MARAICHAGE_X2"));

    relay.shutdown();
}

#[tokio::test]
async fn missing_or_unresolvable_requests_are_dropped() {
    let relay = MockRelay::run().await.unwrap();
    let oracle_keys = Keys::generate();
    let attestor = Keys::generate();

    let oracle = oracle_for(&relay, &oracle_keys);

    // no request reference at all
    let no_ref = EventBuilder::new(Kind::PermitAttestation, "", vec![])
        .sign(&attestor)
        .unwrap();
    assert_eq!(
        oracle.process_attestation(&no_ref).await.unwrap(),
        Outcome::Rejected(RejectReason::MissingRequestRef)
    );

    // reference to a request that does not exist
    let dangling = attestation(&attestor, "req-ghost");
    assert_eq!(
        oracle.process_attestation(&dangling).await.unwrap(),
        Outcome::Rejected(RejectReason::RequestNotFound)
    );

    // not an attestation at all
    let wrong_kind = EventBuilder::new(Kind::Bond, "", vec![Tag::identifier("b")])
        .sign(&attestor)
        .unwrap();
    assert_eq!(
        oracle.process_attestation(&wrong_kind).await.unwrap(),
        Outcome::Rejected(RejectReason::NotAnAttestation)
    );

    relay.shutdown();
}

#[tokio::test]
async fn invalid_permit_ids_are_rejected() {
    let relay = MockRelay::run().await.unwrap();
    let oracle_keys = Keys::generate();
    let requester = Keys::generate();
    let attestor = Keys::generate();

    relay
        .seed(permit_request(&requester, Some("req-bad"), "NOT_A_PERMIT"))
        .await;
    let att = attestation(&attestor, "req-bad");
    relay.seed(att.clone()).await;

    let oracle = oracle_for(&relay, &oracle_keys);
    assert_eq!(
        oracle.process_attestation(&att).await.unwrap(),
        Outcome::Rejected(RejectReason::InvalidPermitId(String::from("NOT_A_PERMIT")))
    );

    relay.shutdown();
}

#[tokio::test]
async fn requests_resolve_by_event_id_too() {
    let relay = MockRelay::run().await.unwrap();
    let oracle_keys = Keys::generate();
    let requester = Keys::generate();
    let attestor = Keys::generate();

    // request without a d tag, addressable only by event id
    let request = permit_request(&requester, None, "PERMIT_MARAICHAGE_X1");
    let request_id = request.id.to_hex();
    relay.seed(request).await;

    let att = attestation(&attestor, &request_id);
    relay.seed(att.clone()).await;

    let oracle = oracle_for(&relay, &oracle_keys);
    assert!(matches!(
        oracle.process_attestation(&att).await.unwrap(),
        Outcome::Issued { .. }
    ));

    let credentials = credentials_of(&relay).await;
    assert_eq!(credentials.len(), 1);
    assert_eq!(credentials[0].request_id.as_deref(), Some(request_id.as_str()));

    relay.shutdown();
}

#[tokio::test]
async fn badges_can_be_disabled() {
    let relay = MockRelay::run().await.unwrap();
    let oracle_keys = Keys::generate();
    let requester = Keys::generate();
    let attestor = Keys::generate();

    relay
        .seed(permit_request(&requester, Some("req-1"), "PERMIT_MARAICHAGE_X1"))
        .await;
    let att = attestation(&attestor, "req-1");
    relay.seed(att.clone()).await;

    let oracle = oracle_for(&relay, &oracle_keys).with_opts(OracleOptions {
        publish_badges: false,
    });
    assert!(matches!(
        oracle.process_attestation(&att).await.unwrap(),
        Outcome::Issued { .. }
    ));

    tokio::time::sleep(Duration::from_millis(100)).await;
    let stored = relay.events().await;
    assert!(stored.iter().any(|e| e.kind == Kind::PermitCredential));
    assert!(!stored.iter().any(|e| e.kind == Kind::BadgeDefinition));
    assert!(!stored.iter().any(|e| e.kind == Kind::BadgeAward));

    relay.shutdown();
}
