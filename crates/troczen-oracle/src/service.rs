// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Oracle service
//!
//! Stateless attestation pipeline. For every incoming kind-30502 event:
//! check idempotence, resolve the request, verify the attester, count
//! unique attesters, and issue the credential once the threshold is met.
//! The relay is the only state.

use core::fmt;
use std::collections::BTreeSet;

use serde::Serialize;
use troczen::event::{Event, EventId, Kind};
use troczen::filter::Filter;
use troczen::key::{Keys, PublicKey};
use troczen::market::market_tag;
use troczen::permit;
use troczen::records::{Attestation, Credential, PermitDefinition, PermitRequest};
use troczen_relay::{RelayClient, RelayConnection};

use crate::credential::{CredentialGenerator, IssuedCredential};
use crate::error::OracleError;

/// Why an attestation was discarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Not a kind-30502 event
    NotAnAttestation,
    /// Neither an `e` nor an `a` tag referencing a request
    MissingRequestRef,
    /// The referenced kind-30501 request does not exist
    RequestNotFound,
    /// The requested permit id does not match the grammar
    InvalidPermitId(String),
    /// The attester is the requester
    SelfAttestation,
    /// The attester lacks the parent-level credential
    UnqualifiedAttestor,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnAttestation => write!(f, "not a kind-30502 event"),
            Self::MissingRequestRef => write!(f, "attestation without a request reference"),
            Self::RequestNotFound => write!(f, "request not found"),
            Self::InvalidPermitId(id) => write!(f, "invalid permit id: {id}"),
            Self::SelfAttestation => write!(f, "self-attestation is forbidden"),
            Self::UnqualifiedAttestor => {
                write!(f, "attester lacks the parent-level credential")
            }
        }
    }
}

/// Result of processing one attestation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A credential was issued and published
    Issued {
        /// The credential's `d` tag
        credential_id: String,
    },
    /// A credential already exists for this request
    AlreadyIssued,
    /// Not enough unique attesters yet
    BelowThreshold {
        /// Unique attesters so far
        unique: usize,
        /// Required attesters
        required: usize,
    },
    /// The attestation was discarded
    Rejected(RejectReason),
}

/// Oracle behavior switches
#[derive(Debug, Clone, Copy)]
pub struct OracleOptions {
    /// Publish the NIP-58 badge pair alongside each credential
    pub publish_badges: bool,
}

impl Default for OracleOptions {
    fn default() -> Self {
        Self {
            publish_badges: true,
        }
    }
}

/// Aggregate oracle counters
#[derive(Debug, Clone, Serialize)]
pub struct OracleStats {
    /// Permit definitions on the relay
    pub permits_count: usize,
    /// Permit requests on the relay
    pub requests_count: usize,
    /// Attestations on the relay
    pub attestations_count: usize,
    /// Credentials issued by this oracle
    pub credentials_count: usize,
    /// This oracle's public key
    pub oracle_pubkey: PublicKey,
}

/// The attestation-processing service
#[derive(Debug, Clone)]
pub struct OracleService {
    relay: RelayClient,
    keys: Keys,
    generator: CredentialGenerator,
    opts: OracleOptions,
}

impl OracleService {
    /// New oracle signing with the given keys
    pub fn new(relay: RelayClient, keys: Keys) -> Self {
        Self {
            generator: CredentialGenerator::new(keys.clone()),
            relay,
            keys,
            opts: OracleOptions::default(),
        }
    }

    /// Override the behavior switches
    pub fn with_opts(mut self, opts: OracleOptions) -> Self {
        self.opts = opts;
        self
    }

    /// The oracle's public key
    #[inline]
    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    /// Process one incoming attestation event.
    ///
    /// Opens its own short-lived connection for queries and publication;
    /// it never shares the daemon's subscription socket.
    pub async fn process_attestation(&self, event: &Event) -> Result<Outcome, OracleError> {
        let attestation: Attestation = match Attestation::from_event(event) {
            Some(attestation) => attestation,
            None => return Ok(Outcome::Rejected(RejectReason::NotAnAttestation)),
        };

        let request_id: String = match attestation.request_ref {
            Some(request_id) => request_id,
            None => {
                tracing::warn!(id = %event.id, "Attestation without a request reference");
                return Ok(Outcome::Rejected(RejectReason::MissingRequestRef));
            }
        };

        tracing::info!(
            attestor = %attestation.attestor,
            request = %request_id,
            "Processing attestation"
        );

        let mut conn: RelayConnection = self.relay.connect().await?;
        let outcome =
            self.process_inner(&mut conn, &request_id, &attestation.attestor).await;
        conn.disconnect().await;

        if let Ok(outcome) = &outcome {
            match outcome {
                Outcome::Issued { credential_id } => {
                    tracing::info!(request = %request_id, credential = %credential_id, "Credential issued")
                }
                Outcome::AlreadyIssued => {
                    tracing::info!(request = %request_id, "Credential already issued, no-op")
                }
                Outcome::BelowThreshold { unique, required } => {
                    tracing::debug!(request = %request_id, "Threshold not reached ({unique}/{required})")
                }
                Outcome::Rejected(reason) => {
                    tracing::info!(request = %request_id, "Attestation discarded: {reason}")
                }
            }
        }

        outcome
    }

    async fn process_inner(
        &self,
        conn: &mut RelayConnection,
        request_id: &str,
        attestor: &PublicKey,
    ) -> Result<Outcome, OracleError> {
        // idempotence: one credential per (issuer, request)
        if self.existing_credential(conn, request_id).await?.is_some() {
            return Ok(Outcome::AlreadyIssued);
        }

        let request: PermitRequest = match self.resolve_request(conn, request_id).await? {
            Some(request) => request,
            None => return Ok(Outcome::Rejected(RejectReason::RequestNotFound)),
        };

        if !permit::is_valid_id(&request.permit_id) {
            return Ok(Outcome::Rejected(RejectReason::InvalidPermitId(
                request.permit_id,
            )));
        }

        if attestor == &request.requester {
            return Ok(Outcome::Rejected(RejectReason::SelfAttestation));
        }

        if !self
            .attestor_qualified(conn, attestor, &request.permit_id)
            .await?
        {
            return Ok(Outcome::Rejected(RejectReason::UnqualifiedAttestor));
        }

        let attestors: BTreeSet<PublicKey> =
            self.unique_attestors(conn, request_id, attestor).await?;

        let definition: Option<PermitDefinition> =
            self.permit_definition(conn, &request.permit_id).await?;
        let required: usize = permit::required_attestations(
            &request.permit_id,
            definition.as_ref().and_then(|d| d.required_attestations),
        );

        if attestors.len() < required {
            return Ok(Outcome::BelowThreshold {
                unique: attestors.len(),
                required,
            });
        }

        // BTreeSet iteration keeps the attester list sorted
        let attestors: Vec<PublicKey> = attestors.into_iter().collect();
        let skills: Vec<String> = definition.map(|d| d.skills).unwrap_or_default();

        // the credential is keyed on the same request reference the
        // idempotence and threshold queries use
        let issued: IssuedCredential = self.generator.generate(
            &request.requester,
            &request.permit_id,
            request_id,
            &attestors,
            &skills,
            None,
        )?;

        conn.publish(&issued.event).await?;

        if self.opts.publish_badges {
            self.publish_badges(conn, &request, &issued.event.id).await;
        }

        Ok(Outcome::Issued {
            credential_id: issued.credential_id,
        })
    }

    /// Badges are a decoration: a failure here never loses the credential
    async fn publish_badges(
        &self,
        conn: &mut RelayConnection,
        request: &PermitRequest,
        credential_event_id: &EventId,
    ) {
        let definition = match self.generator.badge_definition(&request.permit_id, None) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!("Badge definition signing failed: {e}");
                return;
            }
        };

        let award = match self.generator.badge_award(
            &request.requester,
            &request.permit_id,
            credential_event_id,
        ) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!("Badge award signing failed: {e}");
                return;
            }
        };

        if let Err(e) = conn.publish(&definition).await {
            tracing::warn!("Badge definition publication failed: {e}");
            return;
        }

        if let Err(e) = conn.publish(&award).await {
            tracing::warn!("Badge award publication failed: {e}");
        }
    }

    /// Credential already issued by this oracle for the request, if any
    async fn existing_credential(
        &self,
        conn: &mut RelayConnection,
        request_id: &str,
    ) -> Result<Option<Event>, OracleError> {
        let event = conn
            .query_first(
                Filter::new()
                    .kind(Kind::PermitCredential)
                    .author(self.keys.public_key())
                    .custom_tag("e", request_id),
            )
            .await?;
        Ok(event)
    }

    /// Resolve a kind-30501 request, by event id first, then by `d` tag
    async fn resolve_request(
        &self,
        conn: &mut RelayConnection,
        request_id: &str,
    ) -> Result<Option<PermitRequest>, OracleError> {
        if let Ok(id) = EventId::from_hex(request_id) {
            let event = conn.query_first(Filter::new().id(id)).await?;
            if let Some(request) = event.as_ref().and_then(PermitRequest::from_event) {
                return Ok(Some(request));
            }
        }

        let event = conn
            .query_first(
                Filter::new()
                    .kind(Kind::PermitRequest)
                    .identifier(request_id),
            )
            .await?;
        Ok(event.as_ref().and_then(PermitRequest::from_event))
    }

    /// Level 1 permits bootstrap the web of trust: anyone may attest.
    /// Above that, the attester must hold the parent-level credential.
    async fn attestor_qualified(
        &self,
        conn: &mut RelayConnection,
        attestor: &PublicKey,
        permit_id: &str,
    ) -> Result<bool, OracleError> {
        let parent: String = match permit::parent_id(permit_id) {
            Some(parent) => parent,
            None => return Ok(true),
        };

        let events = conn
            .query(vec![Filter::new()
                .kind(Kind::PermitCredential)
                .author(self.keys.public_key())
                .pubkey(*attestor)
                .custom_tag("permit_id", parent)])
            .await?;

        Ok(!events.is_empty())
    }

    /// Unique attesters of a request, the incoming one included
    async fn unique_attestors(
        &self,
        conn: &mut RelayConnection,
        request_id: &str,
        new_attestor: &PublicKey,
    ) -> Result<BTreeSet<PublicKey>, OracleError> {
        let events = conn
            .query(vec![Filter::new()
                .kind(Kind::PermitAttestation)
                .custom_tag("e", request_id)])
            .await?;

        let mut attestors: BTreeSet<PublicKey> =
            events.iter().map(|e| e.pubkey).collect();
        attestors.insert(*new_attestor);

        Ok(attestors)
    }

    /// Permit definition (kind 30500) for an id, if one was published
    async fn permit_definition(
        &self,
        conn: &mut RelayConnection,
        permit_id: &str,
    ) -> Result<Option<PermitDefinition>, OracleError> {
        let event = conn
            .query_first(
                Filter::new()
                    .kind(Kind::PermitDefinition)
                    .identifier(permit_id)
                    .limit(1),
            )
            .await?;
        Ok(event.as_ref().and_then(PermitDefinition::from_event))
    }

    // ---- read APIs consumed by the HTTP host ----

    /// Every permit definition, optionally restricted to a market
    pub async fn permit_definitions(
        &self,
        market: Option<&str>,
    ) -> Result<Vec<PermitDefinition>, OracleError> {
        let mut filter: Filter = Filter::new().kind(Kind::PermitDefinition);
        if let Some(market) = market {
            filter = filter.custom_tag("market", market_tag(market));
        }

        let mut conn: RelayConnection = self.relay.connect().await?;
        let result = conn.query(vec![filter]).await;
        conn.disconnect().await;

        let events = result?;
        Ok(events
            .iter()
            .filter_map(PermitDefinition::from_event)
            .collect())
    }

    /// Credentials this oracle issued to a holder
    pub async fn credentials_for(
        &self,
        holder: &PublicKey,
    ) -> Result<Vec<Credential>, OracleError> {
        let mut conn: RelayConnection = self.relay.connect().await?;
        let result = conn
            .query(vec![Filter::new()
                .kind(Kind::PermitCredential)
                .author(self.keys.public_key())
                .pubkey(*holder)])
            .await;
        conn.disconnect().await;

        let events = result?;
        Ok(events.iter().filter_map(Credential::from_event).collect())
    }

    /// Aggregate counters over the relay
    pub async fn stats(&self) -> Result<OracleStats, OracleError> {
        let mut conn: RelayConnection = self.relay.connect().await?;

        let counts = async {
            let permits = conn
                .query(vec![Filter::new().kind(Kind::PermitDefinition)])
                .await?
                .len();
            let requests = conn
                .query(vec![Filter::new().kind(Kind::PermitRequest)])
                .await?
                .len();
            let attestations = conn
                .query(vec![Filter::new().kind(Kind::PermitAttestation)])
                .await?
                .len();
            let credentials = conn
                .query(vec![Filter::new()
                    .kind(Kind::PermitCredential)
                    .author(self.keys.public_key())])
                .await?
                .len();

            Ok::<_, OracleError>((permits, requests, attestations, credentials))
        }
        .await;

        conn.disconnect().await;

        let (permits_count, requests_count, attestations_count, credentials_count) = counts?;

        Ok(OracleStats {
            permits_count,
            requests_count,
            attestations_count,
            credentials_count,
            oracle_pubkey: self.keys.public_key(),
        })
    }
}
