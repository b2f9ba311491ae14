// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! TrocZen oracle daemon.
//!
//! Holds one long-lived subscription to attestations (kind 30502) and
//! dispatches each to the oracle service. No local state: the relay is
//! the source of truth.
//!
//! Exit codes: 0 normal shutdown, 1 configuration error, 2 relay
//! unreachable after the retry budget.

use std::process::ExitCode;
use std::time::Duration;

use tokio::signal;
use tokio::time;
use troczen::event::Kind;
use troczen::filter::Filter;
use troczen::message::{RelayMessage, SubscriptionId};
use troczen_oracle::OracleService;
use troczen_relay::{RelayClient, RelayConnection};

mod config;
mod logging;

use self::config::Config;

/// Reconnection budget
const MAX_RETRIES: u32 = 10;
/// Backoff step: delay is `5 * tries` seconds
const RETRY_DELAY_SECS: u64 = 5;

fn main() -> ExitCode {
    let config: Config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(1);
        }
    };

    let _guard = logging::init(&config);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start the runtime: {e}");
            return ExitCode::from(1);
        }
    };

    runtime.block_on(run(config))
}

async fn run(config: Config) -> ExitCode {
    tracing::info!("TrocZen ORACLE daemon starting");
    tracing::info!(relay = %config.relay_url, oracle = %config.keys.public_key(), "Stateless mode, the relay is the source of truth");

    let relay: RelayClient = RelayClient::with_opts(config.relay_url.as_str(), config.relay_opts);
    let oracle: OracleService = OracleService::new(relay.clone(), config.keys.clone());

    let mut tries: u32 = 0;

    loop {
        match open_subscription(&relay).await {
            Ok((mut conn, sub_id)) => {
                tries = 0;
                tracing::info!("Listening for attestations (kind 30502)");

                match listen(&oracle, &mut conn, &sub_id).await {
                    Exit::Shutdown => {
                        let _ = conn.close_subscription(sub_id).await;
                        conn.disconnect().await;
                        tracing::info!("Shutdown complete");
                        return ExitCode::SUCCESS;
                    }
                    Exit::Disconnected => {
                        conn.disconnect().await;
                    }
                }
            }
            Err(e) => {
                tracing::error!(relay = %config.relay_url, "Relay unreachable: {e}");
            }
        }

        tries += 1;
        if tries >= MAX_RETRIES {
            tracing::error!("Giving up after {MAX_RETRIES} attempts");
            return ExitCode::from(2);
        }

        let delay: Duration = Duration::from_secs(RETRY_DELAY_SECS * u64::from(tries));
        tracing::warn!(
            "Reconnecting in {}s (attempt {tries}/{MAX_RETRIES})",
            delay.as_secs()
        );

        tokio::select! {
            _ = time::sleep(delay) => {}
            _ = signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                return ExitCode::SUCCESS;
            }
        }
    }
}

/// Connect and subscribe to future attestations only (`limit: 0`)
async fn open_subscription(
    relay: &RelayClient,
) -> Result<(RelayConnection, SubscriptionId), troczen_relay::Error> {
    let mut conn: RelayConnection = relay.connect().await?;
    let sub_id: SubscriptionId = conn
        .subscribe(vec![Filter::new().kind(Kind::PermitAttestation).limit(0)])
        .await?;
    Ok((conn, sub_id))
}

enum Exit {
    Shutdown,
    Disconnected,
}

/// Drain frames until the socket dies or SIGINT arrives
async fn listen(oracle: &OracleService, conn: &mut RelayConnection, sub_id: &SubscriptionId) -> Exit {
    loop {
        tokio::select! {
            msg = conn.next_message() => match msg {
                Ok(RelayMessage::Event { subscription_id, event }) if &subscription_id == sub_id => {
                    if event.kind != Kind::PermitAttestation {
                        continue;
                    }

                    tracing::info!(attestor = %event.pubkey, "Attestation received");
                    match oracle.process_attestation(&event).await {
                        Ok(outcome) => tracing::debug!("Attestation handled: {outcome:?}"),
                        // the daemon outlives every processing error
                        Err(e) => tracing::error!("Attestation processing failed: {e}"),
                    }
                }
                Ok(RelayMessage::Event { .. }) => {}
                Ok(RelayMessage::EndOfStoredEvents(id)) => {
                    tracing::debug!(%id, "End of stored events");
                }
                Ok(RelayMessage::Ok { event_id, status, message }) => {
                    if status {
                        tracing::debug!(%event_id, "Event accepted by relay");
                    } else {
                        tracing::warn!(%event_id, "Event rejected by relay: {message}");
                    }
                }
                Ok(RelayMessage::Notice { message }) => {
                    tracing::warn!("Relay notice: {message}");
                }
                Ok(RelayMessage::Auth { .. }) => {
                    tracing::debug!("Auth challenge received");
                }
                Ok(RelayMessage::Closed { subscription_id, message }) if &subscription_id == sub_id => {
                    tracing::warn!("Subscription closed by relay: {message}");
                    return Exit::Disconnected;
                }
                Ok(RelayMessage::Closed { .. }) => {}
                Err(e) => {
                    tracing::warn!("Connection lost: {e}");
                    return Exit::Disconnected;
                }
            },
            _ = signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                return Exit::Shutdown;
            }
        }
    }
}
