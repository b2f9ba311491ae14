// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! A mock relay for (unit) tests.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::WebSocketStream;
use troczen::event::Event;
use troczen::filter::Filter;
use troczen::message::{ClientMessage, RelayMessage, SubscriptionId};

type WsTx = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Mock relay error
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error(transparent)]
    Io(#[from] io::Error),
    /// WebSocket error
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Mock relay options
#[derive(Debug, Clone, Copy, Default)]
pub struct MockRelayOptions {
    /// Abort the connection after serving this many EVENT frames of a
    /// REQ, without EOSE. Exercises the best-effort query contract.
    pub drop_after_events: Option<usize>,
}

/// A mock relay for (unit) tests.
///
/// Stores events with replaceable (kinds 0, 3) and addressable (kinds
/// 3xxxx, keyed on the `d` tag) semantics, serves REQ from the store in
/// descending `created_at` order and broadcasts live matches to open
/// subscriptions.
#[derive(Debug, Clone)]
pub struct MockRelay {
    addr: SocketAddr,
    store: Arc<RwLock<Vec<Event>>>,
    shutdown: broadcast::Sender<()>,
    new_event: broadcast::Sender<Event>,
    opts: MockRelayOptions,
}

impl MockRelay {
    /// Run a mock relay on an ephemeral local port
    pub async fn run() -> Result<Self, Error> {
        Self::run_with_opts(MockRelayOptions::default()).await
    }

    /// Run a mock relay with custom options
    pub async fn run_with_opts(opts: MockRelayOptions) -> Result<Self, Error> {
        let listener: TcpListener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
        let (new_event, ..) = broadcast::channel(1024);

        let relay: Self = Self {
            addr,
            store: Arc::new(RwLock::new(Vec::new())),
            shutdown: shutdown_tx,
            new_event,
            opts,
        };

        let r: Self = relay.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    output = listener.accept() => {
                        match output {
                            Ok((stream, addr)) => {
                                let r1: Self = r.clone();
                                tokio::spawn(async move {
                                    if let Err(e) = r1.handle_connection(stream, addr).await {
                                        tracing::debug!("Mock relay session ended: {e}");
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::error!("Can't accept incoming connection: {e}");
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Ok(relay)
    }

    /// Get the `ws://` url
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Shutdown the relay
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Insert an event directly into the store, bypassing the wire.
    ///
    /// Live subscriptions are notified as if it had been published.
    pub async fn seed(&self, event: Event) {
        let mut store = self.store.write().await;
        if insert_event(&mut store, event.clone()) {
            let _ = self.new_event.send(event);
        }
    }

    /// Snapshot of the stored events
    pub async fn events(&self) -> Vec<Event> {
        self.store.read().await.clone()
    }

    async fn handle_connection(&self, raw_stream: TcpStream, addr: SocketAddr) -> Result<(), Error> {
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut new_event = self.new_event.subscribe();

        let ws_stream = tokio_tungstenite::accept_async(raw_stream).await?;
        tracing::debug!("Mock relay connection established: {addr}");

        let (mut tx, mut rx) = ws_stream.split();

        let mut subscriptions: HashMap<SubscriptionId, Vec<Filter>> = HashMap::new();

        loop {
            tokio::select! {
                msg = rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(json))) => {
                            let msg = match ClientMessage::from_json(&json) {
                                Ok(msg) => msg,
                                Err(e) => {
                                    send_msg(&mut tx, RelayMessage::notice(format!("invalid: {e}"))).await?;
                                    continue;
                                }
                            };

                            if !self.handle_client_msg(&mut subscriptions, &mut tx, msg).await? {
                                break;
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = tx.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::debug!("Mock relay read error: {e}");
                            break;
                        }
                    }
                }
                event = new_event.recv() => {
                    if let Ok(event) = event {
                        for (id, filters) in subscriptions.iter() {
                            if filters.iter().any(|f| f.match_event(&event)) {
                                send_msg(&mut tx, RelayMessage::event(id.clone(), event.clone())).await?;
                            }
                        }
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }

        tracing::debug!("Mock relay connection terminated for {addr}");

        Ok(())
    }

    /// Returns `false` when the connection must be aborted.
    async fn handle_client_msg(
        &self,
        subscriptions: &mut HashMap<SubscriptionId, Vec<Filter>>,
        tx: &mut WsTx,
        msg: ClientMessage,
    ) -> Result<bool, Error> {
        match msg {
            ClientMessage::Event(event) => {
                if !event.verify_id() {
                    send_msg(tx, RelayMessage::ok(event.id, false, "invalid: event id")).await?;
                    return Ok(true);
                }

                if !event.verify_signature() {
                    send_msg(tx, RelayMessage::ok(event.id, false, "invalid: event signature"))
                        .await?;
                    return Ok(true);
                }

                let event_id = event.id;
                let accepted: bool = {
                    let mut store = self.store.write().await;
                    insert_event(&mut store, *event.clone())
                };

                if accepted {
                    let _ = self.new_event.send(*event);
                    send_msg(tx, RelayMessage::ok(event_id, true, "")).await?;
                } else {
                    send_msg(
                        tx,
                        RelayMessage::ok(event_id, true, "duplicate: already have this event"),
                    )
                    .await?;
                }

                Ok(true)
            }
            ClientMessage::Req {
                subscription_id,
                filters,
            } => {
                subscriptions.insert(subscription_id.clone(), filters.clone());

                let events: Vec<Event> = {
                    let store = self.store.read().await;
                    query_store(&store, &filters)
                };

                tracing::debug!(
                    "Mock relay: {} events for subscription '{subscription_id}'",
                    events.len()
                );

                if let Some(drop_after) = self.opts.drop_after_events {
                    if events.len() > drop_after {
                        for event in events.into_iter().take(drop_after) {
                            send_msg(tx, RelayMessage::event(subscription_id.clone(), event))
                                .await?;
                        }
                        // abort without EOSE
                        return Ok(false);
                    }
                }

                for event in events.into_iter() {
                    send_msg(tx, RelayMessage::event(subscription_id.clone(), event)).await?;
                }
                send_msg(tx, RelayMessage::eose(subscription_id)).await?;

                Ok(true)
            }
            ClientMessage::Close(subscription_id) => {
                subscriptions.remove(&subscription_id);
                Ok(true)
            }
        }
    }
}

/// Insert honoring replaceable/addressable semantics.
///
/// Returns `false` when the event is a duplicate or older than the stored
/// replacement target.
fn insert_event(store: &mut Vec<Event>, event: Event) -> bool {
    if event.kind.is_replaceable() {
        if let Some(pos) = store
            .iter()
            .position(|e| e.pubkey == event.pubkey && e.kind == event.kind)
        {
            if store[pos].created_at > event.created_at {
                return false;
            }
            store.remove(pos);
        }
    } else if event.kind.is_addressable() {
        let d: &str = event.identifier().unwrap_or_default();
        if let Some(pos) = store.iter().position(|e| {
            e.pubkey == event.pubkey
                && e.kind == event.kind
                && e.identifier().unwrap_or_default() == d
        }) {
            if store[pos].created_at > event.created_at {
                return false;
            }
            store.remove(pos);
        }
    } else if store.iter().any(|e| e.id == event.id) {
        return false;
    }

    store.push(event);
    true
}

/// Serve filters from the store: per filter, matches in descending
/// `created_at` order truncated to its limit; union deduplicated by id.
fn query_store(store: &[Event], filters: &[Filter]) -> Vec<Event> {
    let mut results: Vec<Event> = Vec::new();

    for filter in filters.iter() {
        let mut matches: Vec<Event> = store
            .iter()
            .filter(|e| filter.match_event(e))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if let Some(limit) = filter.limit {
            matches.truncate(limit);
        }

        for event in matches.into_iter() {
            if !results.iter().any(|e| e.id == event.id) {
                results.push(event);
            }
        }
    }

    results
}

async fn send_msg(tx: &mut WsTx, msg: RelayMessage) -> Result<(), Error> {
    tx.send(Message::Text(msg.as_json())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use troczen::event::{EventBuilder, Kind, Tag};
    use troczen::key::Keys;
    use troczen::types::Timestamp;

    fn addressable(keys: &Keys, d: &str, created_at: u64) -> Event {
        EventBuilder::new(Kind::Bond, "", vec![Tag::identifier(d)])
            .custom_created_at(Timestamp::from_secs(created_at))
            .sign(keys)
            .unwrap()
    }

    #[test]
    fn test_addressable_replacement_keeps_newest() {
        let keys = Keys::generate();
        let mut store: Vec<Event> = Vec::new();

        assert!(insert_event(&mut store, addressable(&keys, "bon-1", 100)));
        assert!(insert_event(&mut store, addressable(&keys, "bon-1", 200)));
        assert_eq!(store.len(), 1);
        assert_eq!(store[0].created_at, Timestamp::from_secs(200));

        // older publication is refused
        assert!(!insert_event(&mut store, addressable(&keys, "bon-1", 150)));
        assert_eq!(store[0].created_at, Timestamp::from_secs(200));

        // different identifier coexists
        assert!(insert_event(&mut store, addressable(&keys, "bon-2", 100)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_query_store_orders_and_limits() {
        let keys = Keys::generate();
        let mut store: Vec<Event> = Vec::new();
        for (d, ts) in [("a", 10), ("b", 30), ("c", 20)] {
            insert_event(&mut store, addressable(&keys, d, ts));
        }

        let results = query_store(&store, &[Filter::new().kind(Kind::Bond).limit(2)]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].created_at, Timestamp::from_secs(30));
        assert_eq!(results[1].created_at, Timestamp::from_secs(20));

        // limit 0 serves nothing from the store
        let results = query_store(&store, &[Filter::new().kind(Kind::Bond).limit(0)]);
        assert!(results.is_empty());
    }
}
