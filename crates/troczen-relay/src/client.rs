// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Relay client

use std::cmp;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use troczen::event::{Event, Kind};
use troczen::filter::Filter;
use troczen::message::{ClientMessage, RelayMessage, SubscriptionId};
use troczen::types::Timestamp;

use crate::error::{Error, QueryFailure};
use crate::options::RelayOptions;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handle to one relay.
///
/// Cheap to clone; every [`RelayClient::connect`] opens a fresh socket.
/// Engines open and close their own short-lived connections per request
/// and never share the daemon's subscription socket.
#[derive(Debug, Clone)]
pub struct RelayClient {
    url: String,
    opts: RelayOptions,
}

impl RelayClient {
    /// New client for the given `ws://` or `wss://` URL
    pub fn new<S>(url: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            url: url.into(),
            opts: RelayOptions::default(),
        }
    }

    /// New client with custom options
    pub fn with_opts<S>(url: S, opts: RelayOptions) -> Self
    where
        S: Into<String>,
    {
        Self {
            url: url.into(),
            opts,
        }
    }

    /// Relay URL
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Options
    #[inline]
    pub fn opts(&self) -> &RelayOptions {
        &self.opts
    }

    /// Open a connection to the relay
    pub async fn connect(&self) -> Result<RelayConnection, Error> {
        tracing::debug!(url = %self.url, "Connecting to relay");

        let (stream, _) = time::timeout(self.opts.connection_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| Error::Timeout)??;

        tracing::debug!(url = %self.url, "Connected to relay");

        Ok(RelayConnection {
            stream,
            opts: self.opts,
        })
    }
}

/// One open socket to the relay
#[derive(Debug)]
pub struct RelayConnection {
    stream: WsStream,
    opts: RelayOptions,
}

impl RelayConnection {
    /// Open a subscription, collect every matching stored event and close
    /// the subscription again.
    ///
    /// Stops at `EOSE` or `CLOSED`. Frames for other subscriptions,
    /// `NOTICE`, `AUTH` and `OK` are observed and ignored. Best-effort on
    /// failure: the error carries everything received up to that point.
    pub async fn query(&mut self, filters: Vec<Filter>) -> Result<Vec<Event>, QueryFailure> {
        let subscription_id = SubscriptionId::generate();
        self.send_msg(ClientMessage::req(subscription_id.clone(), filters))
            .await
            .map_err(QueryFailure::from)?;

        let mut events: Vec<Event> = Vec::new();
        let deadline = time::Instant::now() + self.opts.query_timeout;

        loop {
            let frame = match time::timeout_at(deadline, self.stream.next()).await {
                Err(_) => {
                    // close the subscription before surfacing the timeout
                    let _ = self.send_msg(ClientMessage::close(subscription_id)).await;
                    return Err(QueryFailure::new(events, Error::Timeout));
                }
                Ok(None) => return Err(QueryFailure::new(events, Error::ConnectionClosed)),
                Ok(Some(Err(e))) => return Err(QueryFailure::new(events, e.into())),
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                WsMessage::Text(json) => match RelayMessage::from_json(&json) {
                    Ok(RelayMessage::Event {
                        subscription_id: id,
                        event,
                    }) if id == subscription_id => events.push(*event),
                    Ok(RelayMessage::EndOfStoredEvents(id)) if id == subscription_id => break,
                    Ok(RelayMessage::Closed {
                        subscription_id: id,
                        message,
                    }) if id == subscription_id => {
                        tracing::debug!(%id, "Subscription closed by relay: {message}");
                        return Ok(events);
                    }
                    Ok(RelayMessage::Notice { message }) => {
                        tracing::warn!("Relay notice: {message}")
                    }
                    Ok(RelayMessage::Auth { .. }) => {
                        tracing::debug!("Ignoring AUTH challenge during query")
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Skipping malformed relay frame: {e}"),
                },
                WsMessage::Ping(payload) => {
                    let _ = self.stream.send(WsMessage::Pong(payload)).await;
                }
                WsMessage::Close(_) => {
                    return Err(QueryFailure::new(events, Error::ConnectionClosed))
                }
                _ => {}
            }
        }

        if let Err(e) = self.send_msg(ClientMessage::close(subscription_id)).await {
            // results are already complete at this point
            tracing::warn!("Failed to close subscription: {e}");
        }

        Ok(events)
    }

    /// Query and keep only the newest matching event.
    ///
    /// Relay storage order is not guaranteed chronological, so the pick is
    /// done locally.
    pub async fn query_first(&mut self, filter: Filter) -> Result<Option<Event>, QueryFailure> {
        let events = self.query(vec![filter]).await?;
        Ok(events.into_iter().max_by_key(|e| e.created_at))
    }

    /// Fetch every event of the given kinds by walking a decreasing
    /// `until` cursor.
    ///
    /// Stops when a page comes back short, when the cursor cannot advance,
    /// or when `max_results` events have been collected.
    pub async fn query_paginated(
        &mut self,
        kinds: &[Kind],
        extra: Filter,
    ) -> Result<Vec<Event>, QueryFailure> {
        let page_size: usize = self.opts.page_size;
        let max_results: usize = self.opts.max_results;

        let mut all: Vec<Event> = Vec::new();
        let mut until: Option<Timestamp> = None;
        let mut page_count: usize = 0;

        while all.len() < max_results {
            let limit: usize = cmp::min(page_size, max_results - all.len());
            let mut filter: Filter = extra.clone().kinds(kinds.iter().copied()).limit(limit);

            if let Some(cursor) = until {
                filter = filter.until(cursor);
            }

            let page: Vec<Event> = match self.query(vec![filter]).await {
                Ok(page) => page,
                Err(failure) => {
                    all.extend(failure.partial);
                    return Err(QueryFailure::new(all, failure.source));
                }
            };
            page_count += 1;

            let oldest: Timestamp = match page.iter().map(|e| e.created_at).min() {
                Some(oldest) => oldest,
                None => break,
            };

            let page_len: usize = page.len();
            all.extend(page);
            tracing::debug!("Page {page_count}: {page_len} events (total: {})", all.len());

            if page_len < limit {
                break;
            }

            if oldest.as_u64() == 0 {
                // cursor cannot advance
                break;
            }

            until = Some(oldest - 1u64);
        }

        all.truncate(max_results);
        tracing::debug!("Pagination done: {} events in {page_count} pages", all.len());
        Ok(all)
    }

    /// Publish a signed event.
    ///
    /// `OK` and `NOTICE` replies are observed by subsequent reads; this
    /// call does not block waiting for them.
    pub async fn publish(&mut self, event: &Event) -> Result<(), Error> {
        self.send_msg(ClientMessage::event(event.clone())).await
    }

    /// Open a long-lived subscription and return its id.
    ///
    /// Use [`RelayConnection::next_message`] to drain frames.
    pub async fn subscribe(&mut self, filters: Vec<Filter>) -> Result<SubscriptionId, Error> {
        let subscription_id = SubscriptionId::generate();
        self.send_msg(ClientMessage::req(subscription_id.clone(), filters))
            .await?;
        Ok(subscription_id)
    }

    /// Close a subscription opened with [`RelayConnection::subscribe`]
    pub async fn close_subscription(&mut self, id: SubscriptionId) -> Result<(), Error> {
        self.send_msg(ClientMessage::close(id)).await
    }

    /// Wait for the next parseable relay frame.
    ///
    /// Pings are answered transparently; malformed frames are dropped with
    /// a warning. Blocks until a frame arrives or the connection dies.
    pub async fn next_message(&mut self) -> Result<RelayMessage, Error> {
        loop {
            match self.stream.next().await {
                None => return Err(Error::ConnectionClosed),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(WsMessage::Text(json))) => match RelayMessage::from_json(&json) {
                    Ok(message) => return Ok(message),
                    Err(e) => tracing::warn!("Skipping malformed relay frame: {e}"),
                },
                Some(Ok(WsMessage::Ping(payload))) => {
                    let _ = self.stream.send(WsMessage::Pong(payload)).await;
                }
                Some(Ok(WsMessage::Close(_))) => return Err(Error::ConnectionClosed),
                Some(Ok(_)) => {}
            }
        }
    }

    /// Close the socket
    pub async fn disconnect(mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!("Error while closing relay socket: {e}");
        }
    }

    async fn send_msg(&mut self, msg: ClientMessage) -> Result<(), Error> {
        self.stream
            .send(WsMessage::Text(msg.as_json()))
            .await
            .map_err(Error::from)
    }
}
