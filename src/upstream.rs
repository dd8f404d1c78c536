//! Upstream feed connection
//!
//!  Owns the single outbound WebSocket connection to the ATC24 feed,
//!  dispatches decoded frames into the store, and drives the
//!  reconnect state machine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::protocol::{self, FeedEvent, Update};
use crate::roster::SharedStore;

const EVENT_CAPACITY: usize = 16;

/// Connection lifecycle notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
}

/// Cloneable handle for querying and controlling the feed connection
#[derive(Clone)]
pub struct FeedHandle {
    connected: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    events: broadcast::Sender<ConnectionEvent>,
}

impl FeedHandle {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Subscribe to connection lifecycle events
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Close the connection and suppress any scheduled reconnect
    pub fn disconnect(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// The upstream client. Connect with `run`; the loop retries forever
/// until `disconnect` is called on the handle.
pub struct FeedClient {
    url: String,
    /// Delay before reconnecting after a connection that was open closes
    reconnect_delay: Duration,
    /// Delay after a connection attempt that failed outright
    connect_fail_delay: Duration,
    store: SharedStore,
    updates: broadcast::Sender<Update>,
    connected: Arc<AtomicBool>,
    events: broadcast::Sender<ConnectionEvent>,
    shutdown: watch::Receiver<bool>,
}

impl FeedClient {
    pub fn new(
        url: String,
        reconnect_delay: Duration,
        connect_fail_delay: Duration,
        store: SharedStore,
        updates: broadcast::Sender<Update>,
    ) -> (Self, FeedHandle) {
        let connected = Arc::new(AtomicBool::new(false));
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = FeedHandle {
            connected: Arc::clone(&connected),
            shutdown: shutdown_tx,
            events: events_tx.clone(),
        };
        let client = FeedClient {
            url,
            reconnect_delay,
            connect_fail_delay,
            store,
            updates,
            connected,
            events: events_tx,
            shutdown: shutdown_rx,
        };
        (client, handle)
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Connect/dispatch/reconnect loop. Retries are unbounded; only
    /// `FeedHandle::disconnect` ends the loop.
    pub async fn run(mut self) {
        loop {
            if self.is_shutdown() {
                break;
            }

            debug!("Connecting to feed at {}", self.url);
            let delay = match self.serve_connection().await {
                Ok(()) => self.reconnect_delay,
                Err(e) => {
                    warn!("Failed to connect to feed: {}", e);
                    self.connect_fail_delay
                }
            };

            if self.connected.swap(false, Ordering::SeqCst) {
                info!("Disconnected from feed");
            }
            let _ = self.events.send(ConnectionEvent::Disconnected);

            if self.is_shutdown() {
                break;
            }
            debug!("Reconnecting in {:?}", delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.changed() => break,
            }
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    /// One connection lifetime: open the socket, then dispatch frames
    /// in arrival order until it closes. Returns Err only when the
    /// connection attempt itself failed.
    async fn serve_connection(&mut self) -> Result<()> {
        // plain client request; the feed rejects forwarded Origin headers
        let (ws, _) = connect_async(self.url.as_str()).await?;
        info!("Connected to feed at {}", self.url);
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.events.send(ConnectionEvent::Connected);

        let (mut ws_tx, mut ws_rx) = ws.split();
        loop {
            tokio::select! {
                msg = ws_rx.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.dispatch_frame(text.as_str()),
                    Some(Ok(Message::Ping(payload))) => {
                        if ws_tx.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Feed socket error: {}", e);
                        break;
                    }
                },
                _ = self.shutdown.changed() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        Ok(())
    }

    /// Decode and apply one frame. Malformed frames are logged and
    /// dropped; they never tear down the connection or the roster.
    fn dispatch_frame(&self, text: &str) {
        let event = match protocol::decode_frame(text) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping undecodable frame ({} bytes): {}", text.len(), e);
                return;
            }
        };

        match event {
            FeedEvent::AircraftData(batch) => {
                let roster = {
                    let mut store = self.store.write();
                    store.apply_snapshot_batch(batch);
                    store.all()
                };
                debug!("Snapshot batch applied, {} aircraft tracked", roster.len());
                let _ = self.updates.send(Update::Aircraft(roster));
            }
            FeedEvent::FlightPlan(plan) => {
                debug!("Flight plan for {}: {} to {}", plan.callsign, plan.departing, plan.arriving);
                self.store.write().apply_flight_plan(plan.clone());
                let _ = self.updates.send(Update::FlightPlan(plan));
            }
            FeedEvent::Controllers(controllers) => {
                debug!("Controller roster replaced, {} positions", controllers.len());
                self.store.write().set_controllers(controllers.clone());
                let _ = self.updates.send(Update::Controllers(controllers));
            }
        }
    }
}
