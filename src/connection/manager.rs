//! Connection manager with bounded automatic reconnection

use crate::transport::{BusConnector, BusSession, InboundMessage, OutboundMessage};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use edge_agent_shared::{codec, PublishOptions};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Events emitted by the connection manager
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Session established and subscriptions requested
    Connected,
    /// An established session was lost
    Disconnected { reason: String },
    /// A connect attempt failed
    ConnectionFailed { reason: String },
    /// Retry bound reached; no further attempts will be made
    Abandoned { attempts: u32 },
    /// A decoded inbound message
    Received { topic: String, message: Value },
}

/// Session state, exposed for local health introspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started (or bus disabled)
    Idle,
    Connecting,
    Connected,
    /// Waiting to retry; `attempt` counts reconnects since the last success
    Reconnecting { attempt: u32 },
    /// Gave up after the configured number of reconnect attempts
    Abandoned,
    /// Shut down on request
    Closed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting { .. } => "reconnecting",
            ConnectionState::Abandoned => "abandoned",
            ConnectionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Reconnecting { attempt } => write!(f, "reconnecting ({})", attempt),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// Configuration for connection manager
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Filters subscribed after every successful connect
    pub subscriptions: Vec<String>,
    /// Fixed delay between reconnect attempts
    pub reconnect_delay: Duration,
    /// Per-attempt connect timeout
    pub connect_timeout: Duration,
    /// Consecutive reconnect attempts allowed before giving up
    pub max_reconnect_attempts: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            subscriptions: Vec::new(),
            reconnect_delay: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            max_reconnect_attempts: 10,
        }
    }
}

/// Anything that can put a JSON payload on the bus
#[async_trait]
pub trait BusPublisher: Send + Sync {
    /// Publish `payload` to `topic`. Returns whether the session was connected
    /// at call time; an unconnected publish is dropped, not queued.
    async fn publish(&self, topic: &str, payload: Value, options: PublishOptions) -> bool;
}

/// Cheap, cloneable publish handle onto the managed session
#[derive(Clone)]
pub struct BusHandle {
    outbound_tx: mpsc::Sender<OutboundMessage>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl BusHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }
}

#[async_trait]
impl BusPublisher for BusHandle {
    async fn publish(&self, topic: &str, payload: Value, options: PublishOptions) -> bool {
        if !self.is_connected() {
            warn!("[MQTT] Not connected. Cannot publish to {}", topic);
            return false;
        }

        let payload = match codec::encode(&payload) {
            Ok(p) => p,
            Err(e) => {
                error!("[MQTT] Failed to encode payload for {}: {}", topic, e);
                return false;
            }
        };

        let message = OutboundMessage {
            topic: topic.to_string(),
            payload,
            options,
        };

        if self.outbound_tx.send(message).await.is_err() {
            warn!("[MQTT] Connection closed. Dropping publish to {}", topic);
        }
        true
    }
}

/// Manages the broker session on a background task
pub struct ConnectionManager {
    handle: BusHandle,
    /// Channel to receive connection events
    event_rx: mpsc::Receiver<ConnectionEvent>,
}

impl ConnectionManager {
    /// Create a new connection manager and start the connection loop.
    ///
    /// Connection failures never surface here; they feed the retry loop.
    pub fn new<C: BusConnector>(
        config: ConnectionConfig,
        connector: C,
        shutdown: CancellationToken,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundMessage>(256);
        let (event_tx, event_rx) = mpsc::channel::<ConnectionEvent>(256);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);

        tokio::spawn(async move {
            connection_loop(config, connector, outbound_rx, event_tx, state_tx, shutdown).await;
        });

        Self {
            handle: BusHandle {
                outbound_tx,
                state_rx,
            },
            event_rx,
        }
    }

    /// A manager with no broker behind it: state stays `Idle`, every publish
    /// is dropped and no events are ever produced.
    pub fn disabled() -> Self {
        let (outbound_tx, _) = mpsc::channel::<OutboundMessage>(1);
        let (_, event_rx) = mpsc::channel::<ConnectionEvent>(1);
        let (_, state_rx) = watch::channel(ConnectionState::Idle);

        Self {
            handle: BusHandle {
                outbound_tx,
                state_rx,
            },
            event_rx,
        }
    }

    /// Receive the next connection event
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.event_rx.recv().await
    }

    /// Get a clone of the publish handle
    pub fn handle(&self) -> BusHandle {
        self.handle.clone()
    }

    /// Watch channel for session state
    pub fn state_rx(&self) -> watch::Receiver<ConnectionState> {
        self.handle.state_rx.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }
}

/// Main connection loop with reconnection logic
async fn connection_loop<C: BusConnector>(
    config: ConnectionConfig,
    connector: C,
    mut outbound_rx: mpsc::Receiver<OutboundMessage>,
    event_tx: mpsc::Sender<ConnectionEvent>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
) {
    let mut reconnect_attempts: u32 = 0;
    state_tx.send_replace(ConnectionState::Connecting);

    loop {
        let attempt = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = timeout(config.connect_timeout, connector.connect()) => result,
        };

        match attempt {
            Ok(Ok(mut session)) => {
                reconnect_attempts = 0;

                for filter in &config.subscriptions {
                    match session.subscribe(filter).await {
                        Ok(()) => info!("[MQTT] Subscribed to: {}", filter),
                        Err(e) => error!("[MQTT] Failed to subscribe to {}: {}", filter, e),
                    }
                }

                state_tx.send_replace(ConnectionState::Connected);
                info!("[MQTT] Connected via {}", connector.name());
                let _ = event_tx.send(ConnectionEvent::Connected).await;

                match handle_connection(&mut session, &mut outbound_rx, &event_tx, &shutdown).await {
                    Ok(()) => {
                        info!("[MQTT] Disconnecting...");
                        if let Err(e) = session.close().await {
                            debug!("[MQTT] Close failed: {}", e);
                        }
                        break;
                    }
                    Err(reason) => {
                        state_tx.send_replace(ConnectionState::Reconnecting {
                            attempt: reconnect_attempts,
                        });
                        warn!("[MQTT] Client offline: {}", reason);
                        drain_outbound(&mut outbound_rx);
                        let _ = event_tx
                            .send(ConnectionEvent::Disconnected {
                                reason: reason.to_string(),
                            })
                            .await;
                    }
                }
            }
            Ok(Err(e)) => {
                error!("[MQTT] Connection error: {}", e);
                let _ = event_tx
                    .send(ConnectionEvent::ConnectionFailed {
                        reason: e.to_string(),
                    })
                    .await;
            }
            Err(_) => {
                error!("[MQTT] Connection attempt timed out");
                let _ = event_tx
                    .send(ConnectionEvent::ConnectionFailed {
                        reason: "Connect timed out".into(),
                    })
                    .await;
            }
        }

        if reconnect_attempts >= config.max_reconnect_attempts {
            error!("[MQTT] Max reconnect attempts reached. Giving up.");
            state_tx.send_replace(ConnectionState::Abandoned);
            let _ = event_tx
                .send(ConnectionEvent::Abandoned {
                    attempts: reconnect_attempts,
                })
                .await;
            return;
        }

        reconnect_attempts += 1;
        state_tx.send_replace(ConnectionState::Reconnecting {
            attempt: reconnect_attempts,
        });

        // Wait before reconnecting
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }

        info!(
            "[MQTT] Reconnecting... (attempt {}/{})",
            reconnect_attempts, config.max_reconnect_attempts
        );
    }

    state_tx.send_replace(ConnectionState::Closed);
    info!("[MQTT] Connection closed");
}

/// Pump an active session until it fails (`Err`) or shutdown is requested (`Ok`)
async fn handle_connection<S: BusSession>(
    session: &mut S,
    outbound_rx: &mut mpsc::Receiver<OutboundMessage>,
    event_tx: &mpsc::Sender<ConnectionEvent>,
    shutdown: &CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),

            // Send outbound messages
            Some(message) = outbound_rx.recv() => {
                let topic = message.topic.clone();
                if let Err(e) = session.publish(message).await {
                    error!("[MQTT] Failed to publish to {}: {}", topic, e);
                }
            }

            // Read incoming messages
            result = session.next_message() => {
                let InboundMessage { topic, payload } =
                    result.map_err(|e| anyhow!("{}", e))?;

                match codec::decode(&payload) {
                    Ok(message) => {
                        debug!("[MQTT] Received on {}", topic);
                        let _ = event_tx.send(ConnectionEvent::Received { topic, message }).await;
                    }
                    Err(e) => {
                        error!("[MQTT] Error parsing message from {}: {}", topic, e);
                    }
                }
            }
        }
    }
}

/// Publications accepted while connected but not yet written are stale once
/// the session is gone.
fn drain_outbound(outbound_rx: &mut mpsc::Receiver<OutboundMessage>) {
    let mut dropped = 0;
    while outbound_rx.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        warn!("[MQTT] Dropped {} unsent publications", dropped);
    }
}
