//! Transport trait abstraction between the bus connection and the broker client

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use edge_agent_shared::PublishOptions;

/// A raw message received from the broker
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// A message waiting to be written to the broker
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Bytes,
    pub options: PublishOptions,
}

/// An established broker session
#[async_trait]
pub trait BusSession: Send + 'static {
    /// Subscribe to a topic filter at "at least once"
    async fn subscribe(&mut self, filter: &str) -> Result<()>;

    /// Queue a publication on this session
    async fn publish(&mut self, message: OutboundMessage) -> Result<()>;

    /// Wait for the next inbound publication. An error means the session is gone.
    async fn next_message(&mut self) -> Result<InboundMessage>;

    /// Close the session gracefully
    async fn close(&mut self) -> Result<()>;
}

/// Factory for broker sessions
#[async_trait]
pub trait BusConnector: Send + Sync + 'static {
    /// The session type this connector produces
    type Session: BusSession;

    /// Attempt to connect, returning a session once the broker has accepted it
    async fn connect(&self) -> Result<Self::Session>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
