//! MQTT transport built on rumqttc
//!
//! Each `connect()` builds a fresh client/event-loop pair and drives it until
//! the broker acknowledges the session. Reconnection is owned by the
//! connection manager, so a session whose event loop errors is simply dropped.

use crate::config::MqttConfig;
use crate::transport::traits::{BusConnector, BusSession, InboundMessage, OutboundMessage};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use edge_agent_shared::QosLevel;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use std::time::Duration;
use tokio::time::timeout;

/// rumqttc rejects keep-alive intervals below this
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Request channel capacity between client handle and event loop
const REQUEST_CAPACITY: usize = 64;

/// Connects to the configured broker
pub struct MqttConnector {
    config: MqttConfig,
}

impl MqttConnector {
    pub fn new(config: MqttConfig) -> Self {
        Self { config }
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_clean_session(true);
        options.set_keep_alive(self.config.keep_alive.max(MIN_KEEP_ALIVE));

        if let Some((user, pass)) = self.config.credentials() {
            options.set_credentials(user, pass);
        }

        options
    }
}

#[async_trait]
impl BusConnector for MqttConnector {
    type Session = MqttSession;

    async fn connect(&self) -> Result<MqttSession> {
        let (client, mut eventloop) = AsyncClient::new(self.options(), REQUEST_CAPACITY);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        bail!("Broker refused connection: {:?}", ack.code);
                    }
                    return Ok(MqttSession { client, eventloop });
                }
                Ok(_) => {}
                Err(e) => return Err(anyhow!("Connection error: {}", e)),
            }
        }
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}

/// A live MQTT session
pub struct MqttSession {
    client: AsyncClient,
    eventloop: EventLoop,
}

fn to_qos(level: QosLevel) -> QoS {
    match level {
        QosLevel::AtMostOnce => QoS::AtMostOnce,
        QosLevel::AtLeastOnce => QoS::AtLeastOnce,
        QosLevel::ExactlyOnce => QoS::ExactlyOnce,
    }
}

#[async_trait]
impl BusSession for MqttSession {
    async fn subscribe(&mut self, filter: &str) -> Result<()> {
        // try_* never waits on the event loop, which is only polled in next_message
        self.client.try_subscribe(filter, QoS::AtLeastOnce)?;
        Ok(())
    }

    async fn publish(&mut self, message: OutboundMessage) -> Result<()> {
        self.client.try_publish(
            message.topic,
            to_qos(message.options.qos),
            message.options.retain,
            message.payload.to_vec(),
        )?;
        Ok(())
    }

    async fn next_message(&mut self) -> Result<InboundMessage> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(InboundMessage {
                        topic: publish.topic,
                        payload: publish.payload,
                    });
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    bail!("Broker closed the session");
                }
                Ok(_) => {}
                Err(e) => return Err(anyhow!("Connection lost: {}", e)),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.client.try_disconnect()?;

        // Drive the loop until the DISCONNECT has actually been written
        let flushed = timeout(Duration::from_secs(1), async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;

        if flushed.is_err() {
            bail!("Timed out sending DISCONNECT");
        }
        Ok(())
    }
}
