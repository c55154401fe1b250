//! Gateway heartbeat and per-camera stream stats

use super::{stamped, CameraMonitor};
use crate::clients::SystemMonitor;
use crate::connection::BusPublisher;
use crate::lease::LeaseManager;
use edge_agent_shared::{PublishOptions, Topics};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct HeartbeatPublisher {
    bus: Arc<dyn BusPublisher>,
    topics: Topics,
    cameras: Arc<CameraMonitor>,
    leases: Arc<LeaseManager>,
    system: Arc<SystemMonitor>,
    period: Duration,
}

impl HeartbeatPublisher {
    pub fn new(
        bus: Arc<dyn BusPublisher>,
        topics: Topics,
        cameras: Arc<CameraMonitor>,
        leases: Arc<LeaseManager>,
        system: Arc<SystemMonitor>,
        period: Duration,
    ) -> Self {
        Self {
            bus,
            topics,
            cameras,
            leases,
            system,
            period,
        }
    }

    pub async fn heartbeat(&self) -> Value {
        let system = self.system.light_stats().await;
        stamped(
            &json!({
                "uptime": system.uptime,
                "system": system,
                "cameras": self.cameras.stats().await,
                "leases": self.leases.len().await,
            }),
            "timestamp",
        )
    }

    /// Publish one heartbeat and the stats of every known camera
    pub async fn beat(&self) {
        let heartbeat = self.heartbeat().await;
        if !self
            .bus
            .publish(&self.topics.heartbeat(), heartbeat, PublishOptions::default())
            .await
        {
            debug!("[HEARTBEAT] Skipped, bus not connected");
            return;
        }

        for camera in self.cameras.cameras().await {
            let stats = stamped(
                &json!({
                    "online": camera.online,
                    "viewers": camera.viewers,
                    "bytesReceived": camera.bytes_received,
                }),
                "timestamp",
            );
            self.bus
                .publish(
                    &self.topics.camera_stats(&camera.camera_id),
                    stats,
                    PublishOptions::default(),
                )
                .await;
        }
    }

    pub fn start(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let publisher = self.clone();

        tokio::spawn(async move {
            let mut ticker = interval(publisher.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => publisher.beat().await,
                }
            }

            info!("[HEARTBEAT] Stopped");
        })
    }
}
