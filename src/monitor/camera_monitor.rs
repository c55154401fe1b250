//! Camera Monitor
//!
//! Polls the status source on a fixed period and turns each snapshot into
//! device records and edge-triggered transition events. A failed poll leaves
//! the device table untouched until the next successful one.

use super::stamped;
use crate::clients::{ClientError, StatusSource};
use crate::connection::BusPublisher;
use edge_agent_shared::{
    CameraEvent, CameraStats, DeviceRecord, DeviceTable, DeviceTransition, PathDescriptor,
    PublishOptions, RegisterInfo, Topics,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct CameraMonitor {
    source: Arc<dyn StatusSource>,
    bus: Arc<dyn BusPublisher>,
    topics: Topics,
    /// Host advertised in registration stream URLs
    public_host: String,
    poll_interval: Duration,
    table: RwLock<DeviceTable>,
}

impl CameraMonitor {
    pub fn new(
        source: Arc<dyn StatusSource>,
        bus: Arc<dyn BusPublisher>,
        topics: Topics,
        public_host: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            bus,
            topics,
            public_host: public_host.into(),
            poll_interval,
            table: RwLock::new(DeviceTable::new()),
        }
    }

    /// Fetch one snapshot and reconcile it. Returns the number of devices seen.
    pub async fn poll_once(&self) -> Result<usize, ClientError> {
        let paths = self.source.list_paths().await?;
        Ok(self.process_paths(&paths).await)
    }

    /// Reconcile a snapshot against the device table and publish the results
    pub async fn process_paths(&self, paths: &[PathDescriptor]) -> usize {
        let mut seen = 0;

        for path in paths {
            let Some(record) = DeviceRecord::from_path(path) else {
                continue;
            };
            seen += 1;

            let transition = self.table.write().await.apply(record.clone());
            self.publish(&record, transition).await;
        }

        seen
    }

    async fn publish(&self, record: &DeviceRecord, transition: DeviceTransition) {
        let camera_id = record.camera_id.as_str();

        match transition {
            DeviceTransition::Discovered { online } => {
                info!("[MONITOR] New camera detected: {} (online={})", camera_id, online);
                let register = RegisterInfo::from_record(record, &self.public_host);
                self.bus
                    .publish(
                        &self.topics.camera_register(camera_id),
                        stamped(&register, "registeredAt"),
                        PublishOptions::retained(),
                    )
                    .await;
            }
            DeviceTransition::CameOnline => {
                info!("[MONITOR] Camera {} is now online", camera_id);
                self.publish_event(camera_id, CameraEvent::online(camera_id)).await;
            }
            DeviceTransition::WentOffline => {
                warn!("[MONITOR] Camera {} went offline", camera_id);
                self.publish_event(camera_id, CameraEvent::offline(camera_id)).await;
            }
            DeviceTransition::Unchanged => {}
        }

        self.bus
            .publish(
                &self.topics.camera_status(camera_id),
                stamped(record, "timestamp"),
                PublishOptions::default(),
            )
            .await;
    }

    async fn publish_event(&self, camera_id: &str, event: CameraEvent) {
        self.bus
            .publish(
                &self.topics.camera_events(camera_id),
                stamped(&event, "timestamp"),
                PublishOptions::default(),
            )
            .await;
    }

    /// Start the polling task. The first poll runs immediately.
    pub fn start(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let monitor = self.clone();

        tokio::spawn(async move {
            info!(
                "[MONITOR] Starting camera monitoring (every {:?})",
                monitor.poll_interval
            );
            let mut ticker = interval(monitor.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match monitor.poll_once().await {
                    Ok(seen) => debug!("[MONITOR] Poll complete: {} cameras", seen),
                    Err(e) => error!("[MONITOR] Error fetching camera status: {}", e),
                }
            }

            info!("[MONITOR] Monitoring stopped");
        })
    }

    pub async fn cameras(&self) -> Vec<DeviceRecord> {
        self.table.read().await.records()
    }

    pub async fn camera(&self, camera_id: &str) -> Option<DeviceRecord> {
        self.table.read().await.get(camera_id).cloned()
    }

    pub async fn stats(&self) -> CameraStats {
        self.table.read().await.stats()
    }
}
