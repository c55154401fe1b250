//! Periodic site heartbeat to the cloud API

use crate::clients::{CloudClient, SiteHeartbeat};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct CloudHeartbeat {
    client: CloudClient,
    site_id: String,
    location: String,
    period: Duration,
}

impl CloudHeartbeat {
    pub fn new(client: CloudClient, site_id: String, location: String, period: Duration) -> Self {
        Self {
            client,
            site_id,
            location,
            period,
        }
    }

    /// Failures are logged and retried on the next tick
    pub async fn beat(&self) {
        let heartbeat = SiteHeartbeat::now(&self.site_id, &self.location);
        if let Err(e) = self.client.send_heartbeat(&heartbeat).await {
            warn!("[CLOUD] Heartbeat failed: {}", e);
        }
    }

    pub fn start(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let heartbeat = self.clone();

        tokio::spawn(async move {
            let mut ticker = interval(heartbeat.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => heartbeat.beat().await,
                }
            }

            info!("[CLOUD] Heartbeat stopped");
        })
    }
}
