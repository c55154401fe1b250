//! Leased relay paths
//!
//! Every acquired path gets exactly one expiry timer. The manager owns the
//! timer table; `release` aborts the timer before deleting, and a firing
//! timer only deletes if its lease is still the current one for that name.

use crate::clients::{ClientError, RelayControl};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Public view of an active lease
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseInfo {
    pub name: String,
    pub source: String,
    pub created_at: String,
    pub expires_at: String,
}

struct Lease {
    /// Distinguishes this lease from a later one reusing the same name
    generation: u64,
    source: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    timer: JoinHandle<()>,
}

impl Lease {
    fn info(&self, name: &str) -> LeaseInfo {
        LeaseInfo {
            name: name.to_string(),
            source: self.source.clone(),
            created_at: self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            expires_at: self.expires_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

pub struct LeaseManager {
    relay: Arc<dyn RelayControl>,
    ttl: Duration,
    leases: Mutex<HashMap<String, Lease>>,
    generation: AtomicU64,
    this: Weak<LeaseManager>,
}

impl LeaseManager {
    pub fn new(relay: Arc<dyn RelayControl>, ttl: Duration) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            relay,
            ttl,
            leases: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            this: this.clone(),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create the relay path and schedule its expiry.
    ///
    /// A relay failure is returned as-is and nothing is scheduled.
    pub async fn acquire(&self, name: &str, source: &str) -> Result<LeaseInfo, ClientError> {
        self.relay.add_path(name, source).await?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let created_at = Utc::now();
        let expires_at = created_at
            + chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::zero());

        let mut leases = self.leases.lock().await;

        let manager = self.this.clone();
        let lease_name = name.to_string();
        let ttl = self.ttl;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(manager) = manager.upgrade() {
                manager.expire(&lease_name, generation).await;
            }
        });

        let lease = Lease {
            generation,
            source: source.to_string(),
            created_at,
            expires_at,
            timer,
        };
        let info = lease.info(name);

        if let Some(previous) = leases.insert(name.to_string(), lease) {
            warn!("[LEASE] {} re-acquired, replacing pending expiry", name);
            previous.timer.abort();
        }

        info!("[LEASE] Acquired {} (expires in {}s)", name, ttl.as_secs());
        Ok(info)
    }

    /// Cancel the pending expiry (if any) and delete the path. Idempotent.
    pub async fn release(&self, name: &str) {
        if let Some(lease) = self.leases.lock().await.remove(name) {
            lease.timer.abort();
        }
        self.delete(name).await;
    }

    /// Timer path: only act if this generation still owns the name
    async fn expire(&self, name: &str, generation: u64) {
        {
            let mut leases = self.leases.lock().await;
            match leases.get(name) {
                Some(lease) if lease.generation == generation => {
                    leases.remove(name);
                }
                _ => return,
            }
        }

        info!("[LEASE] {} expired", name);
        self.delete(name).await;
    }

    async fn delete(&self, name: &str) {
        match self.relay.delete_path(name).await {
            Ok(()) => info!("[LEASE] Released {}", name),
            Err(ClientError::NotFound(_)) => debug!("[LEASE] {} already gone", name),
            Err(e) => warn!("[LEASE] Failed to delete {}: {}", name, e),
        }
    }

    /// Active leases, oldest first
    pub async fn active(&self) -> Vec<LeaseInfo> {
        let leases = self.leases.lock().await;
        let mut active: Vec<(&String, &Lease)> = leases.iter().collect();
        active.sort_by_key(|(_, lease)| lease.generation);
        active.into_iter().map(|(name, lease)| lease.info(name)).collect()
    }

    pub async fn len(&self) -> usize {
        self.leases.lock().await.len()
    }

    /// Abort every pending expiry. Paths are left in place.
    pub async fn shutdown(&self) {
        let mut leases = self.leases.lock().await;
        for (_, lease) in leases.drain() {
            lease.timer.abort();
        }
    }
}
