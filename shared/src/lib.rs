//! Edge Agent Shared Protocol Types
//!
//! This crate provides the wire types, topic layout and device state machine
//! shared between the edge gateway agent and anything that talks to it over
//! the pub/sub bus.

pub mod codec;
pub mod device;
pub mod envelope;
pub mod state_machine;
pub mod topics;

use std::time::{SystemTime, UNIX_EPOCH};

pub use device::{
    derive_device_id, is_safe_id, CameraEvent, CameraEventKind, CameraStats, DeviceRecord,
    PathDescriptor, PathSource, RegisterInfo, StreamUrls, TrackInfo,
};
pub use envelope::{CommandEnvelope, CommandReply};
pub use state_machine::{DeviceStatus, DeviceTable, DeviceTransition};
pub use topics::{topic_matches, Topics};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Current wall-clock time as an RFC 3339 string, used for payload timestamps
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Default timing parameters for the agent
pub mod defaults {
    /// Reconciliation poll period against the status source
    pub const POLL_INTERVAL_MS: u64 = 10_000;

    /// Gateway heartbeat period
    pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

    /// MQTT keep-alive
    pub const KEEP_ALIVE_SECS: u64 = 60;

    /// Fixed delay between reconnect attempts
    pub const RECONNECT_PERIOD_MS: u64 = 5_000;

    /// Per-attempt connect timeout
    pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

    /// Consecutive reconnect attempts before the bus is abandoned
    pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

    /// Lifetime of an ephemeral playback path
    pub const PLAYBACK_PATH_TTL_SECS: u64 = 2 * 60 * 60;

    /// Cloud HTTP heartbeat period
    pub const CLOUD_HEARTBEAT_INTERVAL_SECS: u64 = 60;
}

/// Delivery guarantee requested for a publication or subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QosLevel {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

/// Options attached to an outbound publication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishOptions {
    pub qos: QosLevel,
    pub retain: bool,
}

impl PublishOptions {
    /// QoS 1, retained (used for registration records)
    pub fn retained() -> Self {
        Self {
            qos: QosLevel::AtLeastOnce,
            retain: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_publish_options() {
        let opts = PublishOptions::default();
        assert_eq!(opts.qos, QosLevel::AtLeastOnce);
        assert!(!opts.retain);
        assert!(PublishOptions::retained().retain);
    }

    #[test]
    fn test_timestamp_is_rfc3339() {
        let ts = timestamp();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
        assert!(now_ms() > 0);
    }
}
