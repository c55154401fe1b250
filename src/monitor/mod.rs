//! Device monitoring
//!
//! Independent periodic tasks:
//! - the camera monitor reconciles relay paths into device records
//! - the heartbeat publishes gateway and per-camera stats
//! - the optional cloud heartbeat reports the site over HTTP

mod camera_monitor;
mod cloud_heartbeat;
mod heartbeat;

pub use camera_monitor::CameraMonitor;
pub use cloud_heartbeat::CloudHeartbeat;
pub use heartbeat::HeartbeatPublisher;

use serde::Serialize;
use serde_json::Value;

/// Serialize `payload` and add an RFC 3339 time under `key`
fn stamped<T: Serialize>(payload: &T, key: &str) -> Value {
    let mut value = serde_json::to_value(payload).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert(key.to_string(), Value::String(edge_agent_shared::timestamp()));
    }
    value
}
