//! Command handlers for each action

mod config;
mod gateway;
mod ptz;
mod recordings;
mod status;

pub use config::handle_update_config;
pub use gateway::{handle_list_cameras, handle_list_leases, handle_ping, handle_refresh_cameras};
pub use ptz::{handle_goto_preset, handle_list_presets, handle_ptz_move, handle_ptz_stop};
pub use recordings::{
    handle_list_local_recordings, handle_search_recordings, handle_start_playback,
    handle_stop_playback,
};
pub use status::{handle_camera_status, handle_gateway_status};

use super::CommandError;
use crate::clients::{DeviceControl, RecordingsLister, SystemMonitor};
use crate::connection::ConnectionState;
use crate::lease::LeaseManager;
use crate::monitor::CameraMonitor;
use edge_agent_shared::{is_safe_id, now_ms};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Collaborators reachable from command handlers
pub struct Services {
    pub device: Arc<dyn DeviceControl>,
    pub recordings: Arc<dyn RecordingsLister>,
    pub leases: Arc<LeaseManager>,
    pub cameras: Arc<CameraMonitor>,
    pub system: Arc<SystemMonitor>,
    pub bus_state: watch::Receiver<ConnectionState>,
    /// Host advertised in playback URLs
    pub public_host: String,
    /// Last timestamp handed out for a playback path name
    last_playback_ms: AtomicU64,
}

impl Services {
    pub fn new(
        device: Arc<dyn DeviceControl>,
        recordings: Arc<dyn RecordingsLister>,
        leases: Arc<LeaseManager>,
        cameras: Arc<CameraMonitor>,
        system: Arc<SystemMonitor>,
        bus_state: watch::Receiver<ConnectionState>,
        public_host: impl Into<String>,
    ) -> Self {
        Self {
            device,
            recordings,
            leases,
            cameras,
            system,
            bus_state,
            public_host: public_host.into(),
            last_playback_ms: AtomicU64::new(0),
        }
    }

    /// Millisecond stamp for a new playback path, strictly increasing so two
    /// requests in the same millisecond still get distinct names.
    pub fn next_playback_stamp(&self) -> u64 {
        let now = now_ms();
        let previous = self
            .last_playback_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1)
    }
}

/// Parameters shared by every action; each handler reads what it needs
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandParams {
    pub camera_id: Option<String>,
    pub pan: Option<f64>,
    pub tilt: Option<f64>,
    pub zoom: Option<f64>,
    #[serde(deserialize_with = "string_or_number")]
    pub preset_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub playback_uri: Option<String>,
    pub path_name: Option<String>,
}

impl CommandParams {
    pub fn from_value(params: &Value) -> Result<Self, CommandError> {
        if params.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(params.clone()).map_err(|e| CommandError::InvalidParams(e.to_string()))
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Context passed to command handlers
pub struct HandlerContext<'a> {
    pub gateway_id: &'a str,
    pub request_id: &'a str,
    /// Device id from the topic, if the domain carries one
    pub topic_camera_id: Option<&'a str>,
    pub params: CommandParams,
    pub raw_params: &'a Value,
    pub services: &'a Services,
}

impl HandlerContext<'_> {
    /// Device id from the topic, else from `params.cameraId`
    pub fn camera_id(&self) -> Result<&str, CommandError> {
        let id = self
            .topic_camera_id
            .or(self.params.camera_id.as_deref())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CommandError::InvalidParams("cameraId is required".into()))?;
        check_id(id, "cameraId")
    }

    pub fn required<'p>(&self, value: &'p Option<String>, name: &str) -> Result<&'p str, CommandError> {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CommandError::InvalidParams(format!("{} is required", name)))
    }

    /// A required id that ends up in a URL path or file path
    pub fn required_id<'p>(&self, value: &'p Option<String>, name: &str) -> Result<&'p str, CommandError> {
        check_id(self.required(value, name)?, name)
    }
}

fn check_id<'v>(value: &'v str, name: &str) -> Result<&'v str, CommandError> {
    if is_safe_id(value) {
        Ok(value)
    } else {
        Err(CommandError::InvalidParams(format!(
            "{} must match [A-Za-z0-9_-]: {:?}",
            name, value
        )))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_parsing() {
        let params = CommandParams::from_value(&json!({
            "cameraId": "cam-01",
            "pan": 50,
            "presetId": 3,
            "unrelated": true
        }))
        .unwrap();
        assert_eq!(params.camera_id.as_deref(), Some("cam-01"));
        assert_eq!(params.pan, Some(50.0));
        assert_eq!(params.preset_id.as_deref(), Some("3"));
        assert_eq!(params.tilt, None);

        assert_eq!(CommandParams::from_value(&Value::Null).unwrap(), CommandParams::default());
    }

    #[test]
    fn test_invalid_params() {
        let err = CommandParams::from_value(&json!({ "pan": "left" })).unwrap_err();
        assert!(matches!(err, CommandError::InvalidParams(_)));
    }

    #[test]
    fn test_camera_id_prefers_topic() {
        let h = fakes::harness();
        let params = json!({ "cameraId": "from-params" });

        let ctx = fakes::context(&h.services, Some("from-topic"), &params);
        assert_eq!(ctx.camera_id().unwrap(), "from-topic");

        let ctx = fakes::context(&h.services, None, &params);
        assert_eq!(ctx.camera_id().unwrap(), "from-params");

        let empty = Value::Null;
        let ctx = fakes::context(&h.services, None, &empty);
        assert!(ctx.camera_id().is_err());
    }

    #[test]
    fn test_ids_must_be_path_safe() {
        let h = fakes::harness();

        let params = json!({ "cameraId": "/etc" });
        let ctx = fakes::context(&h.services, None, &params);
        let err = ctx.camera_id().unwrap_err();
        assert!(err.to_string().starts_with("Invalid params: cameraId must match"));

        // Topic segments are checked too
        let empty = Value::Null;
        let ctx = fakes::context(&h.services, Some(".."), &empty);
        assert!(ctx.camera_id().is_err());

        let params = json!({ "presetId": "../../../../System/reboot?x=", "pathName": "sdplay-1" });
        let ctx = fakes::context(&h.services, None, &params);
        assert!(ctx.required_id(&ctx.params.preset_id, "presetId").is_err());
        assert_eq!(ctx.required_id(&ctx.params.path_name, "pathName").unwrap(), "sdplay-1");
    }

    #[test]
    fn test_playback_stamps_strictly_increase() {
        let h = fakes::harness();
        let stamps: Vec<u64> = (0..50).map(|_| h.services.next_playback_stamp()).collect();
        assert!(stamps.windows(2).all(|w| w[1] > w[0]));
    }
}
