//! Collaborator adapters
//!
//! The core only sees the seam traits defined here. Concrete adapters:
//! - `mediamtx` - status source and relay control plane (MediaMTX API v3)
//! - `isapi` - Hikvision device control over HTTP
//! - `recordings` - local recordings directory lister
//! - `system` - light OS stats for the heartbeat and health checks
//! - `cloud` - HTTP heartbeat to the cloud API

pub mod cloud;
pub mod isapi;
pub mod mediamtx;
pub mod recordings;
pub mod system;

use async_trait::async_trait;
use edge_agent_shared::PathDescriptor;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cloud::{CloudClient, SiteHeartbeat};
pub use isapi::IsapiClient;
pub use mediamtx::MediamtxClient;
pub use recordings::LocalRecordings;
pub use system::SystemMonitor;

/// Collaborator failure
#[derive(Debug, Error)]
pub enum ClientError {
    /// The addressed resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status with the response body for context
    #[error("{context} failed: HTTP {status} {body}")]
    Status {
        context: String,
        status: u16,
        body: String,
    },

    /// Missing or unusable local configuration (e.g. camera credentials)
    #[error("{0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Fetches the relay's current view of every path
#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
    async fn list_paths(&self) -> Result<Vec<PathDescriptor>>;
}

/// Adds and removes relay paths by name
#[async_trait]
pub trait RelayControl: Send + Sync + 'static {
    async fn add_path(&self, name: &str, source: &str) -> Result<()>;

    /// Fails with `ClientError::NotFound` when the path does not exist
    async fn delete_path(&self, name: &str) -> Result<()>;
}

/// A recording segment stored on the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSegment {
    pub start_time: String,
    pub end_time: String,
    pub playback_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtzPreset {
    pub id: String,
    pub name: String,
}

/// Continuous-move velocities, each in -100..=100
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PtzVector {
    pub pan: i32,
    pub tilt: i32,
    pub zoom: i32,
}

impl PtzVector {
    pub const STOP: PtzVector = PtzVector {
        pan: 0,
        tilt: 0,
        zoom: 0,
    };

    pub fn clamped(pan: i32, tilt: i32, zoom: i32) -> Self {
        Self {
            pan: pan.clamp(-100, 100),
            tilt: tilt.clamp(-100, 100),
            zoom: zoom.clamp(-100, 100),
        }
    }
}

/// Device-control operations addressed by device id
#[async_trait]
pub trait DeviceControl: Send + Sync + 'static {
    async fn search_recordings(
        &self,
        camera_id: &str,
        start_time: &str,
        end_time: &str,
    ) -> Result<Vec<RecordingSegment>>;

    async fn ptz_move(&self, camera_id: &str, vector: PtzVector) -> Result<()>;

    async fn ptz_stop(&self, camera_id: &str) -> Result<()> {
        self.ptz_move(camera_id, PtzVector::STOP).await
    }

    async fn list_presets(&self, camera_id: &str) -> Result<Vec<PtzPreset>>;

    async fn goto_preset(&self, camera_id: &str, preset_id: &str) -> Result<()>;

    /// Inject the device's credentials into an RTSP URL that carries none
    fn authorize_url(&self, camera_id: &str, url: &str) -> Result<String>;
}

/// A recording file on local storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRecording {
    pub name: String,
    pub size_bytes: u64,
    pub modified: String,
}

#[async_trait]
pub trait RecordingsLister: Send + Sync + 'static {
    /// Files for one camera, or the whole root when `camera_id` is `None`
    async fn list(&self, camera_id: Option<&str>) -> Result<Vec<LocalRecording>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ptz_vector_clamped() {
        let v = PtzVector::clamped(250, -101, 40);
        assert_eq!(v, PtzVector { pan: 100, tilt: -100, zoom: 40 });
    }

    #[test]
    fn test_config_error_message_is_verbatim() {
        let err = ClientError::Config("No IP configured for camera cam-09".into());
        assert_eq!(err.to_string(), "No IP configured for camera cam-09");
    }
}
