//! Command domains (derived from the topic) and the actions each accepts

use edge_agent_shared::topics::SEPARATOR;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandDomain {
    /// `gateway/{id}/command`
    Gateway,
    /// `camera/{id}/{cam}/command`
    Camera { camera_id: String },
    /// `camera/{id}/{cam}/config`
    CameraConfig { camera_id: String },
    /// `cmd/{id}/isapi`
    Isapi,
    /// `cmd/{id}/ptz`
    Ptz,
    /// `cmd/{id}/recordings`
    Recordings,
}

impl CommandDomain {
    /// Resolve the domain of a command topic addressed to `gateway_id`
    pub fn from_topic(topic: &str, gateway_id: &str) -> Option<Self> {
        let parts: Vec<&str> = topic.split(SEPARATOR).collect();

        match parts.as_slice() {
            ["gateway", id, "command"] if *id == gateway_id => Some(CommandDomain::Gateway),
            ["camera", id, cam, "command"] if *id == gateway_id && !cam.is_empty() => {
                Some(CommandDomain::Camera {
                    camera_id: cam.to_string(),
                })
            }
            ["camera", id, cam, "config"] if *id == gateway_id && !cam.is_empty() => {
                Some(CommandDomain::CameraConfig {
                    camera_id: cam.to_string(),
                })
            }
            ["cmd", id, "isapi"] if *id == gateway_id => Some(CommandDomain::Isapi),
            ["cmd", id, "ptz"] if *id == gateway_id => Some(CommandDomain::Ptz),
            ["cmd", id, "recordings"] if *id == gateway_id => Some(CommandDomain::Recordings),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CommandDomain::Gateway => "gateway",
            CommandDomain::Camera { .. } => "camera",
            CommandDomain::CameraConfig { .. } => "config",
            CommandDomain::Isapi => "isapi",
            CommandDomain::Ptz => "ptz",
            CommandDomain::Recordings => "recordings",
        }
    }

    /// Device id carried by the topic itself
    pub fn camera_id(&self) -> Option<&str> {
        match self {
            CommandDomain::Camera { camera_id } | CommandDomain::CameraConfig { camera_id } => {
                Some(camera_id)
            }
            _ => None,
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        use Action::*;

        match self {
            CommandDomain::Gateway => matches!(
                action,
                Ping | GetStatus | ListCameras | RefreshCameras | ListLeases
            ),
            CommandDomain::Camera { .. } => matches!(
                action,
                GetStatus | PtzMove | PtzStop | ListPresets | GotoPreset
            ),
            CommandDomain::CameraConfig { .. } => matches!(action, UpdateConfig),
            CommandDomain::Isapi => matches!(
                action,
                PtzMove
                    | PtzStop
                    | ListPresets
                    | GotoPreset
                    | SearchRecordings
                    | StartPlayback
                    | StopPlayback
                    | ListLocalRecordings
            ),
            CommandDomain::Ptz => matches!(action, PtzMove | PtzStop | ListPresets | GotoPreset),
            CommandDomain::Recordings => matches!(
                action,
                SearchRecordings | StartPlayback | StopPlayback | ListLocalRecordings
            ),
        }
    }
}

/// Every action the gateway understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Ping,
    GetStatus,
    ListCameras,
    RefreshCameras,
    ListLeases,
    PtzMove,
    PtzStop,
    ListPresets,
    GotoPreset,
    SearchRecordings,
    StartPlayback,
    StopPlayback,
    ListLocalRecordings,
    UpdateConfig,
}

impl Action {
    pub fn parse(name: &str) -> Option<Self> {
        let action = match name {
            "ping" => Action::Ping,
            "getStatus" => Action::GetStatus,
            "listCameras" => Action::ListCameras,
            "refreshCameras" => Action::RefreshCameras,
            "listLeases" => Action::ListLeases,
            "ptzMove" => Action::PtzMove,
            "ptzStop" => Action::PtzStop,
            "listPresets" => Action::ListPresets,
            "gotoPreset" => Action::GotoPreset,
            "searchRecordings" => Action::SearchRecordings,
            "startPlayback" => Action::StartPlayback,
            "stopPlayback" => Action::StopPlayback,
            "listLocalRecordings" => Action::ListLocalRecordings,
            "updateConfig" => Action::UpdateConfig,
            _ => return None,
        };
        Some(action)
    }
}
