//! Agent configuration
//!
//! Settings come from flags or the environment (optionally seeded from a
//! `.env` file). Every field has a default so the agent starts with no
//! environment. Out-of-range values stop startup with a usage error.

use clap::Parser;
use edge_agent_shared::defaults;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// MQTT broker settings
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// Broker host; empty disables the bus entirely
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Client identity, also the `{id}` segment of every topic
    pub client_id: String,
    pub keep_alive: Duration,
    /// Fixed delay between reconnect attempts
    pub reconnect_period: Duration,
    pub connect_timeout: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            username: None,
            password: None,
            client_id: "edge-gateway".into(),
            keep_alive: Duration::from_secs(defaults::KEEP_ALIVE_SECS),
            reconnect_period: Duration::from_millis(defaults::RECONNECT_PERIOD_MS),
            connect_timeout: Duration::from_millis(defaults::CONNECT_TIMEOUT_MS),
            max_reconnect_attempts: defaults::MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl MqttConfig {
    /// Credentials are only used when both halves are present
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

/// Local relay (MediaMTX) API settings
#[derive(Debug, Clone)]
pub struct MediamtxConfig {
    pub api_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Host advertised in stream URLs handed to remote callers
    pub public_host: String,
}

impl Default for MediamtxConfig {
    fn default() -> Self {
        Self {
            api_url: "http://mediamtx:9997".into(),
            username: None,
            password: None,
            public_host: "localhost".into(),
        }
    }
}

/// Cloud HTTP heartbeat settings; only present when both URL and token are set
#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub api_url: String,
    pub token: String,
    pub interval: Duration,
}

/// Top-level agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub site_id: String,
    pub location: String,
    pub mqtt: MqttConfig,
    pub mediamtx: MediamtxConfig,
    pub cloud: Option<CloudConfig>,
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    pub playback_ttl: Duration,
    pub recordings_dir: PathBuf,
    pub http_port: u16,
}

/// Edge camera gateway agent
#[derive(Debug, Parser)]
#[command(name = "edge-agent", version, about)]
pub struct Cli {
    #[arg(long, env = "EDGE_SITE_ID")]
    pub edge_site_id: Option<String>,

    #[arg(long, env = "EDGE_LOCATION")]
    pub edge_location: Option<String>,

    /// Broker host; empty runs without a bus
    #[arg(long, env = "MQTT_HOST", default_value = "localhost")]
    pub mqtt_host: String,

    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    pub mqtt_port: u16,

    #[arg(long, env = "MQTT_USERNAME")]
    pub mqtt_username: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub mqtt_password: Option<String>,

    /// Client identity and topic `{id}`; takes precedence over GATEWAY_ID
    #[arg(long, env = "MQTT_CLIENT_ID")]
    pub mqtt_client_id: Option<String>,

    #[arg(long, env = "GATEWAY_ID")]
    pub gateway_id: Option<String>,

    #[arg(
        long,
        env = "MQTT_KEEPALIVE_SECS",
        default_value_t = defaults::KEEP_ALIVE_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub mqtt_keepalive_secs: u64,

    #[arg(
        long,
        env = "MQTT_RECONNECT_PERIOD_MS",
        default_value_t = defaults::RECONNECT_PERIOD_MS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub mqtt_reconnect_period_ms: u64,

    #[arg(
        long,
        env = "MQTT_CONNECT_TIMEOUT_MS",
        default_value_t = defaults::CONNECT_TIMEOUT_MS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub mqtt_connect_timeout_ms: u64,

    #[arg(
        long,
        env = "MQTT_MAX_RECONNECT_ATTEMPTS",
        default_value_t = defaults::MAX_RECONNECT_ATTEMPTS
    )]
    pub mqtt_max_reconnect_attempts: u32,

    #[arg(long, env = "MEDIAMTX_API_URL", default_value = "http://mediamtx:9997")]
    pub mediamtx_api_url: String,

    #[arg(long, env = "MEDIAMTX_USERNAME")]
    pub mediamtx_username: Option<String>,

    #[arg(long, env = "MEDIAMTX_PASSWORD", hide_env_values = true)]
    pub mediamtx_password: Option<String>,

    /// Host advertised in stream URLs
    #[arg(long, env = "MEDIAMTX_PUBLIC_HOST")]
    pub mediamtx_public_host: Option<String>,

    /// Cloud API base URL for the HTTP heartbeat
    #[arg(long, env = "CLOUD_API_URL")]
    pub cloud_api_url: Option<String>,

    #[arg(long, env = "EDGE_SHARED_TOKEN", hide_env_values = true)]
    pub edge_shared_token: Option<String>,

    #[arg(
        long,
        env = "CLOUD_HEARTBEAT_INTERVAL_SECS",
        default_value_t = defaults::CLOUD_HEARTBEAT_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub cloud_heartbeat_interval_secs: u64,

    #[arg(
        long,
        env = "CAMERA_POLL_INTERVAL_MS",
        default_value_t = defaults::POLL_INTERVAL_MS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub camera_poll_interval_ms: u64,

    #[arg(
        long,
        env = "HEARTBEAT_INTERVAL_SECS",
        default_value_t = defaults::HEARTBEAT_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub heartbeat_interval_secs: u64,

    #[arg(
        long,
        env = "PLAYBACK_PATH_TTL_SECS",
        default_value_t = defaults::PLAYBACK_PATH_TTL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub playback_path_ttl_secs: u64,

    #[arg(long, env = "RECORDINGS_DIR", default_value = "/recordings")]
    pub recordings_dir: PathBuf,

    /// Local introspection port
    #[arg(long, env = "HTTP_PORT", default_value_t = 8090)]
    pub http_port: u16,
}

/// Empty environment values count as unset
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<Cli> for AgentConfig {
    fn from(cli: Cli) -> Self {
        let mqtt_base = MqttConfig::default();
        let mediamtx_base = MediamtxConfig::default();

        let client_id = non_empty(cli.mqtt_client_id)
            .or_else(|| non_empty(cli.gateway_id))
            .unwrap_or(mqtt_base.client_id);

        let api_url = non_empty(Some(cli.mediamtx_api_url))
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(mediamtx_base.api_url);

        let cloud = match (non_empty(cli.cloud_api_url), non_empty(cli.edge_shared_token)) {
            (Some(api_url), Some(token)) => Some(CloudConfig {
                api_url: api_url.trim_end_matches('/').to_string(),
                token,
                interval: Duration::from_secs(cli.cloud_heartbeat_interval_secs),
            }),
            (Some(_), None) | (None, Some(_)) => {
                warn!("Cloud heartbeat needs both CLOUD_API_URL and EDGE_SHARED_TOKEN, disabled");
                None
            }
            (None, None) => None,
        };

        Self {
            site_id: non_empty(cli.edge_site_id).unwrap_or_else(|| "unknown-site".into()),
            location: non_empty(cli.edge_location).unwrap_or_else(|| "unknown-location".into()),
            mqtt: MqttConfig {
                host: cli.mqtt_host.trim().to_string(),
                port: cli.mqtt_port,
                username: non_empty(cli.mqtt_username),
                password: non_empty(cli.mqtt_password),
                client_id,
                keep_alive: Duration::from_secs(cli.mqtt_keepalive_secs),
                reconnect_period: Duration::from_millis(cli.mqtt_reconnect_period_ms),
                connect_timeout: Duration::from_millis(cli.mqtt_connect_timeout_ms),
                max_reconnect_attempts: cli.mqtt_max_reconnect_attempts,
            },
            mediamtx: MediamtxConfig {
                api_url,
                username: non_empty(cli.mediamtx_username),
                password: non_empty(cli.mediamtx_password),
                public_host: non_empty(cli.mediamtx_public_host)
                    .unwrap_or(mediamtx_base.public_host),
            },
            cloud,
            poll_interval: Duration::from_millis(cli.camera_poll_interval_ms),
            heartbeat_interval: Duration::from_secs(cli.heartbeat_interval_secs),
            playback_ttl: Duration::from_secs(cli.playback_path_ttl_secs),
            recordings_dir: cli.recordings_dir,
            http_port: cli.http_port,
        }
    }
}

/// Per-camera device-control credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraCredentials {
    pub ip: String,
    pub user: String,
    pub pass: String,
}

/// Credentials for every camera configured via `CAMERA_{KEY}_IP/_USER/_PASS`
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    cameras: HashMap<String, CameraCredentials>,
}

impl CredentialStore {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let mut cameras = HashMap::new();

        for (name, ip) in &vars {
            let Some(key) = name
                .strip_prefix("CAMERA_")
                .and_then(|rest| rest.strip_suffix("_IP"))
            else {
                continue;
            };
            if key.is_empty() || ip.trim().is_empty() {
                continue;
            }

            let user = vars
                .get(&format!("CAMERA_{}_USER", key))
                .cloned()
                .unwrap_or_else(|| "admin".into());
            let pass = vars
                .get(&format!("CAMERA_{}_PASS", key))
                .cloned()
                .unwrap_or_default();

            cameras.insert(
                key.to_string(),
                CameraCredentials {
                    ip: ip.trim().to_string(),
                    user,
                    pass,
                },
            );
        }

        Self { cameras }
    }

    /// Look up by device id (`cam-01` -> `CAM_01`)
    pub fn get(&self, camera_id: &str) -> Option<&CameraCredentials> {
        self.cameras.get(&Self::key(camera_id))
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    fn key(camera_id: &str) -> String {
        camera_id.to_uppercase().replace('-', "_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn parse(args: &[&str]) -> Result<AgentConfig, clap::Error> {
        let argv = std::iter::once("edge-agent").chain(args.iter().copied());
        Cli::try_parse_from(argv).map(AgentConfig::from)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.mqtt.max_reconnect_attempts, 10);
        assert_eq!(config.mqtt.keep_alive, Duration::from_secs(60));
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.playback_ttl, Duration::from_secs(7200));
    }

    #[test]
    fn test_overrides() {
        let config = parse(&[
            "--mqtt-host",
            "broker.example",
            "--mqtt-port",
            "8883",
            "--gateway-id",
            "gw-lobby",
            "--mqtt-max-reconnect-attempts",
            "3",
            "--mediamtx-api-url",
            "http://127.0.0.1:9997/",
            "--camera-poll-interval-ms",
            "2500",
            "--http-port",
            "9000",
        ])
        .unwrap();

        assert_eq!(config.mqtt.host, "broker.example");
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.mqtt.client_id, "gw-lobby");
        assert_eq!(config.mqtt.max_reconnect_attempts, 3);
        assert_eq!(config.mediamtx.api_url, "http://127.0.0.1:9997");
        assert_eq!(config.poll_interval, Duration::from_millis(2500));
        assert_eq!(config.http_port, 9000);
    }

    #[test]
    fn test_client_id_wins_over_gateway_id() {
        let config = parse(&["--gateway-id", "gw-a", "--mqtt-client-id", "gw-b"]).unwrap();
        assert_eq!(config.mqtt.client_id, "gw-b");
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        assert!(parse(&["--mqtt-port", "not-a-port"]).is_err());
        assert!(parse(&["--mqtt-port", "70000"]).is_err());
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        for flag in [
            "--camera-poll-interval-ms",
            "--heartbeat-interval-secs",
            "--cloud-heartbeat-interval-secs",
            "--mqtt-reconnect-period-ms",
            "--playback-path-ttl-secs",
        ] {
            let err = parse(&[flag, "0"]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation, "{flag}");
        }
        assert!(parse(&["--heartbeat-interval-secs", "1"]).is_ok());
    }

    #[test]
    fn test_empty_host_disables_bus() {
        let config = parse(&["--mqtt-host", ""]).unwrap();
        assert!(config.mqtt.host.is_empty());
    }

    #[test]
    fn test_credentials_require_both_halves() {
        let config = parse(&["--mqtt-username", "edge"]).unwrap();
        assert!(config.mqtt.credentials().is_none());

        let config = parse(&["--mqtt-username", "edge", "--mqtt-password", "secret"]).unwrap();
        assert_eq!(config.mqtt.credentials(), Some(("edge", "secret")));
    }

    #[test]
    fn test_cloud_requires_url_and_token() {
        let config = parse(&["--cloud-api-url", "https://cloud.example/api/"]).unwrap();
        assert!(config.cloud.is_none());

        let config = parse(&[
            "--cloud-api-url",
            "https://cloud.example/api/",
            "--edge-shared-token",
            "t0ken",
        ])
        .unwrap();
        let cloud = config.cloud.unwrap();
        assert_eq!(cloud.api_url, "https://cloud.example/api");
        assert_eq!(cloud.token, "t0ken");
        assert_eq!(cloud.interval, Duration::from_secs(60));
    }

    #[test]
    fn test_camera_credentials() {
        let store = CredentialStore::from_vars(vars(&[
            ("CAMERA_CAM_01_IP", "192.168.1.10"),
            ("CAMERA_CAM_01_PASS", "hunter2"),
            ("CAMERA_LOBBY_IP", "192.168.1.11"),
            ("CAMERA_LOBBY_USER", "operator"),
            ("CAMERA_BROKEN_IP", ""),
        ]));

        assert_eq!(store.len(), 2);
        assert!(!store.is_empty());
        assert!(CredentialStore::default().is_empty());
        let cam = store.get("cam-01").unwrap();
        assert_eq!(cam.ip, "192.168.1.10");
        assert_eq!(cam.user, "admin");
        assert_eq!(cam.pass, "hunter2");
        assert_eq!(store.get("lobby").unwrap().user, "operator");
        assert!(store.get("broken").is_none());
    }
}
