mod clients;
mod command;
mod config;
mod connection;
mod http;
mod lease;
mod monitor;
mod router;
mod transport;

#[cfg(test)]
mod testing;

use anyhow::Result;
use clap::Parser;
use clients::{CloudClient, IsapiClient, LocalRecordings, MediamtxClient, SystemMonitor};
use command::handlers::Services;
use command::CommandExecutor;
use config::{AgentConfig, Cli, CredentialStore};
use connection::{ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState};
use edge_agent_shared::Topics;
use lease::LeaseManager;
use monitor::{CameraMonitor, CloudHeartbeat, HeartbeatPublisher};
use router::TopicRouter;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use transport::MqttConnector;

use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env file loaded: {}", e);
    }

    let config = AgentConfig::from(Cli::parse());
    let credentials = CredentialStore::from_env();
    let topics = Topics::new(config.mqtt.client_id.clone());

    info!("Edge gateway starting: {}", topics.gateway_id());
    info!("  Site: {} ({})", config.site_id, config.location);
    info!("  MQTT broker: {}:{}", config.mqtt.host, config.mqtt.port);
    info!("  MediaMTX API: {}", config.mediamtx.api_url);
    if credentials.is_empty() {
        warn!("  No CAMERA_*_IP configured, device control commands will fail");
    } else {
        info!("  Cameras with device credentials: {}", credentials.len());
    }

    let shutdown = CancellationToken::new();

    // Bus connection (disabled when no broker host is configured)
    let mut conn = if config.mqtt.host.is_empty() {
        warn!("MQTT_HOST is empty, running without a bus");
        ConnectionManager::disabled()
    } else {
        let connection_config = ConnectionConfig {
            subscriptions: topics.subscriptions(),
            reconnect_delay: config.mqtt.reconnect_period,
            connect_timeout: config.mqtt.connect_timeout,
            max_reconnect_attempts: config.mqtt.max_reconnect_attempts,
        };
        ConnectionManager::new(
            connection_config,
            MqttConnector::new(config.mqtt.clone()),
            shutdown.clone(),
        )
    };
    let bus = Arc::new(conn.handle());

    // Collaborators
    let mediamtx = Arc::new(MediamtxClient::new(&config.mediamtx)?);
    let device = Arc::new(IsapiClient::new(credentials)?);
    let recordings = Arc::new(LocalRecordings::new(config.recordings_dir.clone()));
    let system = Arc::new(SystemMonitor::new());

    // Core components
    let leases = LeaseManager::new(mediamtx.clone(), config.playback_ttl);
    let cameras = Arc::new(CameraMonitor::new(
        mediamtx.clone(),
        bus.clone(),
        topics.clone(),
        config.mediamtx.public_host.clone(),
        config.poll_interval,
    ));
    let heartbeat = Arc::new(HeartbeatPublisher::new(
        bus.clone(),
        topics.clone(),
        cameras.clone(),
        leases.clone(),
        system.clone(),
        config.heartbeat_interval,
    ));

    let executor = Arc::new(CommandExecutor::new(
        topics.clone(),
        bus.clone(),
        Services::new(
            device,
            recordings,
            leases.clone(),
            cameras.clone(),
            system.clone(),
            conn.state_rx(),
            config.mediamtx.public_host.clone(),
        ),
    ));

    let mut router = TopicRouter::new();
    for filter in topics.subscriptions() {
        router.on(filter, executor.clone());
    }
    info!("Routing: {}", router.patterns().join(", "));
    let router = Arc::new(router);

    let monitor_task = cameras.start(shutdown.clone());
    info!("Camera monitor started");
    let heartbeat_task = heartbeat.start(shutdown.clone());
    info!("Heartbeat started");

    let cloud_task = match &config.cloud {
        Some(cloud) => {
            let client = CloudClient::new(cloud)?;
            let cloud_heartbeat = Arc::new(CloudHeartbeat::new(
                client,
                config.site_id.clone(),
                config.location.clone(),
                cloud.interval,
            ));
            info!("Cloud heartbeat started: {}", cloud.api_url);
            Some(cloud_heartbeat.start(shutdown.clone()))
        }
        None => {
            debug!("Cloud heartbeat disabled");
            None
        }
    };

    let http_state = http::AppState {
        site_id: config.site_id.clone(),
        location: config.location.clone(),
        gateway_id: topics.gateway_id().to_string(),
        bus_state: conn.state_rx(),
        cameras: cameras.clone(),
        leases: leases.clone(),
        system,
    };
    let http_port = config.http_port;
    let http_shutdown = shutdown.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http::serve(http_state, http_port, http_shutdown).await {
            error!("[HTTP] Server error: {}", e);
        }
    });

    // Shutdown signal
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown requested");
        signal_shutdown.cancel();
    });

    // Main event loop
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = conn.recv() => match event {
                Some(ConnectionEvent::Connected) => {
                    info!("Connected to broker");
                }
                Some(ConnectionEvent::Disconnected { reason }) => {
                    warn!("Disconnected: {}", reason);
                }
                Some(ConnectionEvent::ConnectionFailed { reason }) => {
                    error!("Connection failed: {}", reason);
                }
                Some(ConnectionEvent::Abandoned { attempts }) => {
                    error!(
                        "Broker unreachable after {} reconnect attempts; local HTTP stays up",
                        attempts
                    );
                }
                Some(ConnectionEvent::Received { topic, message }) => {
                    let router = router.clone();
                    tokio::spawn(async move {
                        router.dispatch(&topic, message).await;
                    });
                }
                None => {
                    // Bus gone for good; keep serving local introspection
                    shutdown.cancelled().await;
                    break;
                }
            }
        }
    }

    leases.shutdown().await;
    let _ = tokio::join!(monitor_task, heartbeat_task, http_task);
    if let Some(task) = cloud_task {
        let _ = task.await;
    }

    // Let the connection loop send DISCONNECT
    let mut bus_state = conn.state_rx();
    if !config.mqtt.host.is_empty() {
        let closed = tokio::time::timeout(
            Duration::from_secs(2),
            bus_state.wait_for(|s| matches!(s, ConnectionState::Closed | ConnectionState::Abandoned)),
        )
        .await;
        if closed.is_err() {
            warn!("Bus did not close in time ({})", conn.state().label());
        }
    }

    info!("Edge gateway stopped");
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
