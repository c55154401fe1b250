//! Status request handlers

use super::HandlerContext;
use crate::command::{CommandError, CommandResult};
use serde_json::json;

/// Handle gateway `getStatus`
pub async fn handle_gateway_status(ctx: &HandlerContext<'_>) -> CommandResult {
    let services = ctx.services;
    let bus_state = *services.bus_state.borrow();

    Ok(json!({
        "gatewayId": ctx.gateway_id,
        "uptime": services.system.uptime_secs(),
        "mqtt": { "state": bus_state.label(), "connected": bus_state.is_connected() },
        "system": services.system.light_stats().await,
        "cameras": services.cameras.stats().await,
        "leases": services.leases.len().await,
    }))
}

/// Handle camera `getStatus`: the last known device record
pub async fn handle_camera_status(ctx: &HandlerContext<'_>) -> CommandResult {
    let camera_id = ctx.camera_id()?;
    let record = ctx
        .services
        .cameras
        .camera(camera_id)
        .await
        .ok_or_else(|| CommandError::UnknownCamera(camera_id.to_string()))?;

    Ok(serde_json::to_value(record).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::handlers::fakes;
    use crate::connection::ConnectionState;
    use edge_agent_shared::PathDescriptor;
    use serde_json::Value;

    #[tokio::test]
    async fn test_gateway_status_reports_bus_state() {
        let h = fakes::harness();
        h.state_tx.send_replace(ConnectionState::Abandoned);

        let params = Value::Null;
        let data = handle_gateway_status(&fakes::context(&h.services, None, &params))
            .await
            .unwrap();
        assert_eq!(data["mqtt"]["state"], "abandoned");
        assert_eq!(data["mqtt"]["connected"], false);
        assert_eq!(data["cameras"]["total"], 0);
    }

    #[tokio::test]
    async fn test_camera_status() {
        let h = fakes::harness();
        let path: PathDescriptor = serde_json::from_value(json!({
            "name": "cam-01", "ready": true, "tracks": ["H264"]
        }))
        .unwrap();
        h.services.cameras.process_paths(&[path]).await;

        let params = Value::Null;
        let data = handle_camera_status(&fakes::context(&h.services, Some("cam-01"), &params))
            .await
            .unwrap();
        assert_eq!(data["cameraId"], "cam-01");
        assert_eq!(data["online"], true);

        let err = handle_camera_status(&fakes::context(&h.services, Some("cam-02"), &params))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Camera cam-02 not found");
    }
}
