//! Gateway-level queries

use super::HandlerContext;
use crate::command::CommandResult;
use serde_json::json;
use tracing::info;

/// Handle `ping`
pub async fn handle_ping(ctx: &HandlerContext<'_>) -> CommandResult {
    Ok(json!({
        "pong": true,
        "gatewayId": ctx.gateway_id,
        "timestamp": edge_agent_shared::timestamp(),
    }))
}

/// Handle `listCameras`
pub async fn handle_list_cameras(ctx: &HandlerContext<'_>) -> CommandResult {
    let cameras = ctx.services.cameras.cameras().await;
    Ok(json!({ "count": cameras.len(), "cameras": cameras }))
}

/// Handle `refreshCameras`: run one reconciliation poll now
pub async fn handle_refresh_cameras(ctx: &HandlerContext<'_>) -> CommandResult {
    let seen = ctx.services.cameras.poll_once().await?;
    info!("[CMD] Camera refresh requested, {} cameras reported", seen);
    Ok(json!({ "refreshed": seen, "stats": ctx.services.cameras.stats().await }))
}

/// Handle `listLeases`
pub async fn handle_list_leases(ctx: &HandlerContext<'_>) -> CommandResult {
    let leases = ctx.services.leases.active().await;
    Ok(json!({ "count": leases.len(), "leases": leases }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::handlers::fakes;
    use serde_json::Value;

    #[tokio::test]
    async fn test_ping() {
        let h = fakes::harness();
        let params = Value::Null;
        let data = handle_ping(&fakes::context(&h.services, None, &params))
            .await
            .unwrap();
        assert_eq!(data["pong"], true);
        assert_eq!(data["gatewayId"], "gw1");
    }

    #[tokio::test]
    async fn test_list_leases() {
        let h = fakes::harness();
        h.services.leases.acquire("sdplay-cam-01-1", "rtsp://x").await.unwrap();

        let params = Value::Null;
        let data = handle_list_leases(&fakes::context(&h.services, None, &params))
            .await
            .unwrap();
        assert_eq!(data["count"], 1);
        assert_eq!(data["leases"][0]["name"], "sdplay-cam-01-1");
    }
}
