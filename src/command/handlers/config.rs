//! Camera configuration handler

use super::HandlerContext;
use crate::command::CommandResult;
use serde_json::json;
use tracing::info;

/// Handle `updateConfig`. The update is acknowledged and logged; nothing is
/// applied to the device.
pub async fn handle_update_config(ctx: &HandlerContext<'_>) -> CommandResult {
    let camera_id = ctx.camera_id()?;
    let keys: Vec<&str> = ctx
        .raw_params
        .as_object()
        .map(|m| m.keys().map(String::as_str).collect())
        .unwrap_or_default();

    info!(
        "[CMD] Config update for {} received ({} entries): {:?}",
        camera_id,
        keys.len(),
        keys
    );

    Ok(json!({
        "cameraId": camera_id,
        "received": keys,
        "applied": false,
    }))
}
