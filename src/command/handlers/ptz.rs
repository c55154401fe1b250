//! PTZ control handlers

use super::HandlerContext;
use crate::clients::PtzVector;
use crate::command::CommandResult;
use serde_json::json;
use tracing::debug;

fn axis(value: Option<f64>) -> i32 {
    value.map(|v| v.round() as i32).unwrap_or(0)
}

/// Handle `ptzMove`. Each axis is clamped to -100..=100 and defaults to 0.
pub async fn handle_ptz_move(ctx: &HandlerContext<'_>) -> CommandResult {
    let camera_id = ctx.camera_id()?;
    let params = &ctx.params;
    let vector = PtzVector::clamped(axis(params.pan), axis(params.tilt), axis(params.zoom));

    ctx.services.device.ptz_move(camera_id, vector).await?;

    Ok(json!({
        "cameraId": camera_id,
        "pan": vector.pan,
        "tilt": vector.tilt,
        "zoom": vector.zoom,
    }))
}

/// Handle `ptzStop`
pub async fn handle_ptz_stop(ctx: &HandlerContext<'_>) -> CommandResult {
    let camera_id = ctx.camera_id()?;
    ctx.services.device.ptz_stop(camera_id).await?;
    Ok(json!({ "cameraId": camera_id, "stopped": true }))
}

/// Handle `listPresets`
pub async fn handle_list_presets(ctx: &HandlerContext<'_>) -> CommandResult {
    let camera_id = ctx.camera_id()?;
    let presets = ctx.services.device.list_presets(camera_id).await?;
    Ok(json!({ "cameraId": camera_id, "presets": presets }))
}

/// Handle `gotoPreset`
pub async fn handle_goto_preset(ctx: &HandlerContext<'_>) -> CommandResult {
    let camera_id = ctx.camera_id()?;
    let preset_id = ctx.required_id(&ctx.params.preset_id, "presetId")?;

    debug!("[CMD] {}: {} to preset {}", ctx.request_id, camera_id, preset_id);
    ctx.services.device.goto_preset(camera_id, preset_id).await?;
    Ok(json!({ "cameraId": camera_id, "presetId": preset_id }))
}
