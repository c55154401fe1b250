//! Recording search and ephemeral playback handlers

use super::HandlerContext;
use crate::command::{CommandError, CommandResult};
use edge_agent_shared::StreamUrls;
use serde_json::json;
use tracing::info;

/// Name prefix of every playback path created by `startPlayback`
pub const PLAYBACK_PREFIX: &str = "sdplay-";

/// Handle `searchRecordings`
pub async fn handle_search_recordings(ctx: &HandlerContext<'_>) -> CommandResult {
    let camera_id = ctx.camera_id()?;
    let start_time = ctx.required(&ctx.params.start_time, "startTime")?;
    let end_time = ctx.required(&ctx.params.end_time, "endTime")?;

    let recordings = ctx
        .services
        .device
        .search_recordings(camera_id, start_time, end_time)
        .await?;

    Ok(json!({
        "cameraId": camera_id,
        "count": recordings.len(),
        "recordings": recordings,
    }))
}

/// Handle `startPlayback`: re-stream a recorded segment through a leased relay path
pub async fn handle_start_playback(ctx: &HandlerContext<'_>) -> CommandResult {
    let camera_id = ctx.camera_id()?;
    let playback_uri = ctx.required(&ctx.params.playback_uri, "playbackUri")?;
    let services = ctx.services;

    let source = services.device.authorize_url(camera_id, playback_uri)?;
    let path_name = format!(
        "{}{}-{}",
        PLAYBACK_PREFIX,
        camera_id,
        services.next_playback_stamp()
    );

    let lease = services.leases.acquire(&path_name, &source).await?;
    let urls = StreamUrls::for_device(&services.public_host, &path_name);
    info!(
        "[CMD] {}: playback started for {}: {}",
        ctx.request_id, camera_id, path_name
    );

    Ok(json!({
        "pathName": path_name,
        "hlsUrl": urls.hls,
        "rtspUrl": urls.main,
        "expiresInSecs": services.leases.ttl().as_secs(),
        "expiresAt": lease.expires_at,
    }))
}

/// Handle `stopPlayback`. Stopping an already removed path succeeds.
pub async fn handle_stop_playback(ctx: &HandlerContext<'_>) -> CommandResult {
    let path_name = ctx.required_id(&ctx.params.path_name, "pathName")?;
    if !path_name.starts_with(PLAYBACK_PREFIX) {
        return Err(CommandError::InvalidParams(format!(
            "{} is not a playback path",
            path_name
        )));
    }

    info!("[CMD] {}: stopping playback {}", ctx.request_id, path_name);
    ctx.services.leases.release(path_name).await;
    Ok(json!({ "pathName": path_name, "stopped": true }))
}

/// Handle `listLocalRecordings`. Without a camera the whole directory is listed.
pub async fn handle_list_local_recordings(ctx: &HandlerContext<'_>) -> CommandResult {
    let camera_id = match ctx.topic_camera_id.or(ctx.params.camera_id.as_deref()) {
        Some(id) if !id.is_empty() => Some(ctx.camera_id()?),
        _ => None,
    };
    let files = ctx.services.recordings.list(camera_id).await?;
    Ok(json!({ "cameraId": camera_id, "count": files.len(), "files": files }))
}
