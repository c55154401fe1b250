//! Command executor - validates, dispatches and replies to incoming commands

use super::handlers::{self, CommandParams, HandlerContext, Services};
use super::{Action, CommandDomain, CommandError, CommandResult};
use crate::connection::BusPublisher;
use crate::router::MessageHandler;
use anyhow::Result;
use async_trait::async_trait;
use edge_agent_shared::topics::is_valid_segment;
use edge_agent_shared::{now_ms, CommandEnvelope, CommandReply, PublishOptions, Topics};
use futures::FutureExt;
use serde_json::{json, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Executes commands received on the command topics
pub struct CommandExecutor {
    topics: Topics,
    bus: Arc<dyn BusPublisher>,
    services: Services,
}

impl CommandExecutor {
    pub fn new(topics: Topics, bus: Arc<dyn BusPublisher>, services: Services) -> Self {
        Self {
            topics,
            bus,
            services,
        }
    }

    /// Run one command and build its reply.
    ///
    /// Returns `None` when the command cannot be replied to (no usable
    /// `requestId`); such commands are dropped without running.
    pub async fn execute(&self, topic: &str, message: &Value) -> Option<CommandReply> {
        let envelope = CommandEnvelope::from_value(message);

        let Some(request_id) = envelope.request_id.as_deref() else {
            debug!("[CMD] Dropping command on {} without requestId", topic);
            return None;
        };
        if !is_valid_segment(request_id) {
            warn!("[CMD] Dropping command with unusable requestId {:?}", request_id);
            return None;
        }

        let start_time = now_ms();
        info!(
            "[CMD] Executing command: request={} action={} topic={}",
            request_id, envelope.action, topic
        );

        // A panicking handler still gets a failure reply
        let result = AssertUnwindSafe(self.dispatch(topic, request_id, &envelope))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                error!("[CMD] Handler panicked: {}: {}", request_id, message);
                Err(CommandError::Internal(message))
            });
        let processing_time = now_ms().saturating_sub(start_time);

        // Convert result to reply
        let reply = match result {
            Ok(data) => {
                info!("[CMD] Command completed: {} ({}ms)", request_id, processing_time);
                CommandReply::success(request_id, data)
            }
            Err(e) => {
                warn!("[CMD] Command failed: {}: {}", request_id, e);
                CommandReply::failure(request_id, e.to_string())
            }
        };
        Some(reply)
    }

    async fn dispatch(
        &self,
        topic: &str,
        request_id: &str,
        envelope: &CommandEnvelope,
    ) -> CommandResult {
        let gateway_id = self.topics.gateway_id();

        let Some(domain) = CommandDomain::from_topic(topic, gateway_id) else {
            return Err(CommandError::UnknownTopic(topic.to_string()));
        };

        let action = Action::parse(&envelope.action)
            .filter(|action| domain.allows(*action))
            .ok_or_else(|| CommandError::UnknownAction {
                domain: domain.name(),
                action: envelope.action.clone(),
            })?;

        let ctx = HandlerContext {
            gateway_id,
            request_id,
            topic_camera_id: domain.camera_id(),
            params: CommandParams::from_value(&envelope.params)?,
            raw_params: &envelope.params,
            services: &self.services,
        };

        // Dispatch to appropriate handler
        match (action, &domain) {
            (Action::Ping, _) => handlers::handle_ping(&ctx).await,
            (Action::GetStatus, CommandDomain::Gateway) => {
                handlers::handle_gateway_status(&ctx).await
            }
            (Action::GetStatus, _) => handlers::handle_camera_status(&ctx).await,
            (Action::ListCameras, _) => handlers::handle_list_cameras(&ctx).await,
            (Action::RefreshCameras, _) => handlers::handle_refresh_cameras(&ctx).await,
            (Action::ListLeases, _) => handlers::handle_list_leases(&ctx).await,
            (Action::PtzMove, _) => handlers::handle_ptz_move(&ctx).await,
            (Action::PtzStop, _) => handlers::handle_ptz_stop(&ctx).await,
            (Action::ListPresets, _) => handlers::handle_list_presets(&ctx).await,
            (Action::GotoPreset, _) => handlers::handle_goto_preset(&ctx).await,
            (Action::SearchRecordings, _) => handlers::handle_search_recordings(&ctx).await,
            (Action::StartPlayback, _) => handlers::handle_start_playback(&ctx).await,
            (Action::StopPlayback, _) => handlers::handle_stop_playback(&ctx).await,
            (Action::ListLocalRecordings, _) => {
                handlers::handle_list_local_recordings(&ctx).await
            }
            (Action::UpdateConfig, _) => handlers::handle_update_config(&ctx).await,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".into())
}

#[async_trait]
impl MessageHandler for CommandExecutor {
    async fn handle(&self, topic: &str, message: &Value) -> Result<()> {
        let Some(reply) = self.execute(topic, message).await else {
            return Ok(());
        };

        let reply_topic = self.topics.response(&reply.request_id);
        let payload = serde_json::to_value(&reply).unwrap_or_else(|e| {
            error!("[CMD] Cannot encode reply for {}: {}", reply.request_id, e);
            json!({
                "requestId": reply.request_id,
                "success": false,
                "error": format!("Internal error: reply encoding failed: {}", e),
                "timestamp": reply.timestamp,
            })
        });
        if !self
            .bus
            .publish(&reply_topic, payload, PublishOptions::default())
            .await
        {
            warn!("[CMD] Reply for {} dropped, bus not connected", reply.request_id);
        }
        Ok(())
    }
}
