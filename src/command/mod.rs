//! Command/response correlation
//!
//! This module handles:
//! - Parsing `{requestId, action, params}` envelopes from command topics
//! - Dispatching each action to exactly one handler
//! - Publishing exactly one correlated reply per request

mod action;
mod executor;
pub mod handlers;

pub use action::{Action, CommandDomain};
pub use executor::CommandExecutor;

use crate::clients::ClientError;
use serde_json::Value;
use thiserror::Error;

/// Why a command could not be completed. The message becomes the reply `error`.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown {domain} action: {action}")]
    UnknownAction { domain: &'static str, action: String },

    #[error("No command domain for topic {0}")]
    UnknownTopic(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Camera {0} not found")]
    UnknownCamera(String),

    /// Collaborator failure, reported with the collaborator's own message
    #[error("{0}")]
    Collaborator(#[from] ClientError),

    /// The handler panicked
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Outcome of one handler invocation
pub type CommandResult = Result<Value, CommandError>;
