//! Command envelope and correlated reply

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound command `{requestId, action, params}`.
///
/// Parsing is lenient: anything missing is left empty so the caller can
/// still decide whether a reply is possible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandEnvelope {
    pub request_id: Option<String>,
    pub action: String,
    pub params: Value,
}

impl CommandEnvelope {
    pub fn from_value(message: &Value) -> Self {
        let request_id = match message.get("requestId") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Self {
            request_id,
            action: message
                .get("action")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            params: message.get("params").cloned().unwrap_or(Value::Null),
        }
    }
}

/// The single reply published for a correlated command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReply {
    pub request_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

impl CommandReply {
    pub fn success(request_id: impl Into<String>, data: Value) -> Self {
        Self {
            request_id: request_id.into(),
            success: true,
            data: Some(data),
            error: None,
            timestamp: crate::timestamp(),
        }
    }

    pub fn failure(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            success: false,
            data: None,
            error: Some(error.into()),
            timestamp: crate::timestamp(),
        }
    }
}
