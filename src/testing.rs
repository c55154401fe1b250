//! In-process fakes shared by unit tests

use crate::connection::BusPublisher;
use async_trait::async_trait;
use edge_agent_shared::PublishOptions;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub payload: Value,
    pub options: PublishOptions,
}

/// Records every publication; connected unless told otherwise
pub struct RecordingBus {
    published: Mutex<Vec<Published>>,
    connected: AtomicBool,
}

impl Default for RecordingBus {
    fn default() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
        }
    }
}

impl RecordingBus {
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    pub fn on_topic(&self, topic: &str) -> Vec<Published> {
        self.published()
            .into_iter()
            .filter(|p| p.topic == topic)
            .collect()
    }

    pub fn topics(&self) -> Vec<String> {
        self.published().into_iter().map(|p| p.topic).collect()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }
}

#[async_trait]
impl BusPublisher for RecordingBus {
    async fn publish(&self, topic: &str, payload: Value, options: PublishOptions) -> bool {
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }
        self.published.lock().unwrap().push(Published {
            topic: topic.to_string(),
            payload,
            options,
        });
        true
    }
}
