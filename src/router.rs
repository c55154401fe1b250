//! Topic router - fans decoded bus messages out to pattern-registered handlers

use anyhow::Result;
use async_trait::async_trait;
use edge_agent_shared::topic_matches;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// A consumer of decoded inbound messages
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, topic: &str, message: &Value) -> Result<()>;
}

struct Route {
    pattern: String,
    handler: Arc<dyn MessageHandler>,
}

/// Pattern -> handler table, built once during startup
#[derive(Default)]
pub struct TopicRouter {
    routes: Vec<Route>,
}

impl TopicRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a topic pattern (`+` and trailing `#` allowed)
    pub fn on(&mut self, pattern: impl Into<String>, handler: Arc<dyn MessageHandler>) -> &mut Self {
        let pattern = pattern.into();
        debug!("[ROUTER] Registered handler for {}", pattern);
        self.routes.push(Route { pattern, handler });
        self
    }

    /// Patterns currently registered
    pub fn patterns(&self) -> Vec<String> {
        self.routes.iter().map(|r| r.pattern.clone()).collect()
    }

    /// Run every handler whose pattern matches `topic` and return how many ran.
    ///
    /// Each handler runs as its own task so a failing or panicking handler
    /// cannot stop the others.
    pub async fn dispatch(&self, topic: &str, message: Value) -> usize {
        let message = Arc::new(message);
        let mut tasks = Vec::new();

        for route in self.routes.iter().filter(|r| topic_matches(topic, &r.pattern)) {
            let handler = route.handler.clone();
            let pattern = route.pattern.clone();
            let topic = topic.to_string();
            let message = message.clone();

            tasks.push(tokio::spawn(async move {
                if let Err(e) = handler.handle(&topic, &message).await {
                    error!("[ROUTER] Handler for {} failed on {}: {:#}", pattern, topic, e);
                }
            }));
        }

        if tasks.is_empty() {
            debug!("[ROUTER] No handler for {}", topic);
            return 0;
        }

        let matched = tasks.len();
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                warn!("[ROUTER] Handler task aborted on {}: {}", topic, e);
            }
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageHandler for Recorder {
        async fn handle(&self, topic: &str, _message: &Value) -> Result<()> {
            self.seen.lock().unwrap().push(topic.to_string());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl MessageHandler for Failing {
        async fn handle(&self, _topic: &str, _message: &Value) -> Result<()> {
            bail!("collaborator down")
        }
    }

    struct Panicking;

    #[async_trait]
    impl MessageHandler for Panicking {
        async fn handle(&self, _topic: &str, _message: &Value) -> Result<()> {
            panic!("handler bug")
        }
    }

    #[tokio::test]
    async fn test_all_matching_handlers_run() {
        let specific = Arc::new(Recorder::default());
        let wildcard = Arc::new(Recorder::default());
        let other = Arc::new(Recorder::default());

        let mut router = TopicRouter::new();
        router
            .on("camera/gw1/+/command", specific.clone())
            .on("camera/#", wildcard.clone())
            .on("gateway/gw1/command", other.clone());

        let matched = router
            .dispatch("camera/gw1/cam1/command", Value::Null)
            .await;

        assert_eq!(matched, 2);
        assert_eq!(specific.seen.lock().unwrap().len(), 1);
        assert_eq!(wildcard.seen.lock().unwrap().len(), 1);
        assert!(other.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_handlers_are_isolated() {
        let recorder = Arc::new(Recorder::default());

        let mut router = TopicRouter::new();
        router
            .on("cmd/gw1/ptz", Arc::new(Failing))
            .on("cmd/gw1/+", Arc::new(Panicking))
            .on("cmd/#", recorder.clone());

        assert_eq!(router.dispatch("cmd/gw1/ptz", Value::Null).await, 3);
        assert_eq!(recorder.seen.lock().unwrap().as_slice(), ["cmd/gw1/ptz"]);
    }

    #[tokio::test]
    async fn test_unmatched_topic() {
        let mut router = TopicRouter::new();
        router.on("gateway/gw1/command", Arc::new(Recorder::default()));

        assert_eq!(router.dispatch("gateway/gw2/command", Value::Null).await, 0);
        assert_eq!(router.patterns(), vec!["gateway/gw1/command".to_string()]);
    }
}
