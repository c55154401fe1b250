//! Topic layout and wildcard matching
//!
//! Every topic the gateway touches is rooted at its client id:
//! ```text
//! gateway/{id}/command          camera/{id}/{cam}/command
//! gateway/{id}/heartbeat        camera/{id}/{cam}/config
//! cmd/{id}/{domain}             camera/{id}/{cam}/{status|events|register|stats}
//! response/{id}/{requestId}
//! ```

/// Segment separator
pub const SEPARATOR: char = '/';

/// Single-level wildcard segment
pub const SINGLE_LEVEL: &str = "+";

/// Multi-level wildcard segment (only meaningful as the final segment)
pub const MULTI_LEVEL: &str = "#";

/// Command domains served under `cmd/{id}/`
pub const COMMAND_DOMAINS: [&str; 3] = ["isapi", "ptz", "recordings"];

/// Check whether `topic` matches the subscription `pattern`.
///
/// Returns true as soon as a `#` segment is reached, whatever follows it.
pub fn topic_matches(topic: &str, pattern: &str) -> bool {
    let topic_parts: Vec<&str> = topic.split(SEPARATOR).collect();
    let pattern_parts: Vec<&str> = pattern.split(SEPARATOR).collect();

    for (i, segment) in pattern_parts.iter().enumerate() {
        if *segment == MULTI_LEVEL {
            return true;
        }

        let Some(actual) = topic_parts.get(i) else {
            return false;
        };

        if *segment != SINGLE_LEVEL && segment != actual {
            return false;
        }
    }

    topic_parts.len() == pattern_parts.len()
}

/// Whether a string may be used as a single topic segment in a publish
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.contains(SEPARATOR)
        && !segment.contains(SINGLE_LEVEL)
        && !segment.contains(MULTI_LEVEL)
}

/// Builds the topics for one gateway identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    gateway_id: String,
}

impl Topics {
    pub fn new(gateway_id: impl Into<String>) -> Self {
        Self {
            gateway_id: gateway_id.into(),
        }
    }

    pub fn gateway_id(&self) -> &str {
        &self.gateway_id
    }

    /// Filters subscribed after every successful connect
    pub fn subscriptions(&self) -> Vec<String> {
        let mut topics = vec![
            self.gateway_command(),
            format!("camera/{}/+/command", self.gateway_id),
            format!("camera/{}/+/config", self.gateway_id),
        ];
        topics.extend(COMMAND_DOMAINS.iter().map(|d| self.command(d)));
        topics
    }

    pub fn gateway_command(&self) -> String {
        format!("gateway/{}/command", self.gateway_id)
    }

    pub fn heartbeat(&self) -> String {
        format!("gateway/{}/heartbeat", self.gateway_id)
    }

    pub fn command(&self, domain: &str) -> String {
        format!("cmd/{}/{}", self.gateway_id, domain)
    }

    pub fn camera_status(&self, camera_id: &str) -> String {
        self.camera(camera_id, "status")
    }

    pub fn camera_events(&self, camera_id: &str) -> String {
        self.camera(camera_id, "events")
    }

    pub fn camera_register(&self, camera_id: &str) -> String {
        self.camera(camera_id, "register")
    }

    pub fn camera_stats(&self, camera_id: &str) -> String {
        self.camera(camera_id, "stats")
    }

    pub fn response(&self, request_id: &str) -> String {
        format!("response/{}/{}", self.gateway_id, request_id)
    }

    fn camera(&self, camera_id: &str, leaf: &str) -> String {
        format!("camera/{}/{}/{}", self.gateway_id, camera_id, leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_level_wildcard() {
        assert!(topic_matches("camera/A/cam1/command", "camera/+/+/command"));
        assert!(!topic_matches("camera/A/cam1/command", "camera/+/command"));
        assert!(!topic_matches("a/b", "a/+/+"));
        assert!(topic_matches("a/x/c", "a/+/c"));
        assert!(!topic_matches("a/x/d", "a/+/c"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        assert!(topic_matches("a/b/c", "a/#"));
        assert!(topic_matches("a/b", "a/#"));
        assert!(topic_matches("a", "a/#"));
        assert!(topic_matches("anything/at/all", "#"));
        assert!(!topic_matches("b/c", "a/#"));
    }

    #[test]
    fn test_literal_match() {
        assert!(topic_matches("gateway/gw1/command", "gateway/gw1/command"));
        assert!(!topic_matches("gateway/gw1/command", "gateway/gw2/command"));
        assert!(!topic_matches("gateway/gw1/command/extra", "gateway/gw1/command"));
    }

    #[test]
    fn test_subscriptions_cover_command_topics() {
        let topics = Topics::new("gw1");
        let subs = topics.subscriptions();
        assert_eq!(subs.len(), 6);
        assert!(subs.iter().any(|s| topic_matches("camera/gw1/cam-01/config", s)));
        assert!(subs.iter().any(|s| topic_matches("cmd/gw1/ptz", s)));
        assert!(!subs.iter().any(|s| topic_matches("camera/gw1/cam-01/status", s)));
    }

    #[test]
    fn test_topic_builders() {
        let topics = Topics::new("gw1");
        assert_eq!(topics.heartbeat(), "gateway/gw1/heartbeat");
        assert_eq!(topics.camera_register("cam-01"), "camera/gw1/cam-01/register");
        assert_eq!(topics.response("req-7"), "response/gw1/req-7");
    }

    #[test]
    fn test_valid_segment() {
        assert!(is_valid_segment("req-1"));
        assert!(!is_valid_segment(""));
        assert!(!is_valid_segment("a/b"));
        assert!(!is_valid_segment("a+"));
        assert!(!is_valid_segment("#"));
    }
}
