//! Cloud API heartbeat over HTTP

use super::{ClientError, Result};
use crate::config::CloudConfig;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const TOKEN_HEADER: &str = "x-edge-token";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteHeartbeat<'a> {
    pub site_id: &'a str,
    pub location: &'a str,
    pub source: &'static str,
    pub timestamp: String,
}

impl<'a> SiteHeartbeat<'a> {
    pub fn now(site_id: &'a str, location: &'a str) -> Self {
        Self {
            site_id,
            location,
            source: "edge-agent",
            timestamp: edge_agent_shared::timestamp(),
        }
    }
}

pub struct CloudClient {
    client: reqwest::Client,
    heartbeat_url: Url,
    token: String,
}

impl CloudClient {
    pub fn new(config: &CloudConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let mut heartbeat_url = Url::parse(&config.api_url).map_err(|e| {
            ClientError::Config(format!("Invalid cloud API URL {}: {}", config.api_url, e))
        })?;
        heartbeat_url
            .path_segments_mut()
            .map_err(|_| ClientError::Config(format!("Invalid cloud API URL {}", config.api_url)))?
            .pop_if_empty()
            .extend(["edge", "heartbeat"]);

        Ok(Self {
            client,
            heartbeat_url,
            token: config.token.clone(),
        })
    }

    pub async fn send_heartbeat(&self, heartbeat: &SiteHeartbeat<'_>) -> Result<()> {
        let response = self
            .client
            .post(self.heartbeat_url.clone())
            .header(TOKEN_HEADER, &self.token)
            .json(heartbeat)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                context: "Cloud heartbeat".into(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        debug!("[CLOUD] Heartbeat accepted for {}", heartbeat.site_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(uri: String) -> CloudClient {
        CloudClient::new(&CloudConfig {
            api_url: uri,
            token: "t0ken".into(),
            interval: Duration::from_secs(60),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_heartbeat_posts_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/edge/heartbeat"))
            .and(header("x-edge-token", "t0ken"))
            .and(body_partial_json(serde_json::json!({
                "siteId": "site-7",
                "location": "Dock",
                "source": "edge-agent",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(format!("{}/api", server.uri()));
        client
            .send_heartbeat(&SiteHeartbeat::now("site-7", "Dock"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejected_heartbeat_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        let err = client
            .send_heartbeat(&SiteHeartbeat::now("site-7", "Dock"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 401, .. }));

        let received = server.received_requests().await.unwrap();
        assert_eq!(received[0].url.path(), "/edge/heartbeat");
    }

    #[test]
    fn test_invalid_url() {
        let result = CloudClient::new(&CloudConfig {
            api_url: "mailto:ops@example.com".into(),
            token: "t".into(),
            interval: Duration::from_secs(60),
        });
        assert!(matches!(result, Err(ClientError::Config(_))));
    }
}
