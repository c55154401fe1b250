//! MediaMTX API v3 adapter
//!
//! Serves as both the status source (path list) and the relay control plane
//! (dynamic path add/delete).

use super::{ClientError, RelayControl, Result, StatusSource};
use crate::config::MediamtxConfig;
use async_trait::async_trait;
use edge_agent_shared::PathDescriptor;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct PathList {
    #[serde(default)]
    items: Vec<PathDescriptor>,
}

/// HTTP client for the local MediaMTX instance
pub struct MediamtxClient {
    client: reqwest::Client,
    base_url: Url,
    auth: Option<(String, String)>,
}

impl MediamtxClient {
    pub fn new(config: &MediamtxConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let auth = match (&config.username, &config.password) {
            (Some(u), Some(p)) => Some((u.clone(), p.clone())),
            _ => None,
        };

        let base_url = Url::parse(&config.api_url).map_err(|e| {
            ClientError::Config(format!("Invalid MediaMTX API URL {}: {}", config.api_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "Invalid MediaMTX API URL {}",
                config.api_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            auth,
        })
    }

    /// API URL with each segment percent-encoded, so a name can never add
    /// path levels of its own
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.client.request(method, self.endpoint(segments));
        match &self.auth {
            Some((user, pass)) => builder.basic_auth(user, Some(pass)),
            None => builder,
        }
    }
}

async fn check(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    Err(ClientError::Status {
        context: context.to_string(),
        status: status.as_u16(),
        body: response.text().await.unwrap_or_default(),
    })
}

#[async_trait]
impl StatusSource for MediamtxClient {
    async fn list_paths(&self) -> Result<Vec<PathDescriptor>> {
        let response = self
            .request(Method::GET, &["v3", "paths", "list"])
            .send()
            .await?;
        let list: PathList = check(response, "List paths").await?.json().await?;
        debug!("[MEDIAMTX] {} paths listed", list.items.len());
        Ok(list.items)
    }
}

#[async_trait]
impl RelayControl for MediamtxClient {
    async fn add_path(&self, name: &str, source: &str) -> Result<()> {
        let response = self
            .request(Method::POST, &["v3", "config", "paths", "add", name])
            .json(&json!({
                "source": source,
                "sourceOnDemand": false,
                "record": false,
            }))
            .send()
            .await?;

        check(response, &format!("Add path \"{}\"", name)).await?;
        info!("[MEDIAMTX] Path added: {}", name);
        Ok(())
    }

    async fn delete_path(&self, name: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &["v3", "config", "paths", "delete", name])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(name.to_string()));
        }

        check(response, &format!("Delete path \"{}\"", name)).await?;
        info!("[MEDIAMTX] Path removed: {}", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, auth: bool) -> MediamtxClient {
        MediamtxClient::new(&MediamtxConfig {
            api_url: format!("{}/", server.uri()),
            username: auth.then(|| "api".to_string()),
            password: auth.then(|| "secret".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/paths/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "itemCount": 2,
                "items": [
                    {
                        "name": "Cam 01",
                        "source": { "type": "rtspSource", "id": "" },
                        "ready": true,
                        "tracks": ["H264"],
                        "bytesReceived": 1024,
                        "readers": [{ "type": "hlsMuxer" }]
                    },
                    { "name": "all_others", "ready": false }
                ]
            })))
            .mount(&server)
            .await;

        let paths = client(&server, false).list_paths().await.unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].name, "Cam 01");
        assert!(paths[0].ready);
        assert_eq!(paths[0].readers.len(), 1);
        assert_eq!(paths[0].bytes_received, 1024);
    }

    #[tokio::test]
    async fn test_list_paths_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/paths/list"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        match client(&server, false).list_paths().await {
            Err(ClientError::Status { status, body, .. }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_add_path_with_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/config/paths/add/sdplay-cam-01-1"))
            .and(header("authorization", "Basic YXBpOnNlY3JldA=="))
            .and(body_json(json!({
                "source": "rtsp://admin:pw@10.0.0.5/Streaming/tracks/101",
                "sourceOnDemand": false,
                "record": false
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, true)
            .add_path("sdplay-cam-01-1", "rtsp://admin:pw@10.0.0.5/Streaming/tracks/101")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_path_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v3/config/paths/delete/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v3/config/paths/delete/busy"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad"))
            .mount(&server)
            .await;

        let client = client(&server, false);
        assert!(matches!(
            client.delete_path("gone").await,
            Err(ClientError::NotFound(name)) if name == "gone"
        ));
        assert!(matches!(
            client.delete_path("busy").await,
            Err(ClientError::Status { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn test_path_names_stay_one_segment() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v3/config/paths/delete/cam-01"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        // Unmatched requests get wiremock's 404
        let result = client(&server, false).delete_path("sdplay-x/../cam-01").await;
        assert!(matches!(result, Err(ClientError::NotFound(_))));

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(
            received[0].url.path(),
            "/v3/config/paths/delete/sdplay-x%2F..%2Fcam-01"
        );
    }

    #[test]
    fn test_invalid_api_url() {
        let config = MediamtxConfig {
            api_url: "not a url".into(),
            ..Default::default()
        };
        assert!(matches!(MediamtxClient::new(&config), Err(ClientError::Config(_))));
    }
}
