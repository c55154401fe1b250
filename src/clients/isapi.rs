//! Hikvision ISAPI device control
//!
//! Flat XML over HTTP with basic auth. Responses are small and shallow, so
//! tags are pulled out with plain string scanning instead of a full parser.

use super::{ClientError, DeviceControl, PtzPreset, PtzVector, RecordingSegment, Result};
use crate::config::{CameraCredentials, CredentialStore};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// Main-stream recording track
const RECORDING_TRACK_ID: u32 = 101;
const MAX_SEARCH_RESULTS: u32 = 200;

pub struct IsapiClient {
    client: reqwest::Client,
    credentials: CredentialStore,
}

impl IsapiClient {
    pub fn new(credentials: CredentialStore) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            credentials,
        })
    }

    fn camera(&self, camera_id: &str) -> Result<&CameraCredentials> {
        self.credentials
            .get(camera_id)
            .ok_or_else(|| ClientError::Config(format!("No IP configured for camera {}", camera_id)))
    }

    fn request(
        &self,
        camera: &CameraCredentials,
        method: Method,
        segments: &[&str],
        timeout: Duration,
    ) -> Result<RequestBuilder> {
        Ok(self
            .client
            .request(method, endpoint(&camera.ip, segments)?)
            .basic_auth(&camera.user, Some(&camera.pass))
            .timeout(timeout))
    }

    async fn put_xml(
        &self,
        camera_id: &str,
        segments: &[&str],
        body: String,
        context: &str,
    ) -> Result<()> {
        let camera = self.camera(camera_id)?;
        let response = self
            .request(camera, Method::PUT, segments, CONTROL_TIMEOUT)?
            .header("Content-Type", "application/xml")
            .body(body)
            .send()
            .await?;
        check(response, context).await?;
        Ok(())
    }
}

/// Device URL with each segment percent-encoded
fn endpoint(host: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(&format!("http://{}/", host))
        .map_err(|e| ClientError::Config(format!("Invalid camera address {}: {}", host, e)))?;
    url.path_segments_mut()
        .map_err(|_| ClientError::Config(format!("Invalid camera address {}", host)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Escape text for use inside an XML element
fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
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

fn search_body(search_id: &str, start_time: &str, end_time: &str) -> String {
    let start_time = xml_escape(start_time);
    let end_time = xml_escape(end_time);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<CMSearchDescription>
  <searchID>{search_id}</searchID>
  <trackIDList>
    <TrackID>
      <id>{RECORDING_TRACK_ID}</id>
    </TrackID>
  </trackIDList>
  <timeSpanList>
    <timeSpan>
      <startTime>{start_time}</startTime>
      <endTime>{end_time}</endTime>
    </timeSpan>
  </timeSpanList>
  <maxResults>{MAX_SEARCH_RESULTS}</maxResults>
  <searchResultPostion>0</searchResultPostion>
  <metadataList>
    <metadata>
      <Value>Metadata/Video</Value>
    </metadata>
  </metadataList>
</CMSearchDescription>"#
    )
}

fn ptz_body(vector: PtzVector) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<PTZData>
  <pan>{}</pan>
  <tilt>{}</tilt>
  <zoom>{}</zoom>
</PTZData>"#,
        vector.pan, vector.tilt, vector.zoom
    )
}

/// Locate the next opening `<tag>` (attributes allowed) at or after `from`.
/// Returns (start of the tag, index just past its `>`).
fn find_open_tag(xml: &str, tag: &str, from: usize) -> Option<(usize, usize)> {
    let pattern = format!("<{}", tag);
    let mut pos = from;

    while let Some(offset) = xml[pos..].find(&pattern) {
        let start = pos + offset;
        let after = start + pattern.len();
        let rest = &xml[after..];

        match rest.chars().next() {
            Some('>') => return Some((start, after + 1)),
            Some(c) if c.is_whitespace() => {
                let close = rest.find('>')?;
                // Self-closing tags carry no text
                if !rest[..close].ends_with('/') {
                    return Some((start, after + close + 1));
                }
            }
            _ => {}
        }
        pos = after;
    }
    None
}

/// Text of the first `<tag>` element, trimmed
pub fn extract_tag(xml: &str, tag: &str) -> Option<String> {
    let (_, content_start) = find_open_tag(xml, tag, 0)?;
    let close = format!("</{}>", tag);
    let end = xml[content_start..].find(&close)?;
    Some(xml[content_start..content_start + end].trim().to_string())
}

/// Inner text of every `<tag>` element, in document order
pub fn extract_all_tags(xml: &str, tag: &str) -> Vec<String> {
    let close = format!("</{}>", tag);
    let mut results = Vec::new();
    let mut pos = 0;

    while let Some((_, content_start)) = find_open_tag(xml, tag, pos) {
        let Some(end) = xml[content_start..].find(&close) else {
            break;
        };
        results.push(xml[content_start..content_start + end].trim().to_string());
        pos = content_start + end + close.len();
    }
    results
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Segments missing any of start, end or URI are skipped
fn parse_search_results(xml: &str) -> Vec<RecordingSegment> {
    extract_all_tags(xml, "searchMatchItem")
        .iter()
        .filter_map(|item| {
            Some(RecordingSegment {
                start_time: non_empty(extract_tag(item, "startTime"))?,
                end_time: non_empty(extract_tag(item, "endTime"))?,
                playback_uri: non_empty(extract_tag(item, "playbackURI"))?,
            })
        })
        .collect()
}

fn parse_presets(xml: &str) -> Vec<PtzPreset> {
    extract_all_tags(xml, "PTZPreset")
        .iter()
        .filter_map(|block| {
            let id = non_empty(extract_tag(block, "id"))?;
            let name = non_empty(extract_tag(block, "presetName"))
                .unwrap_or_else(|| format!("Preset {}", id));
            Some(PtzPreset { id, name })
        })
        .collect()
}

#[async_trait]
impl DeviceControl for IsapiClient {
    async fn search_recordings(
        &self,
        camera_id: &str,
        start_time: &str,
        end_time: &str,
    ) -> Result<Vec<RecordingSegment>> {
        let camera = self.camera(camera_id)?;
        let search_id = format!("search-{}", edge_agent_shared::now_ms());

        let response = self
            .request(
                camera,
                Method::POST,
                &["ISAPI", "ContentMgmt", "search"],
                SEARCH_TIMEOUT,
            )?
            .header("Content-Type", "application/xml")
            .body(search_body(&search_id, start_time, end_time))
            .send()
            .await?;
        let xml = check(response, "Recording search").await?.text().await?;

        let segments = parse_search_results(&xml);
        debug!("[ISAPI] {} segments found on {}", segments.len(), camera_id);
        Ok(segments)
    }

    async fn ptz_move(&self, camera_id: &str, vector: PtzVector) -> Result<()> {
        self.put_xml(
            camera_id,
            &["ISAPI", "PTZCtrl", "channels", "1", "continuous"],
            ptz_body(vector),
            "PTZ move",
        )
        .await?;
        debug!("[ISAPI] PTZ {:?} on {}", vector, camera_id);
        Ok(())
    }

    async fn list_presets(&self, camera_id: &str) -> Result<Vec<PtzPreset>> {
        let camera = self.camera(camera_id)?;
        let response = self
            .request(
                camera,
                Method::GET,
                &["ISAPI", "PTZCtrl", "channels", "1", "presets"],
                CONTROL_TIMEOUT,
            )?
            .send()
            .await?;
        let xml = check(response, "List presets").await?.text().await?;
        Ok(parse_presets(&xml))
    }

    async fn goto_preset(&self, camera_id: &str, preset_id: &str) -> Result<()> {
        self.put_xml(
            camera_id,
            &["ISAPI", "PTZCtrl", "channels", "1", "presets", preset_id, "goto"],
            String::new(),
            "Goto preset",
        )
        .await?;
        info!("[ISAPI] {} moved to preset {}", camera_id, preset_id);
        Ok(())
    }

    fn authorize_url(&self, camera_id: &str, url: &str) -> Result<String> {
        let mut parsed =
            Url::parse(url).map_err(|e| ClientError::Parse(format!("{}: {}", url, e)))?;
        if !parsed.username().is_empty() {
            return Ok(url.to_string());
        }

        let camera = self.camera(camera_id)?;
        parsed
            .set_username(&camera.user)
            .and_then(|_| parsed.set_password(Some(&camera.pass)))
            .map_err(|_| ClientError::Parse(format!("Cannot add credentials to {}", url)))?;
        Ok(parsed.to_string())
    }
}
