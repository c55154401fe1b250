//! Local recordings directory lister

use super::{ClientError, LocalRecording, RecordingsLister, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

pub struct LocalRecordings {
    root: PathBuf,
}

impl LocalRecordings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl RecordingsLister for LocalRecordings {
    async fn list(&self, camera_id: Option<&str>) -> Result<Vec<LocalRecording>> {
        let dir = match camera_id {
            Some(id) => {
                let relative = Path::new(id);
                let contained = !id.is_empty()
                    && relative
                        .components()
                        .all(|c| matches!(c, Component::Normal(_)));
                if !contained {
                    return Err(ClientError::Config(format!(
                        "Camera directory must stay under the recordings root: {:?}",
                        id
                    )));
                }
                self.root.join(relative)
            }
            None => self.root.clone(),
        };

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files: Vec<(SystemTime, LocalRecording)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((
                modified,
                LocalRecording {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    size_bytes: metadata.len(),
                    modified: DateTime::<Utc>::from(modified)
                        .to_rfc3339_opts(SecondsFormat::Secs, true),
                },
            ));
        }

        // Newest first
        files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(&b.1.name)));
        Ok(files.into_iter().map(|(_, recording)| recording).collect())
    }
}
