//! `.info.json` metadata sidecar writer.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::item::DownloadedItem;

use super::{PostProcessError, PostProcessor, ProcessContext};

const NAME: &str = "info-json";

/// Derives the sidecar path: `video.flv` → `video.info.json`.
#[must_use]
pub fn info_json_path(downloaded: &Path) -> PathBuf {
    downloaded.with_extension("info.json")
}

/// Writes item metadata next to the downloaded file.
///
/// An existing sidecar is never overwritten; the item passes on unchanged
/// with a warning.
#[derive(Debug, Default)]
pub struct InfoJsonWriter;

impl InfoJsonWriter {
    /// Creates the writer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PostProcessor for InfoJsonWriter {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip_all, fields(path = %item.filepath.display()))]
    async fn run(
        &self,
        item: DownloadedItem,
        ctx: &ProcessContext<'_>,
    ) -> Result<Option<DownloadedItem>, PostProcessError> {
        let path = info_json_path(&item.filepath);
        let json = serde_json::to_vec_pretty(&item).map_err(|source| {
            PostProcessError::Serialize {
                processor: NAME.to_string(),
                source,
            }
        })?;
        let io_error = |source: std::io::Error| PostProcessError::Io {
            processor: NAME.to_string(),
            path: path.clone(),
            source,
        };

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                ctx.notifier.warning(&format!(
                    "{} already exists; not overwriting",
                    path.display()
                ));
                return Ok(Some(item));
            }
            Err(err) => return Err(io_error(err)),
        };
        ctx.notifier
            .to_screen(&format!("[info] Writing metadata to {}", path.display()));
        file.write_all(&json).await.map_err(io_error)?;
        file.flush().await.map_err(io_error)?;

        debug!(path = %path.display(), "Info JSON written");
        Ok(Some(item))
    }
}
