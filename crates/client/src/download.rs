//! Saving an item's generated images to disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ClientError;
use crate::queue::QueueItem;

/// Pause between consecutive downloads of one item.
pub const DEFAULT_PAUSE: Duration = Duration::from_millis(500);

/// `<stem>_var<k>.jpg`, with `k` one-based.
pub fn variation_file_name(stem: &str, k: usize) -> String {
    format!("{stem}_var{k}.jpg")
}

/// Outcome of [`Downloader::download_item`].
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Files written, in variation order.
    pub saved: Vec<PathBuf>,
    /// URLs that could not be fetched or written, with the reason.
    pub failed: Vec<(String, ClientError)>,
}

#[derive(Debug, Clone)]
pub struct Downloader {
    http: reqwest::Client,
    pause: Duration,
}

impl Downloader {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            pause: DEFAULT_PAUSE,
        }
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Write every successful result of `item` into `dir`.
    ///
    /// Failed attempts are skipped without using up a number. A URL that
    /// cannot be fetched or written keeps its number and is reported in
    /// [`DownloadReport::failed`]; the rest are still saved. Only a missing
    /// output directory fails the whole call.
    pub async fn download_item(&self, item: &QueueItem, dir: &Path) -> Result<DownloadReport, ClientError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| io_error(dir, source))?;

        let stem = item.target.stem();
        let mut report = DownloadReport::default();

        for (index, url) in item.success_urls().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.pause).await;
            }

            let path = dir.join(variation_file_name(stem, index + 1));
            match self.save(url, &path).await {
                Ok(len) => {
                    tracing::info!(path = %path.display(), bytes = len, "Saved variation");
                    report.saved.push(path);
                }
                Err(err) => {
                    tracing::warn!(url, error = %err, "Download failed, skipping");
                    report.failed.push((url.to_string(), err));
                }
            }
        }

        Ok(report)
    }

    async fn save(&self, url: &str, path: &Path) -> Result<usize, ClientError> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|source| io_error(path, source))?;
        Ok(bytes.len())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ClientError {
    ClientError::Io {
        path: path.display().to_string(),
        source,
    }
}
