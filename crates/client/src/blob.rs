//! In-memory image files picked by the user.

use std::path::Path;
use std::sync::Arc;

use swapdeck_core::uploads::{sniff_image_mime, FALLBACK_CONTENT_TYPE};

use crate::error::ClientError;

/// Extensions accepted when scanning a directory for targets.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// An image held in memory. Cloning shares the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    /// File name as picked, including extension.
    pub name: String,
    pub bytes: Arc<[u8]>,
    pub content_type: &'static str,
}

impl ImageBlob {
    /// Wrap raw bytes, sniffing the content type from the data.
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        let content_type = sniff_image_mime(&bytes).unwrap_or(FALLBACK_CONTENT_TYPE);
        Self {
            name: name.into(),
            bytes,
            content_type,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, ClientError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".into());
        Ok(Self::new(name, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File name without its last extension.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }
}

/// Load every image file directly inside `dir`, sorted by file name.
pub async fn load_dir(dir: &Path) -> Result<Vec<ImageBlob>, ClientError> {
    let io_err = |source| ClientError::Io {
        path: dir.display().to_string(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_image && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut blobs = Vec::with_capacity(paths.len());
    for path in paths {
        blobs.push(ImageBlob::from_path(&path).await?);
    }
    Ok(blobs)
}
