//! File storage for generated images

use async_trait::async_trait;
use image::ImageFormat;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::error::ArtifactError;

/// Subdirectory of the media root holding generated images
pub const GENERATED_DIR: &str = "generated";

/// Reference to a stored artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    /// Storage handle relative to the media root, e.g. `generated/generated_1700000000_1a2b3c4d.png`
    pub path: String,
    /// Public URL the artifact is served under
    pub url: String,
}

/// Durable storage for generated images
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Normalize `bytes` to PNG and store them under a fresh name
    async fn save(&self, bytes: &[u8]) -> Result<ArtifactRef, ArtifactError>;

    /// Remove a stored artifact
    async fn delete(&self, artifact: &ArtifactRef) -> Result<(), ArtifactError>;

    /// Whether the artifact is present in storage
    async fn exists(&self, artifact: &ArtifactRef) -> bool;
}

/// Artifact store writing PNG files below a media root directory
pub struct FileArtifactStore {
    media_root: PathBuf,
    url_prefix: String,
}

impl FileArtifactStore {
    /// Create a new file store
    pub fn new(media_root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            media_root: media_root.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    /// Ensure the storage directory exists
    pub async fn ensure_storage_dir(&self) -> Result<(), ArtifactError> {
        let dir = self.media_root.join(GENERATED_DIR);
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            debug!(path = ?dir, "Created storage directory");
        }
        Ok(())
    }

    /// Absolute filesystem path of a storage handle
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative);
        // Handles are always plain relative paths produced by `save`
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        plain.then(|| self.media_root.join(relative))
    }

    fn url_for(&self, relative: &str) -> String {
        format!("{}/{}", self.url_prefix, relative)
    }
}

/// Decode arbitrary image bytes and re-encode them as PNG
pub fn normalize_png(bytes: &[u8]) -> Result<Vec<u8>, ArtifactError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| ArtifactError::Decode(e.to_string()))?;

    let mut png = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| ArtifactError::Encode(e.to_string()))?;
    Ok(png)
}

fn artifact_file_name() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("generated_{}_{}.png", secs, &suffix[..8])
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn save(&self, bytes: &[u8]) -> Result<ArtifactRef, ArtifactError> {
        let png = normalize_png(bytes)?;

        self.ensure_storage_dir().await?;

        let relative = format!("{}/{}", GENERATED_DIR, artifact_file_name());
        let file_path = self.media_root.join(&relative);

        fs::write(&file_path, &png).await?;

        debug!(path = ?file_path, size = png.len(), "Saved image file");

        Ok(ArtifactRef {
            url: self.url_for(&relative),
            path: relative,
        })
    }

    async fn delete(&self, artifact: &ArtifactRef) -> Result<(), ArtifactError> {
        let path = self.resolve(&artifact.path).ok_or_else(|| {
            ArtifactError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid artifact path '{}'", artifact.path),
            ))
        })?;
        fs::remove_file(&path).await?;
        debug!(path = ?path, "Deleted image file");
        Ok(())
    }

    async fn exists(&self, artifact: &ArtifactRef) -> bool {
        match self.resolve(&artifact.path) {
            Some(path) => fs::try_exists(&path).await.unwrap_or(false),
            None => false,
        }
    }
}
