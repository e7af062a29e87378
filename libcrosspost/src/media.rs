//! Local image handling shared by the platform adapters

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{MediaError, Result};
use crate::types::ImageMimeType;

const OCTET_STREAM: &str = "application/octet-stream";

/// A local image file whose contents have already been read into memory.
///
/// No format validation happens here; the MIME type is only a hint taken
/// from the file extension and the platform decides whether to accept it.
#[derive(Clone, PartialEq, Eq)]
pub struct LocalImage {
    path: PathBuf,
    mime_type: Option<ImageMimeType>,
    bytes: Vec<u8>,
}

impl std::fmt::Debug for LocalImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalImage")
            .field("path", &self.path)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl LocalImage {
    /// Open an image by path and read it whole.
    ///
    /// Fails if the file is missing, is not a regular file or cannot be
    /// read, so callers learn about a bad image before any upload starts.
    pub async fn open(path: &Path) -> Result<Self> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| io_to_media_error(path, e))?;

        if !metadata.is_file() {
            return Err(MediaError::Unreadable(format!(
                "{} is not a regular file",
                path.display()
            ))
            .into());
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| io_to_media_error(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            mime_type: ImageMimeType::from_path(path),
            bytes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// MIME type string sent to the platform
    pub fn mime_str(&self) -> &'static str {
        self.mime_type.map(|m| m.as_str()).unwrap_or(OCTET_STREAM)
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

fn io_to_media_error(path: &Path, error: std::io::Error) -> MediaError {
    match error.kind() {
        ErrorKind::NotFound => MediaError::NotFound(path.display().to_string()),
        _ => MediaError::Unreadable(format!("{}: {}", path.display(), error)),
    }
}
