//! Photo storage
//!
//! Files are named by the SHA-256 of their content, so identical uploads
//! resolve to the same reference. Payloads must decode as PNG, JPEG or WebP;
//! the stored extension follows the decoded format.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::ImageFormat;
use sha2::{Digest, Sha256};
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Maximum file size (5MB)
pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

/// Supported image formats
const SUPPORTED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp"];

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Empty file")]
    Empty,
    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
    #[error("Unsupported format: {0}. Supported: png, jpg, jpeg, webp")]
    UnsupportedFormat(String),
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Failed to store file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BlobError> for AppError {
    fn from(e: BlobError) -> Self {
        let code = match &e {
            BlobError::Empty => ErrorCode::EmptyFile,
            BlobError::TooLarge { .. } => ErrorCode::FileTooLarge,
            BlobError::UnsupportedFormat(_) => ErrorCode::UnsupportedFileFormat,
            BlobError::InvalidImage(_) => ErrorCode::InvalidImage,
            BlobError::Io(io) => {
                tracing::error!(error = %io, "Blob write failed");
                return AppError::new(ErrorCode::FileStorageFailed);
            }
        };
        AppError::with_message(code, e.to_string())
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `data` and return a public reference (URL)
    async fn save(
        &self,
        data: &[u8],
        original_name: &str,
        content_type: Option<&str>,
    ) -> Result<String, BlobError>;
}

/// Local directory served under `public_base_url`
pub struct LocalBlobStore {
    dir: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Lowercase extension from the file name, falling back to the content type
fn detect_extension(original_name: &str, content_type: Option<&str>) -> String {
    let from_name = std::path::Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    if let Some(ext) = from_name {
        return ext;
    }
    match content_type {
        Some("image/png") => "png".into(),
        Some("image/jpeg") => "jpg".into(),
        Some("image/webp") => "webp".into(),
        _ => String::new(),
    }
}

/// Decode `data`; returns the extension of the detected format
fn validate_image(data: &[u8]) -> Result<&'static str, BlobError> {
    let format = image::guess_format(data).map_err(|e| BlobError::InvalidImage(e.to_string()))?;
    let ext = match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpg",
        ImageFormat::WebP => "webp",
        other => {
            return Err(BlobError::UnsupportedFormat(
                other.extensions_str().first().copied().unwrap_or("unknown").to_string(),
            ));
        }
    };
    image::load_from_memory_with_format(data, format)
        .map_err(|e| BlobError::InvalidImage(e.to_string()))?;
    Ok(ext)
}

/// Write under a temporary name, then rename into place
async fn write_atomically(dir: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = dir.join(format!(".upload-{}.tmp", uuid::Uuid::new_v4().simple()));
    let written = match tokio::fs::write(&tmp, data).await {
        Ok(()) => tokio::fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };
    if written.is_err()
        && let Err(e) = tokio::fs::remove_file(&tmp).await
    {
        tracing::warn!(file = %tmp.display(), error = %e, "Failed to remove partial upload");
    }
    written
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn save(
        &self,
        data: &[u8],
        original_name: &str,
        content_type: Option<&str>,
    ) -> Result<String, BlobError> {
        if data.is_empty() {
            return Err(BlobError::Empty);
        }
        if data.len() > MAX_FILE_SIZE {
            return Err(BlobError::TooLarge {
                size: data.len(),
                max: MAX_FILE_SIZE,
            });
        }

        let declared = detect_extension(original_name, content_type);
        if !SUPPORTED_FORMATS.contains(&declared.as_str()) {
            return Err(BlobError::UnsupportedFormat(declared));
        }
        let ext = validate_image(data)?;

        let hash = hex::encode(Sha256::digest(data));
        let file_name = format!("{hash}.{ext}");
        let path = self.dir.join(&file_name);

        if !tokio::fs::try_exists(&path).await? {
            tokio::fs::create_dir_all(&self.dir).await?;
            write_atomically(&self.dir, &path, data).await?;
            tracing::info!(file = %file_name, size = data.len(), "Photo stored");
        }

        Ok(format!("{}/{file_name}", self.public_base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encoded(format: ImageFormat, width: u32) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image::RgbImage::new(width, 1).write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn stored_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_save_dedupes_by_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost:3000/uploads/");
        let png = encoded(ImageFormat::Png, 2);

        let a = store.save(&png, "a.PNG", None).await.unwrap();
        let b = store.save(&png, "b.png", Some("image/png")).await.unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("http://localhost:3000/uploads/"));
        assert!(a.ends_with(".png"));

        let other = store.save(&encoded(ImageFormat::Png, 3), "c.png", None).await.unwrap();
        assert_ne!(a, other);

        // No temporary files left behind
        let files = stored_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|name| name.ends_with(".png")));
    }

    #[tokio::test]
    async fn test_save_validates_input() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://x");

        assert!(matches!(store.save(b"", "a.png", None).await, Err(BlobError::Empty)));
        assert!(matches!(
            store.save(b"gif", "a.gif", None).await,
            Err(BlobError::UnsupportedFormat(ext)) if ext == "gif"
        ));
        let big = vec![0u8; MAX_FILE_SIZE + 1];
        assert!(matches!(
            store.save(&big, "a.png", None).await,
            Err(BlobError::TooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_save_rejects_bytes_that_are_not_an_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://x");

        assert!(matches!(
            store.save(b"<script>alert(1)</script>", "x.png", Some("image/png")).await,
            Err(BlobError::InvalidImage(_))
        ));

        // Valid signature, truncated body
        let mut png = encoded(ImageFormat::Png, 4);
        png.truncate(png.len() / 2);
        assert!(matches!(
            store.save(&png, "x.png", None).await,
            Err(BlobError::InvalidImage(_))
        ));

        assert!(stored_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_extension_follows_decoded_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://x");

        let jpeg = encoded(ImageFormat::Jpeg, 2);
        let url = store.save(&jpeg, "blob", Some("image/jpeg")).await.unwrap();
        assert!(url.ends_with(".jpg"));

        let url = store.save(&encoded(ImageFormat::Png, 2), "photo.jpg", None).await.unwrap();
        assert!(url.ends_with(".png"));
    }

    #[test]
    fn test_blob_error_codes() {
        let err: AppError = BlobError::TooLarge { size: 10, max: 5 }.into();
        assert_eq!(err.code, ErrorCode::FileTooLarge);
        let err: AppError = BlobError::UnsupportedFormat("gif".into()).into();
        assert_eq!(err.http_status(), http::StatusCode::BAD_REQUEST);
        let err: AppError = BlobError::InvalidImage("bad header".into()).into();
        assert_eq!(err.code, ErrorCode::InvalidImage);
    }
}
