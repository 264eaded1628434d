//! Ticket photo inputs and the local upload directory.
//!
//! A photo reaches the service in one of three shapes ([`PhotoInput`]). The
//! storage resolves each shape to a single URL; uploads and data URIs are
//! written under the upload directory and exposed as `/uploads/<file>`.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::error::AppError;

pub const PUBLIC_PREFIX: &str = "/uploads/";

#[derive(Debug, Clone)]
pub enum PhotoInput {
    UploadedFile { bytes: Vec<u8>, content_type: String },
    Base64Image(String),
    Url(String),
}

impl PhotoInput {
    /// Classifies a photo value sent as a JSON string.
    pub fn from_field(value: &str) -> Self {
        let value = value.trim();
        if value.starts_with("data:") {
            PhotoInput::Base64Image(value.to_string())
        } else {
            PhotoInput::Url(value.to_string())
        }
    }
}

/// How an update treats the stored photo.
#[derive(Debug, Clone)]
pub enum PhotoChange {
    Keep,
    Clear,
    Replace(PhotoInput),
}

impl PhotoChange {
    /// Absent keeps, empty string clears, the current URL sent back keeps,
    /// anything else replaces.
    pub fn from_patch(value: Option<&str>, current: Option<&str>) -> Self {
        match value.map(str::trim) {
            None => PhotoChange::Keep,
            Some("") => PhotoChange::Clear,
            Some(v) if Some(v) == current => PhotoChange::Keep,
            Some(v) => PhotoChange::Replace(PhotoInput::from_field(v)),
        }
    }
}

/// Validates an external link and returns it as sent, minus surrounding
/// whitespace.
pub fn validate_http_url(value: &str, field: &str) -> Result<String, AppError> {
    let value = value.trim();
    let parsed = Url::parse(value)
        .map_err(|_| AppError::Validation(format!("{} must be a valid URL", field)))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host().is_some() => Ok(value.to_string()),
        _ => Err(AppError::Validation(format!("{} must be an http(s) URL", field))),
    }
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        "image/bmp" => Some("bmp"),
        _ => None,
    }
}

/// Splits `data:<mime>;base64,<payload>` and decodes the payload.
fn decode_data_uri(data_uri: &str) -> Result<(String, Vec<u8>), AppError> {
    let invalid = || AppError::Validation("photo must be a base64 image data URI".to_string());
    let rest = data_uri.strip_prefix("data:").ok_or_else(invalid)?;
    let (meta, payload) = rest.split_once(',').ok_or_else(invalid)?;
    let content_type = meta.strip_suffix(";base64").ok_or_else(invalid)?;
    let bytes = STANDARD.decode(payload.trim()).map_err(|_| invalid())?;
    Ok((content_type.to_string(), bytes))
}

#[derive(Debug, Clone)]
pub struct AttachmentStorage {
    dir: PathBuf,
    max_bytes: usize,
}

impl AttachmentStorage {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self { dir: dir.into(), max_bytes }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolves a photo input to the URL that gets stored on the ticket.
    pub async fn persist(&self, input: PhotoInput) -> Result<String, AppError> {
        match input {
            PhotoInput::Url(url) if url.starts_with(PUBLIC_PREFIX) => {
                // Stored files belong to one ticket; only that ticket may keep it.
                Err(AppError::Validation(
                    "photo must be an http(s) URL or an image upload".to_string(),
                ))
            }
            PhotoInput::Url(url) => validate_http_url(&url, "photo"),
            PhotoInput::Base64Image(data_uri) => {
                let (content_type, bytes) = decode_data_uri(&data_uri)?;
                self.write_image(&content_type, &bytes).await
            }
            PhotoInput::UploadedFile { bytes, content_type } => {
                self.write_image(&content_type, &bytes).await
            }
        }
    }

    async fn write_image(&self, content_type: &str, bytes: &[u8]) -> Result<String, AppError> {
        let ext = extension_for(content_type).ok_or_else(|| {
            AppError::Validation(format!("unsupported image type: {}", content_type))
        })?;
        if bytes.is_empty() {
            return Err(AppError::Validation("photo is empty".to_string()));
        }
        if bytes.len() > self.max_bytes {
            return Err(AppError::Validation(format!(
                "photo exceeds the {} byte limit",
                self.max_bytes
            )));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Internal(format!("creating upload dir: {}", e)))?;
        let file_name = format!("{}.{}", Uuid::new_v4(), ext);
        tokio::fs::write(self.dir.join(&file_name), bytes)
            .await
            .map_err(|e| AppError::Internal(format!("writing upload: {}", e)))?;
        debug!("Stored photo {} ({} bytes)", file_name, bytes.len());
        Ok(format!("{}{}", PUBLIC_PREFIX, file_name))
    }

    /// Maps a public `/uploads/<file>` URL back to a path inside the upload
    /// directory. External URLs and anything that tries to leave the
    /// directory yield `None`.
    pub fn local_path(&self, url: &str) -> Option<PathBuf> {
        let name = url.strip_prefix(PUBLIC_PREFIX)?;
        if !is_safe_file_name(name) {
            return None;
        }
        Some(self.dir.join(name))
    }

    /// Removes a locally hosted photo. Failures are logged, never returned.
    pub async fn remove(&self, url: &str) {
        let Some(path) = self.local_path(url) else {
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("Removed photo {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove photo {}: {}", path.display(), e),
        }
    }
}

pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(dir: &Path) -> AttachmentStorage {
        AttachmentStorage::new(dir, 64)
    }

    #[test]
    fn classifies_photo_fields() {
        assert!(matches!(
            PhotoInput::from_field("data:image/png;base64,AAAA"),
            PhotoInput::Base64Image(_)
        ));
        assert!(matches!(
            PhotoInput::from_field("https://example.com/a.png"),
            PhotoInput::Url(_)
        ));
        assert!(matches!(PhotoChange::from_patch(None, None), PhotoChange::Keep));
        assert!(matches!(PhotoChange::from_patch(Some(""), Some("/uploads/a.png")), PhotoChange::Clear));
        assert!(matches!(
            PhotoChange::from_patch(Some(" /uploads/a.png "), Some("/uploads/a.png")),
            PhotoChange::Keep
        ));
        assert!(matches!(
            PhotoChange::from_patch(Some("/uploads/b.png"), Some("/uploads/a.png")),
            PhotoChange::Replace(PhotoInput::Url(_))
        ));
    }

    #[test]
    fn rejects_non_http_links() {
        assert!(validate_http_url("https://youtu.be/abc", "videoUrl").is_ok());
        assert!(validate_http_url("ftp://example.com/v.mp4", "videoUrl").is_err());
        assert!(validate_http_url("not a url", "videoUrl").is_err());
        assert_eq!(
            validate_http_url(" https://cdn.example.com ", "photo").unwrap(),
            "https://cdn.example.com"
        );
    }

    #[actix_web::test]
    async fn data_uri_is_written_to_upload_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage(tmp.path());
        let uri = format!("data:image/png;base64,{}", STANDARD.encode(b"fake-png"));

        let url = storage.persist(PhotoInput::Base64Image(uri)).await.unwrap();
        assert!(url.starts_with(PUBLIC_PREFIX) && url.ends_with(".png"));

        let path = storage.local_path(&url).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"fake-png");

        storage.remove(&url).await;
        assert!(!path.exists());
    }

    #[actix_web::test]
    async fn uploads_must_be_small_images() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage(tmp.path());

        let not_image = PhotoInput::UploadedFile {
            bytes: b"hello".to_vec(),
            content_type: "text/plain".into(),
        };
        assert!(matches!(storage.persist(not_image).await, Err(AppError::Validation(_))));

        let too_big = PhotoInput::UploadedFile {
            bytes: vec![0u8; 65],
            content_type: "image/jpeg".into(),
        };
        assert!(matches!(storage.persist(too_big).await, Err(AppError::Validation(_))));
    }

    #[test]
    fn external_and_traversal_urls_are_not_local() {
        let storage = storage(Path::new("/srv/uploads"));
        assert!(storage.local_path("https://cdn.example.com/x.png").is_none());
        assert!(storage.local_path("/uploads/../secret").is_none());
        assert_eq!(
            storage.local_path("/uploads/a.png").unwrap(),
            PathBuf::from("/srv/uploads/a.png")
        );
    }
}
