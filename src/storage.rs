//! Object storage for uploaded images.
//!
//! [`ObjectStore`] is the seam the upload endpoint talks to; [`SupabaseStorage`]
//! implements it against the Supabase Storage REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::StorageConfig;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage is not configured")]
    NotConfigured,
    /// The storage service answered with a non-success status.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` at `path`, overwriting any existing object. Returns the
    /// stored object's path.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError>;

    /// Public URL of the object at `path`.
    fn public_url(&self, path: &str) -> String;
}

pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: String,
    service_role: String,
    bucket: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl SupabaseStorage {
    pub fn new(cfg: &StorageConfig) -> Result<Self, StorageError> {
        if cfg.url.trim().is_empty() || cfg.service_role.trim().is_empty() || cfg.bucket.trim().is_empty() {
            return Err(StorageError::NotConfigured);
        }
        let client = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: cfg.url.trim().trim_end_matches('/').to_string(),
            service_role: cfg.service_role.trim().to_string(),
            bucket: cfg.bucket.trim().to_string(),
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        let size = bytes.len();
        let response = self
            .client
            .post(self.object_url(path))
            .bearer_auth(&self.service_role)
            .header("apikey", &self.service_role)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|body| body.message.or(body.error))
                .unwrap_or_else(|| if text.is_empty() { status.to_string() } else { text });
            tracing::warn!(%status, path, "Storage upload rejected: {}", message);
            return Err(StorageError::Rejected { status: status.as_u16(), message });
        }

        tracing::info!(path, size, bucket = %self.bucket, "Uploaded object");
        Ok(path.to_string())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, self.bucket, path.trim_start_matches('/'))
    }
}

/// Object path for an upload: `<prefix>/<millis>-<name>`.
///
/// The prefix loses `..` sequences, leading slashes and anything outside
/// `[A-Za-z0-9/_-]`; the file name keeps only `[A-Za-z0-9._-]`. Repeated
/// slashes collapse to one.
pub fn sanitize_upload_path(prefix: &str, file_name: &str, millis: i64) -> String {
    let prefix = prefix.replace("..", "");
    let prefix: String = prefix
        .trim_start_matches('/')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-'))
        .collect();
    let prefix = prefix.trim_end_matches('/');
    let name: String = file_name.chars().filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')).collect();

    let raw = if prefix.is_empty() {
        format!("{}-{}", millis, name)
    } else {
        format!("{}/{}-{}", prefix, millis, name)
    };

    let mut path = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch == '/' && path.ends_with('/') {
            continue;
        }
        path.push(ch);
    }
    path
}

/// Image type identified from the leading bytes, ignoring whatever type the
/// client declared. `None` for anything that is not a raster image.
pub fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.starts_with(b"BM") && bytes.len() >= 14 {
        return Some("image/bmp");
    }
    // ISO base media file: size, "ftyp", major brand
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        return match &bytes[8..12] {
            b"avif" | b"avis" => Some("image/avif"),
            b"heic" | b"heix" | b"mif1" | b"msf1" => Some("image/heic"),
            _ => None,
        };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_sniff_image_type() {
        assert_eq!(sniff_image_type(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]), Some("image/jpeg"));
        assert_eq!(sniff_image_type(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00]), Some("image/png"));
        assert_eq!(sniff_image_type(b"GIF89a\x01\x00"), Some("image/gif"));
        assert_eq!(sniff_image_type(b"RIFF\x24\x00\x00\x00WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_image_type(b"\x00\x00\x00\x1cftypavif\x00\x00"), Some("image/avif"));
        assert_eq!(sniff_image_type(b"\x00\x00\x00\x18ftypheic\x00\x00"), Some("image/heic"));

        assert_eq!(sniff_image_type(b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>"), None);
        assert_eq!(sniff_image_type(b"%PDF-1.7"), None);
        assert_eq!(sniff_image_type(b"\x00\x00\x00\x18ftypisom\x00\x00"), None);
        assert_eq!(sniff_image_type(b"RIFF\x24\x00\x00\x00WAVE"), None);
        assert_eq!(sniff_image_type(&[]), None);
    }

    #[test]
    fn test_sanitize_plain() {
        assert_eq!(sanitize_upload_path("", "foto.jpg", 1700000000000), "1700000000000-foto.jpg");
        assert_eq!(sanitize_upload_path("autos", "foto.jpg", 1), "autos/1-foto.jpg");
    }

    #[test]
    fn test_sanitize_traversal_and_symbols() {
        assert_eq!(sanitize_upload_path("../../etc/", "pass wd.png", 5), "etc/5-passwd.png");
        assert_eq!(sanitize_upload_path("//a//b///", "x.jpg", 5), "a/b/5-x.jpg");
        assert_eq!(sanitize_upload_path("fo$o/ba r", "ñandú (1).webp", 7), "foo/bar/7-and1.webp");
        assert_eq!(sanitize_upload_path("....", "a.jpg", 9), "9-a.jpg");
    }

    #[test]
    fn test_urls() {
        let mut cfg = AppConfig::default().storage;
        cfg.url = "https://proj.supabase.co/".to_string();
        cfg.service_role = "service-role-key".to_string();
        let storage = SupabaseStorage::new(&cfg).unwrap();
        assert_eq!(
            storage.object_url("autos/1-a.jpg"),
            "https://proj.supabase.co/storage/v1/object/vehicles/autos/1-a.jpg"
        );
        assert_eq!(
            storage.public_url("autos/1-a.jpg"),
            "https://proj.supabase.co/storage/v1/object/public/vehicles/autos/1-a.jpg"
        );
    }

    #[test]
    fn test_unconfigured() {
        let cfg = AppConfig::default().storage;
        assert!(matches!(SupabaseStorage::new(&cfg), Err(StorageError::NotConfigured)));
    }
}
