//! Object storage for uploads, and the local cache layout.

use std::{
    hash::{DefaultHasher, Hash, Hasher},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs;
use uuid::Uuid;

use crate::{
    error::Result,
    types::{VideoReference, mime_for_path},
};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Storage returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Signing endpoint returned no upload URL")]
    MissingUrl,
}

/// A short-lived, write-capable URL for one object.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedUpload {
    pub url: String,
    pub object_name: String,
}

impl SignedUpload {
    /// Where the object can be read once uploaded: the URL without its signature.
    pub fn object_url(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn signed_upload_url(
        &self,
        filename: &str,
        content_type: &str,
    ) -> std::result::Result<SignedUpload, StorageError>;
}

/// Asks an HTTP endpoint to sign uploads: `POST {filename, contentType}` -> `{url}`.
pub struct SigningEndpoint {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    url: Option<String>,
}

impl SigningEndpoint {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ObjectStorage for SigningEndpoint {
    async fn signed_upload_url(
        &self,
        filename: &str,
        content_type: &str,
    ) -> std::result::Result<SignedUpload, StorageError> {
        let object_name = object_name(filename);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "filename": object_name,
                "contentType": content_type,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let url = response
            .json::<SignedUrlResponse>()
            .await?
            .url
            .ok_or(StorageError::MissingUrl)?;
        Ok(SignedUpload { url, object_name })
    }
}

/// Unique object name that keeps the original file name readable.
pub fn object_name(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}", Uuid::new_v4(), safe)
}

pub async fn put_object(
    client: &reqwest::Client,
    upload: &SignedUpload,
    content_type: &str,
    body: Vec<u8>,
) -> std::result::Result<(), StorageError> {
    let response = client
        .put(&upload.url)
        .header("Content-Type", content_type)
        .body(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(StorageError::Rejected {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        });
    }
    Ok(())
}

/// Upload a local video and return a reference the commentary service can read.
pub async fn upload_video(
    storage: &dyn ObjectStorage,
    client: &reqwest::Client,
    path: &Path,
) -> Result<VideoReference> {
    let content_type = mime_for_path(path);
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string());

    let upload = storage.signed_upload_url(&filename, content_type).await?;
    let body = fs::read(path).await?;
    put_object(client, &upload, content_type, body).await?;

    Ok(VideoReference::Remote {
        uri: upload.object_url().to_string(),
        mime_type: content_type.to_string(),
    })
}

pub fn get_root_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("playcall")
}

/// Cache directory for one video, keyed by its path.
pub fn get_cache_dir(video_path: &Path) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    video_path.hash(&mut hasher);
    get_root_cache_dir().join(hasher.finish().to_string())
}

/// Cached session JSON for a video
pub fn get_session_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("key_moments.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_names_are_unique_and_sanitized() {
        let a = object_name("my clip (1).mp4");
        let b = object_name("my clip (1).mp4");
        assert_ne!(a, b);
        assert!(a.ends_with("_my_clip__1_.mp4"));
    }

    #[test]
    fn object_url_drops_signature() {
        let upload = SignedUpload {
            url: "https://storage.example.com/bucket/abc_clip.mp4?X-Goog-Signature=deadbeef"
                .to_string(),
            object_name: "abc_clip.mp4".to_string(),
        };
        assert_eq!(
            upload.object_url(),
            "https://storage.example.com/bucket/abc_clip.mp4"
        );
    }

    #[test]
    fn cache_dir_is_stable_per_video() {
        let a = get_cache_dir(Path::new("/videos/a.mp4"));
        assert_eq!(a, get_cache_dir(Path::new("/videos/a.mp4")));
        assert_ne!(a, get_cache_dir(Path::new("/videos/b.mp4")));
        assert!(a.starts_with(get_root_cache_dir()));
        assert_eq!(get_session_path(&a), a.join("key_moments.json"));
    }
}
