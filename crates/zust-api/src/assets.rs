//! Profile media
//!
//! Every account owns an avatar and a cover image, stored under its ID.
//! Media storage itself is an external collaborator behind [`MediaStore`].
//! Public links hide the storage key behind an opaque base64 ID.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use uuid::Uuid;
use zust_auth::{AuthError, AuthResult, ProfileAssets};

/// Largest accepted profile image, uploaded or downloaded.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Media storage errors.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Storage backend failure.
    #[error("Media storage failed: {0}")]
    Backend(String),
}

/// Per-account media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Profile picture
    Avatar,
    /// Channel cover image
    Cover,
}

impl MediaKind {
    /// Tag used inside media links.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Avatar => "avatar",
            MediaKind::Cover => "cover",
        }
    }

    /// File name inside the account's directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            MediaKind::Avatar => "avatar.png",
            MediaKind::Cover => "cover.png",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "avatar" => Some(MediaKind::Avatar),
            "cover" => Some(MediaKind::Cover),
            _ => None,
        }
    }

    /// Storage key of this file for an account.
    pub fn key(&self, account_id: Uuid) -> String {
        format!("{}/{}", account_id, self.file_name())
    }
}

/// Trait for media storage backends.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Write (or overwrite) a file.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), MediaError>;

    /// Read a file.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, MediaError>;
}

/// Media store held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryMediaStore {
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryMediaStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored files.
    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), MediaError> {
        self.files.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, MediaError> {
        Ok(self.files.read().await.get(key).cloned())
    }
}

/// A stored media file ready to be served.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// MIME type of the file
    pub content_type: &'static str,
    /// File contents
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for MediaFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFile")
            .field("content_type", &self.content_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl MediaFile {
    /// Wrap the contents of a profile image. Profile media is always PNG.
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            content_type: "image/png",
            bytes,
        }
    }
}

/// Builds and resolves public media links.
#[derive(Debug, Clone)]
pub struct MediaLinks {
    base_url: String,
}

impl MediaLinks {
    /// Create links rooted at the API's public URL.
    pub fn new(public_url: &str) -> Self {
        Self {
            base_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Public URL of an account's media file.
    pub fn link(&self, account_id: Uuid, kind: MediaKind) -> String {
        let opaque = URL_SAFE.encode(format!("{}:{}:{}", account_id, kind.as_str(), kind.file_name()));
        format!("{}/media/{}", self.base_url, opaque)
    }

    /// Resolve the opaque ID of a media link back to a storage key.
    pub fn resolve(opaque: &str) -> Option<String> {
        let decoded = URL_SAFE.decode(opaque).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let mut parts = decoded.splitn(3, ':');
        let account_id = Uuid::parse_str(parts.next()?).ok()?;
        let kind = MediaKind::parse(parts.next()?)?;
        Some(kind.key(account_id))
    }
}

/// Default media for new accounts plus avatar download for federated ones.
#[derive(Clone)]
pub struct AccountAssets {
    media: Arc<dyn MediaStore>,
    http: reqwest::Client,
    default_avatar: Arc<Vec<u8>>,
    default_cover: Arc<Vec<u8>>,
}

impl std::fmt::Debug for AccountAssets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountAssets")
            .field("default_avatar_bytes", &self.default_avatar.len())
            .field("default_cover_bytes", &self.default_cover.len())
            .finish_non_exhaustive()
    }
}

impl AccountAssets {
    /// Create with the images copied into every new account.
    pub fn new(
        media: Arc<dyn MediaStore>,
        default_avatar: Vec<u8>,
        default_cover: Vec<u8>,
    ) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            media,
            http,
            default_avatar: Arc::new(default_avatar),
            default_cover: Arc::new(default_cover),
        })
    }

    async fn put(&self, account_id: Uuid, kind: MediaKind, bytes: Vec<u8>) -> AuthResult<()> {
        self.media
            .put(&kind.key(account_id), bytes)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))
    }
}

#[async_trait]
impl ProfileAssets for AccountAssets {
    #[instrument(skip(self))]
    async fn create_default_assets(&self, account_id: Uuid) -> AuthResult<()> {
        self.put(account_id, MediaKind::Avatar, self.default_avatar.as_ref().clone())
            .await?;
        self.put(account_id, MediaKind::Cover, self.default_cover.as_ref().clone())
            .await?;
        debug!("Default profile media created");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn download_avatar(&self, account_id: Uuid, avatar_url: &str) -> AuthResult<()> {
        let response = self
            .http
            .get(avatar_url)
            .send()
            .await
            .map_err(|e| AuthError::ExternalFetchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Avatar download rejected");
            return Err(AuthError::ExternalFetchFailed(format!("avatar download returned {}", status)));
        }

        if response
            .content_length()
            .is_some_and(|len| len > MAX_IMAGE_BYTES as u64)
        {
            return Err(oversized_avatar());
        }

        // Content-Length may be absent or wrong, so the body is read in
        // chunks and abandoned once it passes the limit.
        let mut response = response;
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AuthError::ExternalFetchFailed(e.to_string()))?
        {
            if bytes.len() + chunk.len() > MAX_IMAGE_BYTES {
                return Err(oversized_avatar());
            }
            bytes.extend_from_slice(&chunk);
        }
        self.put(account_id, MediaKind::Avatar, bytes).await
    }
}

fn oversized_avatar() -> AuthError {
    warn!(limit = MAX_IMAGE_BYTES, "Avatar exceeds the size limit");
    AuthError::ExternalFetchFailed(format!("avatar larger than {} bytes", MAX_IMAGE_BYTES))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_links_round_trip_to_keys() {
        let links = MediaLinks::new("http://localhost:8080/");
        let id = Uuid::now_v7();

        let link = links.link(id, MediaKind::Cover);
        assert!(link.starts_with("http://localhost:8080/media/"));

        let opaque = link.rsplit('/').next().unwrap();
        assert_eq!(MediaLinks::resolve(opaque), Some(format!("{}/cover.png", id)));
        assert_eq!(MediaLinks::resolve("!!not-base64"), None);
    }

    #[tokio::test]
    async fn test_default_assets() {
        let media = MemoryMediaStore::new();
        let assets = AccountAssets::new(Arc::new(media.clone()), vec![1, 2, 3], vec![4, 5]).unwrap();
        let id = Uuid::now_v7();

        assets.create_default_assets(id).await.unwrap();

        assert_eq!(media.len().await, 2);
        assert_eq!(media.get(&MediaKind::Avatar.key(id)).await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(media.get(&MediaKind::Cover.key(id)).await.unwrap(), Some(vec![4, 5]));
    }

    #[tokio::test]
    async fn test_download_avatar_stores_image() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/a.png"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .mount(&server)
            .await;
        let media = MemoryMediaStore::new();
        let assets = AccountAssets::new(Arc::new(media.clone()), vec![1], vec![2]).unwrap();
        let id = Uuid::now_v7();

        assets
            .download_avatar(id, &format!("{}/a.png", server.uri()))
            .await
            .unwrap();

        assert_eq!(media.get(&MediaKind::Avatar.key(id)).await.unwrap(), Some(b"png".to_vec()));
    }

    #[tokio::test]
    async fn test_download_avatar_rejects_oversized_image() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/huge.png"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(vec![0u8; MAX_IMAGE_BYTES + 1]))
            .mount(&server)
            .await;
        let media = MemoryMediaStore::new();
        let assets = AccountAssets::new(Arc::new(media.clone()), vec![1], vec![2]).unwrap();
        let id = Uuid::now_v7();
        assets.create_default_assets(id).await.unwrap();

        let err = assets
            .download_avatar(id, &format!("{}/huge.png", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::ExternalFetchFailed(_)));
        assert_eq!(media.get(&MediaKind::Avatar.key(id)).await.unwrap(), Some(vec![1]));
    }

    #[test]
    fn test_media_file_debug_omits_bytes() {
        let file = MediaFile::png(vec![7; 64]);
        assert_eq!(file.content_type, "image/png");
        assert!(!format!("{:?}", file).contains("7, 7"));
    }
}
