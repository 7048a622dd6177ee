//! Media storage abstraction for uploaded images and videos.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult, IdGenerator};

/// Reference to a stored media object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMedia {
    /// Storage identifier, used for deletion.
    pub id: String,
    /// Public URL of the object.
    pub url: String,
}

/// Media storage backend.
#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `data` under `folder` and return its reference.
    async fn upload(&self, data: &[u8], folder: &str, content_type: &str)
    -> AppResult<StoredMedia>;

    /// Delete a previously stored object. Deleting a missing object succeeds.
    async fn delete(&self, id: &str) -> AppResult<()>;
}

/// Local filesystem storage backend.
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
    id_gen: IdGenerator,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self {
            base_path,
            base_url,
            id_gen: IdGenerator::new(),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    /// Resolve a storage key to a path inside the base directory.
    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || key.is_empty() {
            return Err(AppError::InvalidOperation(format!(
                "Invalid media id: {key}"
            )));
        }
        Ok(self.base_path.join(relative))
    }
}

/// File extension for a MIME type.
#[must_use]
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        _ => "bin",
    }
}

/// Whether a MIME type is accepted as post or avatar media.
#[must_use]
pub fn is_supported_media(content_type: &str) -> bool {
    extension_for(content_type) != "bin"
}

#[async_trait::async_trait]
impl MediaStore for LocalStorage {
    async fn upload(
        &self,
        data: &[u8],
        folder: &str,
        content_type: &str,
    ) -> AppResult<StoredMedia> {
        let key = format!(
            "{}/{}.{}",
            folder.trim_matches('/'),
            self.id_gen.generate(),
            extension_for(content_type)
        );
        let path = self.resolve(&key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Upstream(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to write file: {e}")))?;

        tracing::debug!(key = %key, size = data.len(), "Stored media");

        Ok(StoredMedia {
            url: self.public_url(&key),
            id: key,
        })
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let path = self.resolve(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Upstream(format!("Failed to delete file: {e}"))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_storage() -> (LocalStorage, PathBuf) {
        let dir = std::env::temp_dir().join(format!("livenest-storage-{}", IdGenerator::new().generate()));
        (
            LocalStorage::new(dir.clone(), "http://localhost/files/".to_string()),
            dir,
        )
    }

    #[tokio::test]
    async fn test_upload_then_delete() {
        let (storage, dir) = temp_storage();

        let media = storage
            .upload(b"fake image", "posts", "image/png")
            .await
            .unwrap();

        assert!(media.id.starts_with("posts/"));
        assert!(media.id.ends_with(".png"));
        assert_eq!(media.url, format!("http://localhost/files/{}", media.id));
        assert!(dir.join(&media.id).exists());

        storage.delete(&media.id).await.unwrap();
        assert!(!dir.join(&media.id).exists());

        // Deleting again is not an error
        storage.delete(&media.id).await.unwrap();

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_delete_rejects_traversal() {
        let (storage, _dir) = temp_storage();
        let result = storage.delete("../secret.txt").await;
        assert!(matches!(result, Err(AppError::InvalidOperation(_))));
    }

    #[test]
    fn test_supported_media_types() {
        assert!(is_supported_media("image/jpeg"));
        assert!(is_supported_media("video/mp4"));
        assert!(!is_supported_media("application/pdf"));
    }
}
