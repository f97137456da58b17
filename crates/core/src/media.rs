//! Media blob store seam.
//!
//! Posts hold a weak `media_ref` into this store; a post record outlives
//! the blob, so delete failures are logged and swallowed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::types::MediaType;

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, bytes: &[u8], media_type: MediaType) -> anyhow::Result<String>;
    async fn exists(&self, media_ref: &str) -> bool;
    async fn delete(&self, media_ref: &str);
}

/// Flat-directory store; the media ref is the generated file name.
#[derive(Debug, Clone)]
pub struct FsMediaStore {
    dir: PathBuf,
}

impl FsMediaStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FsMediaStore { dir: dir.into() }
    }

    fn path_for(&self, media_ref: &str) -> PathBuf {
        // Refs are generated by put(); reject anything path-like outright.
        let name = Path::new(media_ref)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        self.dir.join(name)
    }

    fn extension(media_type: MediaType) -> &'static str {
        match media_type {
            MediaType::Photo => "jpg",
            MediaType::Video => "mp4",
            MediaType::Audio => "mp3",
            MediaType::Animation => "gif",
            MediaType::Document => "bin",
        }
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn put(&self, bytes: &[u8], media_type: MediaType) -> anyhow::Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let media_ref = format!("med_{}.{}", nanoid::nanoid!(16), Self::extension(media_type));
        tokio::fs::write(self.dir.join(&media_ref), bytes).await?;
        Ok(media_ref)
    }

    async fn exists(&self, media_ref: &str) -> bool {
        tokio::fs::try_exists(self.path_for(media_ref))
            .await
            .unwrap_or(false)
    }

    async fn delete(&self, media_ref: &str) {
        if let Err(err) = tokio::fs::remove_file(self.path_for(media_ref)).await {
            warn!(media_ref, %err, "failed to delete media blob");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_put_exists_delete_roundtrip() {
        rt().block_on(async {
            let dir = std::env::temp_dir().join(format!("postq-media-{}", nanoid::nanoid!(8)));
            let store = FsMediaStore::new(&dir);

            let media_ref = store.put(b"jpeg bytes", MediaType::Photo).await.unwrap();
            assert!(media_ref.starts_with("med_"));
            assert!(media_ref.ends_with(".jpg"));
            assert!(store.exists(&media_ref).await);

            store.delete(&media_ref).await;
            assert!(!store.exists(&media_ref).await);

            tokio::fs::remove_dir_all(&dir).await.ok();
        });
    }

    #[test]
    fn test_path_traversal_refs_stay_inside_dir() {
        let store = FsMediaStore::new("/tmp/postq");
        let path = store.path_for("../../etc/passwd");
        assert_eq!(path, Path::new("/tmp/postq/passwd"));
    }

    #[test]
    fn test_delete_missing_blob_is_silent() {
        rt().block_on(async {
            let store = FsMediaStore::new(std::env::temp_dir().join("postq-missing"));
            store.delete("med_does_not_exist.jpg").await;
        });
    }
}
