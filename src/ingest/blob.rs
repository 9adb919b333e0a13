//! Storage for raw uploaded bytes.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::core::errors::ApiError;

const MAX_NAME_CHARS: usize = 100;
const HASH_PREFIX_CHARS: usize = 16;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` and returns a location usable as a document source.
    async fn put(&self, filename: &str, content_hash: &str, bytes: &[u8]) -> Result<String, ApiError>;
}

/// Writes blobs under a local directory. Names are prefixed with the content
/// hash, so different contents never collide.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, filename: &str, content_hash: &str, bytes: &[u8]) -> Result<String, ApiError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(ApiError::internal)?;

        let prefix: String = content_hash.chars().take(HASH_PREFIX_CHARS).collect();
        let path = self
            .root
            .join(format!("{}_{}", prefix, sanitize_filename(filename)));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ApiError::internal(format!("Storage error: {e}")))?;

        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(path.to_string_lossy().into_owned())
    }
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; anything else becomes `_`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_CHARS)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("rapport final (v2).pdf"), "rapport_final__v2_.pdf");
        assert_eq!(sanitize_filename(".."), "upload");
        assert_eq!(sanitize_filename(&"a".repeat(300)).len(), MAX_NAME_CHARS);
    }

    #[tokio::test]
    async fn blobs_land_under_root_with_hash_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().join("uploads"));

        let location = store
            .put("notes.txt", "0123456789abcdef0123", b"hello")
            .await
            .unwrap();

        assert!(location.ends_with("0123456789abcdef_notes.txt"));
        assert_eq!(tokio::fs::read(&location).await.unwrap(), b"hello");
    }
}
