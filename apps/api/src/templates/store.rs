//! Template blob storage.
//!
//! Blobs are content-addressed: the key is the SHA-256 of the bytes plus a
//! `.docx` suffix, so re-uploading the same file is a no-op and the key
//! never has to be derived from user input.
//!
//! `AppState` holds an `Arc<dyn TemplateStore>` chosen at startup.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("template blob not found: {0}")]
    NotFound(String),

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object storage error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Stores `bytes` and returns their key.
    async fn put(&self, bytes: &[u8]) -> Result<String, StoreError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// `<sha256-hex>.docx`
pub fn content_key(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{}.docx", hex::encode(digest))
}

/// Keys are only ever produced by [`content_key`]; anything else is refused
/// before it reaches a path or an object name.
fn check_key(key: &str) -> Result<(), StoreError> {
    let valid = key
        .strip_suffix(".docx")
        .is_some_and(|hash| hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit()));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LocalTemplateStore
// ────────────────────────────────────────────────────────────────────────────

/// Stores blobs as files in one directory.
pub struct LocalTemplateStore {
    root: PathBuf,
}

impl LocalTemplateStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        info!("Local template store at {}", root.display());
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl TemplateStore for LocalTemplateStore {
    async fn put(&self, bytes: &[u8]) -> Result<String, StoreError> {
        let key = content_key(bytes);
        let path = self.path_for(&key)?;

        if tokio::fs::try_exists(&path).await? {
            debug!("Template blob {key} already stored");
            return Ok(key);
        }

        // Write-then-rename so readers never observe a partial file.
        let tmp = temp_path(&path);
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!("Stored template blob {key} ({} bytes)", bytes.len());
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
    PathBuf::from(name)
}

// ────────────────────────────────────────────────────────────────────────────
// S3TemplateStore
// ────────────────────────────────────────────────────────────────────────────

const S3_PREFIX: &str = "templates/";

/// Stores blobs in an S3 (or MinIO) bucket under `templates/`.
pub struct S3TemplateStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3TemplateStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    fn object_key(key: &str) -> Result<String, StoreError> {
        check_key(key)?;
        Ok(format!("{S3_PREFIX}{key}"))
    }
}

#[async_trait]
impl TemplateStore for S3TemplateStore {
    async fn put(&self, bytes: &[u8]) -> Result<String, StoreError> {
        let key = content_key(bytes);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(Self::object_key(&key)?)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("put {key}: {e}")))?;

        debug!("Uploaded template blob {key} to s3://{}", self.bucket);
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(Self::object_key(key)?)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let service = err.into_service_error();
                if service.is_no_such_key() {
                    return Err(StoreError::NotFound(key.to_string()));
                }
                return Err(StoreError::Backend(format!("get {key}: {service}")));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Backend(format!("read {key}: {e}")))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(Self::object_key(key)?)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("delete {key}: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_key_is_sha256_hex() {
        assert_eq!(
            content_key(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855.docx"
        );
    }

    #[test]
    fn test_check_key_rejects_paths() {
        assert!(check_key("../../etc/passwd").is_err());
        assert!(check_key("abc.docx").is_err());
        assert!(check_key(&content_key(b"x")).is_ok());
    }

    #[tokio::test]
    async fn test_local_store_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalTemplateStore::new(dir.path().join("templates")).await.unwrap();

        let key = store.put(b"template bytes").await.unwrap();
        assert_eq!(key, content_key(b"template bytes"));
        assert_eq!(store.get(&key).await.unwrap(), b"template bytes");

        store.delete(&key).await.unwrap();
        assert!(matches!(store.get(&key).await, Err(StoreError::NotFound(_))));
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_local_store_put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalTemplateStore::new(dir.path()).await.unwrap();

        let first = store.put(b"same").await.unwrap();
        let second = store.put(b"same").await.unwrap();
        assert_eq!(first, second);

        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1, "no temp files or duplicates should remain");
    }

    #[tokio::test]
    async fn test_local_store_rejects_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalTemplateStore::new(dir.path()).await.unwrap();
        assert!(matches!(
            store.get("../secret.docx").await,
            Err(StoreError::InvalidKey(_))
        ));
    }
}
