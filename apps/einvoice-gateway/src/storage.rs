//! Uploaded invoice storage and signed download links

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key")]
    InvalidKey,

    #[error("Download link is invalid or has expired")]
    InvalidSignature,

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Signing error: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Blob storage for uploaded invoices
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under a fresh random key and return the key
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError>;

    async fn get(&self, key: &str) -> Result<StoredObject, StorageError>;

    /// Time-limited download link for `key`, served as `filename`
    fn presign(&self, key: &str, filename: &str, ttl: Duration) -> Result<String, StorageError>;

    /// Check a link produced by [`ObjectStore::presign`]
    fn verify(
        &self,
        key: &str,
        filename: &str,
        expires: i64,
        signature: &str,
    ) -> Result<(), StorageError>;
}

/// HMAC-SHA256 over key, filename and expiry
#[derive(Clone)]
pub struct UrlSigner {
    secret: String,
}

impl UrlSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self, key: &str, filename: &str, expires: i64) -> Result<HmacSha256, StorageError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| StorageError::Signing(e.to_string()))?;
        mac.update(format!("{}\n{}\n{}", key, filename, expires).as_bytes());
        Ok(mac)
    }

    pub fn sign(&self, key: &str, filename: &str, expires: i64) -> Result<String, StorageError> {
        Ok(hex::encode(
            self.mac(key, filename, expires)?.finalize().into_bytes(),
        ))
    }

    pub fn verify_at(
        &self,
        key: &str,
        filename: &str,
        expires: i64,
        signature: &str,
        now: i64,
    ) -> Result<(), StorageError> {
        if expires < now {
            return Err(StorageError::InvalidSignature);
        }
        let signature = hex::decode(signature).map_err(|_| StorageError::InvalidSignature)?;
        self.mac(key, filename, expires)?
            .verify_slice(&signature)
            .map_err(|_| StorageError::InvalidSignature)
    }
}

/// Objects kept as plain files in one directory
///
/// Each object `<key>` has a `<key>.type` sidecar holding its content type.
pub struct LocalObjectStore {
    root: PathBuf,
    public_url: String,
    signer: UrlSigner,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>, signer: UrlSigner) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into(),
            signer,
        }
    }

    fn paths(&self, key: &str) -> Result<(PathBuf, PathBuf), StorageError> {
        if !is_valid_key(key) {
            return Err(StorageError::InvalidKey);
        }
        Ok((
            self.root.join(key),
            self.root.join(format!("{}.type", key)),
        ))
    }
}

/// Keys are 32 lowercase hex characters, which also rules out path tricks
fn is_valid_key(key: &str) -> bool {
    key.len() == 32 && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        let key = Uuid::new_v4().simple().to_string();
        let (data_path, type_path) = self.paths(&key)?;

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&data_path, bytes).await?;
        tokio::fs::write(&type_path, content_type).await?;

        tracing::debug!(key = %key, "Stored object");
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        let (data_path, type_path) = self.paths(key)?;

        let bytes = match tokio::fs::read(&data_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let content_type = tokio::fs::read_to_string(&type_path)
            .await
            .unwrap_or_else(|_| "application/octet-stream".to_string());

        Ok(StoredObject {
            bytes,
            content_type,
        })
    }

    fn presign(&self, key: &str, filename: &str, ttl: Duration) -> Result<String, StorageError> {
        self.paths(key)?;
        let expires = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        let signature = self.signer.sign(key, filename, expires)?;

        Ok(format!(
            "{}/objects/{}?filename={}&expires={}&signature={}",
            self.public_url,
            key,
            urlencoding::encode(filename),
            expires,
            signature
        ))
    }

    fn verify(
        &self,
        key: &str,
        filename: &str,
        expires: i64,
        signature: &str,
    ) -> Result<(), StorageError> {
        self.paths(key)?;
        self.signer
            .verify_at(key, filename, expires, signature, chrono::Utc::now().timestamp())
    }
}
