//! Remote object store seam.

use async_trait::async_trait;

#[cfg(test)]
pub mod memory;
pub mod s3;

pub use s3::S3Store;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("listing s3://{bucket}/{prefix}: {reason}")]
    List { bucket: String, prefix: String, reason: String },
    #[error("writing s3://{bucket}/{key}: {reason}")]
    Put { bucket: String, key: String, reason: String },
}

/// How an object is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: &'static str,
    pub public_read: bool,
}

impl PutOptions {
    pub const JSON: PutOptions = PutOptions { content_type: "application/json", public_read: false };
    pub const PUBLIC_HTML: PutOptions = PutOptions { content_type: "text/html", public_read: true };
}

/// Flat key/value bucket. Writes are independent puts; nothing is transactional.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every key starting with `prefix`.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
    async fn put(&self, key: &str, body: Vec<u8>, opts: PutOptions) -> Result<(), StoreError>;
    fn bucket(&self) -> &str;
}
