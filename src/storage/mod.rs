use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;

use crate::errors::AppError;

pub mod s3;

/// Byte stream handed back to the HTTP layer when serving file contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Where a stored blob lives: the public URL and the provider key.
#[derive(Debug, Clone)]
pub struct BlobLocator {
    pub url: String,
    pub key: String,
}

pub struct BlobDownload {
    pub content_type: Option<String>,
    pub stream: ByteStream,
}

/// Capability interface over the external blob store. The concrete provider
/// is wired once at startup; handlers only see this trait.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<BlobLocator, AppError>;

    async fn stream(&self, key: &str) -> Result<BlobDownload, AppError>;

    /// Returns a time-limited signed URL for direct access to the blob.
    async fn signed_url(&self, key: &str) -> Result<String, AppError>;
}
