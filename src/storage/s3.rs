use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::ConfigLoader;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client as S3Client;
use aws_types::region::Region;
use tokio_util::io::ReaderStream;

use crate::errors::AppError;

use super::{BlobDownload, BlobLocator, BlobStore};

const SIGNED_URL_TTL_SECS: u64 = 300;

pub async fn create_s3_client() -> S3Client {
    let aws_config = ConfigLoader::default()
        .region(std::env::var("AWS_REGION").ok().map(Region::new))
        .behavior_version(BehaviorVersion::latest())
        .load()
        .await;

    S3Client::new(&aws_config)
}

pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: S3Client, bucket: String) -> Self {
        S3BlobStore { client, bucket }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<BlobLocator, AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(bytes.into())
            .send()
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to upload object: {}", e)))?;

        let url = format!("https://{}.s3.amazonaws.com/{}", self.bucket, key);
        Ok(BlobLocator {
            url,
            key: key.to_string(),
        })
    }

    async fn stream(&self, key: &str) -> Result<BlobDownload, AppError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to fetch object: {}", e)))?;

        let content_type = object.content_type().map(str::to_string);
        let reader = object.body.into_async_read();

        Ok(BlobDownload {
            content_type,
            stream: Box::pin(ReaderStream::new(reader)),
        })
    }

    async fn signed_url(&self, key: &str) -> Result<String, AppError> {
        let presigning = PresigningConfig::expires_in(std::time::Duration::from_secs(
            SIGNED_URL_TTL_SECS,
        ))
        .map_err(|e| AppError::StorageError(format!("Invalid presigning config: {}", e)))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to sign URL: {}", e)))?;

        Ok(request.uri().to_string())
    }
}
