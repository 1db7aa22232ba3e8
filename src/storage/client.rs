use async_trait::async_trait;
use std::path::Path;

use crate::config::AppConfig;
use crate::error::AppError;

/// Trait for the media host (S3-compatible object storage).
///
/// Abstracted as a trait so tests can use a mock without a real S3 instance.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Upload the file at `path` under `key`.
    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<(), AppError>;

    /// Remove the object stored under `key`.
    async fn delete_object(&self, key: &str) -> Result<(), AppError>;

    /// The absolute public URL an object is served from.
    fn public_url(&self, key: &str) -> String;
}

/// S3 implementation of StorageClient.
pub struct S3StorageClient {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3StorageClient {
    /// Create a new S3 storage client from the application configuration.
    ///
    /// Credentials come from the standard AWS provider chain
    /// (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, profiles, ...).
    pub async fn from_config(config: &AppConfig) -> Self {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.s3_region.clone()));

        // Support custom S3 endpoint (for MinIO, LocalStack, etc.)
        if let Some(endpoint) = &config.s3_endpoint {
            config_loader = config_loader.endpoint_url(endpoint);
        }

        let sdk_config = config_loader.load().await;
        let client = aws_sdk_s3::Client::from_conf(
            aws_sdk_s3::config::Builder::from(&sdk_config)
                .force_path_style(config.s3_force_path_style)
                .build(),
        );

        Self::new(client, config.s3_bucket.clone(), config.media_base_url())
    }

    /// Create with explicit values (useful for testing / DI).
    pub fn new(client: aws_sdk_s3::Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url,
        }
    }
}

#[async_trait]
impl StorageClient for S3StorageClient {
    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<(), AppError> {
        let body = aws_sdk_s3::primitives::ByteStream::from_path(path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read '{}': {}", path.display(), e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to put object '{}': {}", key, e)))?;

        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to delete object '{}': {}", key, e)))?;

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }
}
