//! S3-compatible object store client (§6)

use crate::config::ObjectStoreConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::time::Duration;
use tokio::time::timeout;

/// Object store operations used by the ingestion and query services.
/// Abstracted behind a trait so tests can substitute an in-memory double.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()>;
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;
    async fn remove_object(&self, key: &str) -> Result<()>;
    async fn bucket_exists(&self) -> Result<bool>;
    async fn make_bucket(&self) -> Result<()>;
}

/// S3-compatible (MinIO or AWS) object store client.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    folder: String,
    read_timeout: Duration,
}

impl S3ObjectStore {
    pub async fn connect(config: &ObjectStoreConfig) -> Result<Self> {
        let region = Region::new("us-east-1");
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "rag-backend",
        );

        let builder = aws_sdk_s3::config::Builder::new()
            .region(region)
            .credentials_provider(credentials)
            .endpoint_url(&config.endpoint)
            .force_path_style(true);

        let client = Client::from_conf(builder.build());

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            folder: config.folder.clone(),
            read_timeout: Duration::from_secs(config.read_timeout_secs),
        })
    }

    /// Build a key under this store's configured folder, e.g.
    /// `uploads/<uuid>.pdf`.
    pub fn key_for(&self, filename_uuid: &str) -> String {
        format!("{}/{}", self.folder, filename_uuid)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| AppError::ObjectStore(e.to_string()))?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let fut = self.client.get_object().bucket(&self.bucket).key(key).send();

        let output = timeout(self.read_timeout, fut)
            .await
            .map_err(|_| AppError::ObjectStore(format!("timed out reading {key}")))?
            .map_err(|e| AppError::ObjectStore(e.to_string()))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::ObjectStore(e.to_string()))?
            .into_bytes();

        Ok(bytes.to_vec())
    }

    async fn remove_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::ObjectStore(e.to_string()))?;
        Ok(())
    }

    async fn bucket_exists(&self) -> Result<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    async fn make_bucket(&self) -> Result<()> {
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| AppError::ObjectStore(e.to_string()))?;
        Ok(())
    }
}
