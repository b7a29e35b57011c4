use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Remote object store holding the source fragments and the produced artifacts.
///
/// The bucket is bound when the service is built; callers only ever pass object keys.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Name of the bucket this service reads from and writes to
    fn bucket(&self) -> &str;
    /// Fetch `key` into a local file at `path`, returning the number of bytes written
    async fn download_to_path(&self, key: &str, path: &Path) -> Result<u64>;
    async fn upload_from_path(&self, key: &str, path: &Path) -> Result<()>;
    async fn file_exists(&self, key: &str) -> Result<bool>;
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn download_to_path(&self, key: &str, path: &Path) -> Result<u64> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    "S3 get_object failed: {}/{}, error={}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                );
                anyhow!(
                    "Failed to fetch s3://{}/{}: {}",
                    self.bucket,
                    key,
                    e.into_service_error()
                )
            })?;

        let mut reader = res.body.into_async_read();
        let mut file = tokio::fs::File::create(path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let written = tokio::io::copy(&mut reader, &mut file)
            .await
            .with_context(|| format!("Failed to read body of s3://{}/{}", self.bucket, key))?;
        file.flush().await?;

        Ok(written)
    }

    async fn upload_from_path(&self, key: &str, path: &Path) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .with_context(|| format!("Failed to open artifact {}", path.display()))?;

        let res = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await;

        if let Err(e) = res {
            tracing::error!(
                "S3 put_object failed: dest={}/{}, error={}",
                self.bucket,
                key,
                DisplayErrorContext(&e)
            );
            return Err(anyhow!(
                "Failed to upload s3://{}/{}: {}",
                self.bucket,
                key,
                e.into_service_error()
            ));
        }
        Ok(())
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow!(service_error))
                }
            }
        }
    }
}
