//! Attachment file access (local disk or S3)
use super::{FileSource, StorageError};
use crate::services::image_reference::parse_s3_uri;
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use tokio::io::AsyncReadExt;

/// Reads attachment files from local disk, or from S3 for `s3://` paths
#[derive(Clone, Default)]
pub struct AttachmentFiles {
    s3: Option<S3Client>,
}

impl AttachmentFiles {
    /// Local files only; `s3://` paths fail with an object storage error
    pub fn local() -> Self {
        Self { s3: None }
    }

    pub fn with_s3(client: S3Client) -> Self {
        Self { s3: Some(client) }
    }

    async fn read_s3(
        &self,
        bucket: &str,
        key: &str,
        range: Option<String>,
    ) -> Result<Vec<u8>, StorageError> {
        let client = self.s3.as_ref().ok_or_else(|| {
            StorageError::ObjectStorage(format!(
                "no S3 client configured for s3://{}/{}",
                bucket, key
            ))
        })?;

        let response = client
            .get_object()
            .bucket(bucket)
            .key(key)
            .set_range(range)
            .send()
            .await
            .map_err(|e| {
                StorageError::ObjectStorage(format!("Failed to read s3://{}/{}: {}", bucket, key, e))
            })?;

        let data = response.body.collect().await.map_err(|e| {
            StorageError::ObjectStorage(format!("Failed to read S3 body: {}", e))
        })?;

        Ok(data.into_bytes().to_vec())
    }
}

#[async_trait]
impl FileSource for AttachmentFiles {
    async fn read_head(&self, path: &str, len: usize) -> Result<Vec<u8>, StorageError> {
        if len == 0 {
            return Ok(Vec::new());
        }

        if let Some((bucket, key)) = parse_s3_uri(path) {
            let range = format!("bytes=0-{}", len - 1);
            let mut bytes = self.read_s3(&bucket, &key, Some(range)).await?;
            bytes.truncate(len);
            return Ok(bytes);
        }

        let file = tokio::fs::File::open(path).await?;
        let mut buffer = Vec::with_capacity(len);
        file.take(len as u64).read_to_end(&mut buffer).await?;
        Ok(buffer)
    }

    async fn read_all(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        if let Some((bucket, key)) = parse_s3_uri(path) {
            return self.read_s3(&bucket, &key, None).await;
        }

        Ok(tokio::fs::read(path).await?)
    }
}
