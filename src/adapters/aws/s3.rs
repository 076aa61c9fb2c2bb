use crate::ports::health::HealthCheck;
use crate::ports::storage::StoragePort;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::error::Error;
use std::path::Path;
use tokio::fs::File;
use tracing::{debug, info};

/// Connection settings for an S3-compatible endpoint (MinIO, AWS).
#[derive(Clone, Debug)]
pub struct S3Settings {
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// S3Adapter implements StoragePort for an S3-compatible store.
#[derive(Clone)]
pub struct S3Adapter {
    client: Client,
    source_bucket: String,
    processed_bucket: String,
}

impl S3Adapter {
    pub fn new(client: Client, source_bucket: String, processed_bucket: String) -> Self {
        Self {
            client,
            source_bucket,
            processed_bucket,
        }
    }

    /// Static credentials against a custom endpoint, path-style addressing.
    pub async fn connect(
        settings: &S3Settings,
        source_bucket: String,
        processed_bucket: String,
    ) -> Self {
        let credentials = Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None,
            None,
            "static",
        );
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&settings.endpoint)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(true)
            .build();

        Self::new(
            Client::from_conf(s3_config),
            source_bucket,
            processed_bucket,
        )
    }

    /// Create the source and processed buckets when they do not exist yet.
    pub async fn ensure_buckets(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        for bucket in [&self.source_bucket, &self.processed_bucket] {
            if self.client.head_bucket().bucket(bucket).send().await.is_ok() {
                continue;
            }
            self.client.create_bucket().bucket(bucket).send().await?;
            info!(bucket = %bucket, "created bucket");
        }
        Ok(())
    }
}

#[async_trait]
impl StoragePort for S3Adapter {
    async fn download(
        &self,
        key: &str,
        local_path: &Path,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.source_bucket)
            .key(key)
            .send()
            .await?;

        let body = resp.body.into_async_read();
        tokio::pin!(body);
        let mut file = File::create(local_path).await?;
        let bytes = tokio::io::copy(&mut body, &mut file).await?;
        debug!(key, bytes, "downloaded object");
        Ok(())
    }

    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let byte_stream = ByteStream::from_path(local_path).await?;

        self.client
            .put_object()
            .bucket(&self.processed_bucket)
            .key(key)
            .content_type(content_type)
            .body(byte_stream)
            .send()
            .await?;
        debug!(key, content_type, "uploaded object");
        Ok(())
    }
}

#[async_trait]
impl HealthCheck for S3Adapter {
    fn name(&self) -> &str {
        "storage"
    }

    async fn check(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        for bucket in [&self.source_bucket, &self.processed_bucket] {
            self.client
                .head_bucket()
                .bucket(bucket)
                .send()
                .await
                .map_err(|e| format!("bucket {bucket}: {e}"))?;
        }
        Ok(())
    }
}
