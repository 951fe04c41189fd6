use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use bytes::Bytes;
use tracing::{debug, info};

use super::ObjectStore;

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
}

impl StorageService {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(config);

        info!("✅ Configured S3 client for {}", endpoint);

        Self { client }
    }
}

#[async_trait]
impl ObjectStore for StorageService {
    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        debug!("⬆️ Uploading {} bytes to s3://{}/{}", body.len(), bucket, key);

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| anyhow!("Failed to upload s3://{}/{}: {}", bucket, key, e))?;

        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<ByteStream> {
        debug!("⬇️ Downloading s3://{}/{}", bucket, key);

        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to download s3://{}/{}: {}", bucket, key, e))?;

        Ok(object.body)
    }
}
