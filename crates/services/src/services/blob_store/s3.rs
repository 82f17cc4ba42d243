//! S3 and S3-compatible object storage.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{
    Client,
    config::{Builder as S3ConfigBuilder, Credentials},
    error::DisplayErrorContext,
    presigning::PresigningConfig,
    primitives::ByteStream,
};

use super::{BlobStore, BlobStoreError};
use crate::services::config::S3Config;

#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: Client,
}

fn upstream<E: std::error::Error>(err: E) -> BlobStoreError {
    BlobStoreError::Upstream(DisplayErrorContext(&err).to_string())
}

impl S3BlobStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from the ambient AWS configuration, overridden by
    /// whatever `config` sets. A custom endpoint switches to path-style
    /// addressing for S3-compatible services.
    pub async fn from_config(config: &S3Config) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
        if let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "tasker-config",
            ));
        }
        let shared = loader.load().await;

        let mut builder = S3ConfigBuilder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self::new(Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BlobStoreError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(upstream)?;
        Ok(())
    }

    // DeleteObject succeeds for missing keys.
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), BlobStoreError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(upstream)?;
        Ok(())
    }

    async fn presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, BlobStoreError> {
        let presigning = PresigningConfig::expires_in(expires_in).map_err(upstream)?;
        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(upstream)?;
        Ok(request.uri().to_string())
    }
}
