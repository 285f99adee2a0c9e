use super::{ObjectStore, content_type_for, object_url};
use crate::config::ObjectStoreConfig;
use crate::error::CollectorError;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;
use tracing::info;

/// S3-compatible object store (MinIO and friends), path-style addressing.
pub struct S3ObjectStore {
    client: Client,
    endpoint: String,
    bucket: String,
}

impl S3ObjectStore {
    /// Builds the client and confirms the destination bucket exists, creating
    /// it if absent. Any other bootstrap failure is fatal: the service must
    /// not accept work against a store it cannot write to.
    pub async fn connect(config: &ObjectStoreConfig) -> Result<Self, CollectorError> {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "gdelt-collector",
        );
        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(config.endpoint.clone())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let store = Self {
            client: Client::from_conf(s3_config),
            endpoint: config.endpoint.clone(),
            bucket: config.bucket.clone(),
        };
        store.ensure_bucket().await?;
        Ok(store)
    }

    async fn ensure_bucket(&self) -> Result<(), CollectorError> {
        let head = self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await;

        match head {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(context)) if context.err().is_not_found() => {
                info!(bucket = self.bucket, "Bucket missing, creating");
                self.client
                    .create_bucket()
                    .bucket(&self.bucket)
                    .send()
                    .await
                    .map_err(|e| CollectorError::Storage {
                        object: self.bucket.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(())
            }
            Err(err) => Err(CollectorError::Storage {
                object: self.bucket.clone(),
                reason: err.to_string(),
            }),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(
        &self,
        object_name: &str,
        local_path: &Path,
    ) -> Result<String, CollectorError> {
        let storage_err = |reason: String| CollectorError::Storage {
            object: object_name.to_string(),
            reason,
        };

        let size = tokio::fs::metadata(local_path).await?.len();
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| storage_err(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(object_name)
            .content_length(size as i64)
            .content_type(content_type_for(object_name))
            .body(body)
            .send()
            .await
            .map_err(|e| storage_err(e.to_string()))?;

        Ok(self.url(object_name))
    }

    async fn delete(&self, object_name: &str) -> Result<(), CollectorError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(object_name)
            .send()
            .await
            .map_err(|e| CollectorError::Storage {
                object: object_name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn url(&self, object_name: &str) -> String {
        object_url(&self.endpoint, &self.bucket, object_name)
    }
}
