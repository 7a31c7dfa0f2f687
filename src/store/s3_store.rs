use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::reference::TemporaryResourceReference;
use super::resource_store::ResourceStore;
use crate::error::StorageError;

/// S3-backed implementation of [`ResourceStore`].
///
/// Each temporary resource becomes one object, keyed by
/// `{prefix}/{module}/{scope}/{resource}`. Sharing a bucket lets several
/// server instances reuse each other's rendered formulas.
///
/// Expiry of the objects is left to the bucket's lifecycle rules.
#[derive(Clone)]
pub struct S3ResourceStore {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    identifier: String,
}

impl S3ResourceStore {
    /// Create a new store for the given bucket and optional key prefix.
    pub fn new(client: Client, bucket: String, prefix: Option<String>) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        let identifier = match &prefix {
            Some(prefix) => format!("s3://{}/{}", bucket, prefix),
            None => format!("s3://{}", bucket),
        };
        Self {
            client,
            bucket,
            prefix,
            identifier,
        }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key of a resource.
    pub fn object_key(&self, reference: &TemporaryResourceReference) -> Result<String, StorageError> {
        let key = reference.storage_key()?;
        Ok(match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key,
        })
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

#[async_trait]
impl ResourceStore for S3ResourceStore {
    async fn read(&self, reference: &TemporaryResourceReference) -> Result<Bytes, StorageError> {
        let key = self.object_key(reference)?;

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);

                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);

                if is_not_found || status_is_404 {
                    return StorageError::NotFound(self.location(&key));
                }

                StorageError::S3(e.to_string())
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .into_bytes();

        Ok(data)
    }

    async fn write(
        &self,
        reference: &TemporaryResourceReference,
        data: Bytes,
    ) -> Result<(), StorageError> {
        let key = self.object_key(reference)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("{}: {}", self.location(&key), e)))?;

        Ok(())
    }

    async fn exists(&self, reference: &TemporaryResourceReference) -> Result<bool, StorageError> {
        let key = self.object_key(reference)?;

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_not_found())
                    .unwrap_or(false);
                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);

                if is_not_found || status_is_404 {
                    Ok(false)
                } else {
                    Err(StorageError::S3(e.to_string()))
                }
            }
        }
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services generally need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
