use std::time::Duration;

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use tracing::debug;

use super::error::StorageError;
use super::traits::{ContentStore, ObjectTags};
use crate::config::ObjectStoreConfig;

/// S3-compatible content store (AWS S3, MinIO, Ceph RGW).
///
/// Uses path-style addressing so it works against self-hosted endpoints.
pub struct S3ContentStore {
    bucket: Box<Bucket>,
    public_base: String,
}

impl S3ContentStore {
    pub fn new(config: &ObjectStoreConfig) -> Result<Self, StorageError> {
        let endpoint = config.endpoint_url();
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: endpoint.clone(),
        };
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(format!("invalid credentials: {e}")))?;

        let bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(backend)?
            .with_path_style();

        Ok(Self {
            bucket,
            public_base: format!("{}/{}", endpoint.trim_end_matches('/'), config.bucket),
        })
    }
}

fn backend(e: S3Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn not_found_or_backend(key: &str, e: S3Error) -> StorageError {
    match e {
        S3Error::HttpFailWithBody(404, _) => StorageError::NotFound(key.to_string()),
        other => backend(other),
    }
}

fn ttl_secs(key: &str, ttl: Duration) -> Result<u32, StorageError> {
    u32::try_from(ttl.as_secs()).map_err(|_| StorageError::Presign {
        key: key.to_string(),
        reason: format!("ttl of {}s is too large", ttl.as_secs()),
    })
}

/// The object size reported by HEAD. A missing or negative length is an
/// error: callers record this value as the content's size.
fn content_length(key: &str, reported: Option<i64>) -> Result<u64, StorageError> {
    let len = reported.ok_or_else(|| {
        StorageError::Backend(format!("HEAD {key} returned no content length"))
    })?;
    u64::try_from(len).map_err(|_| {
        StorageError::Backend(format!("HEAD {key} returned invalid content length {len}"))
    })
}

#[async_trait]
impl ContentStore for S3ContentStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError> {
        self.bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn presigned_put(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let secs = ttl_secs(key, ttl)?;
        self.bucket
            .presign_put(key, secs, None, None)
            .await
            .map_err(|e| StorageError::Presign {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn presigned_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let secs = ttl_secs(key, ttl)?;
        self.bucket
            .presign_get(key, secs, None)
            .await
            .map_err(|e| StorageError::Presign {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }

    async fn stat(&self, key: &str) -> Result<u64, StorageError> {
        let (head, _status) = self
            .bucket
            .head_object(key)
            .await
            .map_err(|e| not_found_or_backend(key, e))?;
        content_length(key, head.content_length)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self.bucket.delete_object(key).await {
            Ok(_) => Ok(()),
            Err(S3Error::HttpFailWithBody(404, _)) => {
                debug!(key, "Object already absent");
                Ok(())
            }
            Err(e) => Err(backend(e)),
        }
    }

    async fn get_tags(&self, key: &str) -> Result<ObjectTags, StorageError> {
        let (tags, _status) = self
            .bucket
            .get_object_tagging(key)
            .await
            .map_err(|e| not_found_or_backend(key, e))?;
        Ok(tags.into_iter().map(|t| (t.key(), t.value())).collect())
    }

    async fn set_tags(&self, key: &str, tags: &ObjectTags) -> Result<(), StorageError> {
        let pairs: Vec<(&str, &str)> = tags
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        self.bucket
            .put_object_tagging(key, &pairs)
            .await
            .map_err(|e| not_found_or_backend(key, e))?;
        Ok(())
    }

    async fn clear_tags(&self, key: &str) -> Result<(), StorageError> {
        self.bucket
            .delete_object_tagging(key)
            .await
            .map_err(|e| not_found_or_backend(key, e))?;
        Ok(())
    }
}
