use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use super::error::StorageError;

/// Tag set attached to an object in the content store.
pub type ObjectTags = HashMap<String, String>;

/// Tag key/value the bucket policy uses to grant anonymous read access.
pub const PUBLIC_TAG_KEY: &str = "public";
pub const PUBLIC_TAG_VALUE: &str = "true";

/// Build the tag set that marks an object as publicly readable.
pub fn public_tags() -> ObjectTags {
    HashMap::from([(PUBLIC_TAG_KEY.to_string(), PUBLIC_TAG_VALUE.to_string())])
}

/// Content-addressed object store reached over the network.
///
/// Keys are opaque to the store; callers derive them from content hashes.
/// Every async method may block on network I/O, so callers must not hold
/// database row locks across them unless they mean to.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Write an object directly.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError>;

    /// Produce a time-limited URL that lets a client PUT the object directly.
    async fn presigned_put(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;

    /// Produce a time-limited URL that lets a client GET the object directly.
    async fn presigned_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;

    /// Stable unsigned URL. Only readable when the bucket policy allows it
    /// (i.e. the object carries the public tag).
    fn public_url(&self, key: &str) -> String;

    /// Size in bytes of the stored object, as observed by the store.
    ///
    /// Callers persist this value as the content's size, so an adapter that
    /// cannot determine the size must return an error rather than guess.
    async fn stat(&self, key: &str) -> Result<u64, StorageError>;

    /// Remove the object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    async fn get_tags(&self, key: &str) -> Result<ObjectTags, StorageError>;

    /// Replace the object's tag set.
    async fn set_tags(&self, key: &str, tags: &ObjectTags) -> Result<(), StorageError>;

    /// Remove every tag from the object.
    async fn clear_tags(&self, key: &str) -> Result<(), StorageError>;
}
