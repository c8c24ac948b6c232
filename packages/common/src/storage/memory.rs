use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use super::error::StorageError;
use super::traits::{ContentStore, ObjectTags};

#[derive(Debug, Clone, Default)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
    tags: ObjectTags,
}

/// In-process content store.
///
/// Behaves like a bucket reached through presigned URLs: `presigned_put`
/// only hands out a URL, the object appears once something calls
/// [`MemoryContentStore::simulate_client_put`] (or [`ContentStore::put`]).
/// Every deletion is recorded, and tag/delete calls can be made to fail
/// so callers can observe their log-not-fail paths.
pub struct MemoryContentStore {
    base_url: String,
    objects: DashMap<String, StoredObject>,
    deletions: Mutex<Vec<String>>,
    fail_tags: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryContentStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: DashMap::new(),
            deletions: Mutex::new(Vec::new()),
            fail_tags: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Stand-in for a client uploading through a presigned PUT URL.
    pub fn simulate_client_put(&self, key: &str, data: &[u8]) {
        self.objects.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: "application/octet-stream".into(),
                tags: ObjectTags::new(),
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn read(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.get(key).map(|o| o.data.clone())
    }

    pub fn content_type_of(&self, key: &str) -> Option<String> {
        self.objects.get(key).map(|o| o.content_type.clone())
    }

    pub fn tags_of(&self, key: &str) -> Option<ObjectTags> {
        self.objects.get(key).map(|o| o.tags.clone())
    }

    /// Keys passed to `delete`, in call order.
    pub fn deletions(&self) -> Vec<String> {
        self.deletions
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    /// Make every subsequent tag call fail with a backend error.
    pub fn fail_tag_calls(&self, fail: bool) {
        self.fail_tags.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent delete call fail with a backend error.
    pub fn fail_delete_calls(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    fn check_tags(&self) -> Result<(), StorageError> {
        if self.fail_tags.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected tag failure".into()));
        }
        Ok(())
    }

    fn signed(&self, method: &str, key: &str, ttl: Duration) -> String {
        format!(
            "{}/{}?X-Method={method}&X-Expires={}&X-Signature={}",
            self.base_url,
            key,
            ttl.as_secs(),
            uuid::Uuid::new_v4().simple()
        )
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new("http://memory.local/vault")
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError> {
        self.objects.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
                tags: ObjectTags::new(),
            },
        );
        Ok(())
    }

    async fn presigned_put(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        Ok(self.signed("PUT", key, ttl))
    }

    async fn presigned_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        Ok(self.signed("GET", key, ttl))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    async fn stat(&self, key: &str) -> Result<u64, StorageError> {
        self.objects
            .get(key)
            .map(|o| o.data.len() as u64)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected delete failure".into()));
        }
        if let Ok(mut deletions) = self.deletions.lock() {
            deletions.push(key.to_string());
        }
        self.objects.remove(key);
        Ok(())
    }

    async fn get_tags(&self, key: &str) -> Result<ObjectTags, StorageError> {
        self.check_tags()?;
        self.objects
            .get(key)
            .map(|o| o.tags.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn set_tags(&self, key: &str, tags: &ObjectTags) -> Result<(), StorageError> {
        self.check_tags()?;
        let mut entry = self
            .objects
            .get_mut(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        entry.tags = tags.clone();
        Ok(())
    }

    async fn clear_tags(&self, key: &str) -> Result<(), StorageError> {
        self.check_tags()?;
        let mut entry = self
            .objects
            .get_mut(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        entry.tags.clear();
        Ok(())
    }
}
