//! In-process object store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::object_store::{ObjectClient, ObjectInfo};
use crate::error::BackendError;
use crate::model::now_millis;
use crate::Result;

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    last_modified: i64,
}

/// Object store kept in memory, keys in lexical order.
///
/// Clone is cheap and clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectClient {
    objects: Arc<Mutex<BTreeMap<String, StoredObject>>>,
}

impl MemoryObjectClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object with an explicit modification time.
    pub fn insert(&self, key: impl Into<String>, body: Vec<u8>, last_modified: i64) {
        self.objects.lock().insert(
            key.into(),
            StoredObject {
                body,
                last_modified,
            },
        );
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

fn info(key: &str, object: &StoredObject) -> ObjectInfo {
    ObjectInfo {
        key: key.to_string(),
        size: object.body.len() as u64,
        last_modified: object.last_modified,
    }
}

#[async_trait]
impl ObjectClient for MemoryObjectClient {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        Ok(self
            .objects
            .lock()
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| info(key, object))
            .collect())
    }

    async fn head_object(&self, key: &str) -> Result<Option<ObjectInfo>> {
        Ok(self.objects.lock().get(key).map(|object| info(key, object)))
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .get(key)
            .map(|object| object.body.clone())
            .ok_or_else(|| BackendError::NotFound(key.to_string()).into())
    }

    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.insert(key, body, now_millis());
        Ok(())
    }

    async fn copy_object(&self, from: &str, to: &str) -> Result<()> {
        let mut objects = self.objects.lock();
        let object = objects
            .get(from)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(from.to_string()))?;
        objects.insert(to.to_string(), object);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.objects
            .lock()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(key.to_string()).into())
    }

    fn presigned_url(&self, key: &str) -> Option<String> {
        Some(format!("memory://{key}"))
    }
}
