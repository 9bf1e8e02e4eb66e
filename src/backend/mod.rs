//! Storage backends behind a single async interface.
//!
//! This module provides:
//! - The `Backend` trait consumed by the index builder and services
//! - `LocalBackend` over `tokio::fs`
//! - `ObjectStoreBackend`, reinterpreting flat object keys as a tree
//! - `WebDavBackend`, listing collections with PROPFIND
//! - `BackendRegistry`, resolving a location to its backend

mod local;
mod memory;
mod object_store;
mod webdav;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

pub use local::LocalBackend;
pub use memory::MemoryObjectClient;
pub use object_store::{
    CommonPrefix, ObjectClient, ObjectInfo, ObjectListing, ObjectStoreBackend,
};
pub use webdav::{DavClient, DavResource, WebDavBackend};

pub use crate::model::{Properties, RawEntry};
use crate::error::LocationError;
use crate::model::{Location, LocationType};
use crate::Result;

/// Raw I/O primitives of one storage backend.
///
/// Listing is shallow: the index builder drives recursion itself so it can
/// prune ignored subtrees and honor cancellation between directories.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend family.
    fn kind(&self) -> LocationType;

    /// Whether filesystem change notification is available.
    fn supports_watching(&self) -> bool {
        self.kind().supports_watching()
    }

    /// List the direct children of a directory.
    async fn list_directory(&self, path: &str) -> Result<Vec<RawEntry>>;

    async fn read_text_file(&self, path: &str) -> Result<String>;

    async fn write_text_file(&self, path: &str, content: &str) -> Result<()>;

    /// Properties of a path, `None` if it does not exist.
    async fn get_properties(&self, path: &str) -> Result<Option<Properties>>;

    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    async fn copy(&self, from: &str, to: &str) -> Result<()>;

    async fn delete(&self, path: &str) -> Result<()>;

    async fn create_directory(&self, path: &str) -> Result<()>;

    /// Signed or browsable URL for a path, for remote backends.
    fn browsable_url(&self, _path: &str) -> Option<String> {
        None
    }
}

/// Maps a location to the backend serving it.
pub trait BackendResolver: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if no backend serves the location.
    fn backend_for(&self, location: &Location) -> Result<Arc<dyn Backend>>;
}

/// Backend lookup by location uuid.
///
/// Local locations without an explicit registration share one
/// `LocalBackend`. Clone is cheap.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: Arc<RwLock<HashMap<String, Arc<dyn Backend>>>>,
    local: Arc<LocalBackend>,
}

impl BackendRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the backend serving `location_id`.
    pub fn register(&self, location_id: impl Into<String>, backend: Arc<dyn Backend>) {
        self.backends.write().insert(location_id.into(), backend);
    }

    /// Forget the backend of `location_id`.
    pub fn unregister(&self, location_id: &str) -> bool {
        self.backends.write().remove(location_id).is_some()
    }
}

impl BackendResolver for BackendRegistry {
    fn backend_for(&self, location: &Location) -> Result<Arc<dyn Backend>> {
        if let Some(backend) = self.backends.read().get(&location.uuid) {
            return Ok(Arc::clone(backend));
        }
        match location.location_type {
            LocationType::Local => Ok(Arc::clone(&self.local) as Arc<dyn Backend>),
            LocationType::Cloud | LocationType::Webdav => {
                Err(LocationError::NoBackend(location.name.clone()).into())
            }
        }
    }
}
