//! WebDAV backend.

use async_trait::async_trait;

use super::{Backend, Properties, RawEntry};
use crate::error::BackendError;
use crate::model::{paths, LocationType};
use crate::{Error, Result};

/// One resource from a PROPFIND response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavResource {
    /// Decoded href of the resource.
    pub href: String,
    pub is_collection: bool,
    pub content_length: u64,
    /// Epoch milliseconds.
    pub last_modified: i64,
}

/// Raw WebDAV client.
#[async_trait]
pub trait DavClient: Send + Sync {
    /// PROPFIND with the given `Depth` header (0 or 1).
    async fn propfind(&self, path: &str, depth: u8) -> Result<Vec<DavResource>>;

    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    async fn put(&self, path: &str, body: Vec<u8>) -> Result<()>;

    async fn move_resource(&self, from: &str, to: &str) -> Result<()>;

    async fn copy_resource(&self, from: &str, to: &str) -> Result<()>;

    async fn delete(&self, path: &str) -> Result<()>;

    async fn mkcol(&self, path: &str) -> Result<()>;

    /// Browsable URL of a resource, if the server exposes one.
    fn resource_url(&self, _path: &str) -> Option<String> {
        None
    }
}

/// Backend adapter over a WebDAV client.
#[derive(Debug, Clone)]
pub struct WebDavBackend<C> {
    client: C,
}

impl<C: DavClient> WebDavBackend<C> {
    pub const fn new(client: C) -> Self {
        Self { client }
    }
}

fn to_raw(resource: &DavResource) -> RawEntry {
    RawEntry {
        path: paths::trim_trailing(&resource.href).to_string(),
        is_file: !resource.is_collection,
        size: if resource.is_collection {
            0
        } else {
            resource.content_length
        },
        last_modified: resource.last_modified,
    }
}

#[async_trait]
impl<C: DavClient> Backend for WebDavBackend<C> {
    fn kind(&self) -> LocationType {
        LocationType::Webdav
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<RawEntry>> {
        let own = paths::trim_trailing(path);
        let resources = self.client.propfind(path, 1).await?;
        // Depth 1 includes the collection itself.
        Ok(resources
            .iter()
            .filter(|r| paths::trim_trailing(&r.href) != own)
            .map(to_raw)
            .collect())
    }

    async fn read_text_file(&self, path: &str) -> Result<String> {
        let bytes = self.client.get(path).await?;
        String::from_utf8(bytes)
            .map_err(|e| BackendError::protocol(format!("{path} is not UTF-8 text: {e}")).into())
    }

    async fn write_text_file(&self, path: &str, content: &str) -> Result<()> {
        self.client.put(path, content.as_bytes().to_vec()).await
    }

    async fn get_properties(&self, path: &str) -> Result<Option<Properties>> {
        match self.client.propfind(path, 0).await {
            Ok(resources) => Ok(resources.first().map(|r| to_raw(r).properties())),
            Err(Error::Backend(BackendError::NotFound(_))) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.client.move_resource(from, to).await
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        self.client.copy_resource(from, to).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.client.delete(path).await
    }

    async fn create_directory(&self, path: &str) -> Result<()> {
        self.client.mkcol(path).await
    }

    fn browsable_url(&self, path: &str) -> Option<String> {
        self.client.resource_url(path)
    }
}
