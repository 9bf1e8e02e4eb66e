//! Object-store backend.
//!
//! Object stores only know flat keys. A directory is any key prefix ending
//! in `/`; listing a directory groups the keys below it by their next
//! segment.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{Backend, Properties, RawEntry};
use crate::error::BackendError;
use crate::model::{paths, LocationType};
use crate::Result;

/// One stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    /// Epoch milliseconds.
    pub last_modified: i64,
}

/// A key prefix standing for a directory in a delimited listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonPrefix {
    /// Prefix including its trailing `/`.
    pub prefix: String,
    /// Newest modification below the prefix, when the service reports it.
    pub last_modified: Option<i64>,
}

/// One level of keys below a prefix, as a listing with delimiter `/`
/// returns it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListing {
    pub objects: Vec<ObjectInfo>,
    pub prefixes: Vec<CommonPrefix>,
}

impl ObjectListing {
    /// Group the descendants of `prefix` into direct objects and common
    /// prefixes.
    #[must_use]
    pub fn group(prefix: &str, descendants: Vec<ObjectInfo>) -> Self {
        let mut listing = Self::default();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for object in descendants {
            let Some(rest) = object.key.strip_prefix(prefix) else {
                continue;
            };
            if rest.is_empty() {
                // Directory marker of the prefix itself.
                continue;
            }
            match rest.find('/') {
                Some(idx) => {
                    let dir = format!("{prefix}{}", &rest[..=idx]);
                    if let Some(&pos) = seen.get(&dir) {
                        let common = &mut listing.prefixes[pos];
                        common.last_modified = common.last_modified.max(Some(object.last_modified));
                    } else {
                        seen.insert(dir.clone(), listing.prefixes.len());
                        listing.prefixes.push(CommonPrefix {
                            prefix: dir,
                            last_modified: Some(object.last_modified),
                        });
                    }
                }
                None => listing.objects.push(object),
            }
        }
        listing
    }
}

/// Raw object-store client (S3 and compatible services).
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// All objects whose key starts with `prefix`.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    /// Direct children of `prefix`.
    ///
    /// The default groups `list_objects`, which transfers every descendant
    /// key, so walking a deep bucket one directory at a time re-lists the
    /// same keys once per level. Clients for services with a delimiter
    /// listing should override it.
    async fn list_children(&self, prefix: &str) -> Result<ObjectListing> {
        let descendants = self.list_objects(prefix).await?;
        Ok(ObjectListing::group(prefix, descendants))
    }

    async fn head_object(&self, key: &str) -> Result<Option<ObjectInfo>>;

    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;

    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<()>;

    async fn copy_object(&self, from: &str, to: &str) -> Result<()>;

    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Time-limited signed URL for a key.
    fn presigned_url(&self, key: &str) -> Option<String>;
}

/// Backend adapter over an object-store client.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend<C> {
    client: C,
}

impl<C: ObjectClient> ObjectStoreBackend<C> {
    pub const fn new(client: C) -> Self {
        Self { client }
    }

    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    async fn keys_below(&self, path: &str) -> Result<Vec<ObjectInfo>> {
        self.client.list_objects(&dir_prefix(path)).await
    }
}

/// Object key for a path.
fn object_key(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Key prefix of a directory (`""` for the bucket root).
fn dir_prefix(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

#[async_trait]
impl<C: ObjectClient> Backend for ObjectStoreBackend<C> {
    fn kind(&self) -> LocationType {
        LocationType::Cloud
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<RawEntry>> {
        let listing = self.client.list_children(&dir_prefix(path)).await?;

        let mut entries: Vec<RawEntry> = listing
            .prefixes
            .into_iter()
            .map(|common| RawEntry {
                path: common.prefix.trim_end_matches('/').to_string(),
                is_file: false,
                size: 0,
                last_modified: common.last_modified.unwrap_or(0),
            })
            .chain(listing.objects.into_iter().map(|object| RawEntry {
                path: object.key,
                is_file: true,
                size: object.size,
                last_modified: object.last_modified,
            }))
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn read_text_file(&self, path: &str) -> Result<String> {
        let bytes = self.client.get_object(object_key(path)).await?;
        String::from_utf8(bytes)
            .map_err(|e| BackendError::protocol(format!("{path} is not UTF-8 text: {e}")).into())
    }

    async fn write_text_file(&self, path: &str, content: &str) -> Result<()> {
        self.client
            .put_object(object_key(path), content.as_bytes().to_vec())
            .await
    }

    async fn get_properties(&self, path: &str) -> Result<Option<Properties>> {
        if let Some(object) = self.client.head_object(object_key(path)).await? {
            if !object.key.ends_with('/') {
                return Ok(Some(Properties {
                    is_file: true,
                    size: object.size,
                    last_modified: object.last_modified,
                }));
            }
        }

        let below = self.keys_below(path).await?;
        if below.is_empty() {
            return Ok(None);
        }
        let last_modified = below.iter().map(|o| o.last_modified).max().unwrap_or(0);
        Ok(Some(Properties {
            is_file: false,
            size: 0,
            last_modified,
        }))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.copy(from, to).await?;
        self.delete(from).await
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        if self.client.head_object(object_key(from)).await?.is_some() {
            return self
                .client
                .copy_object(object_key(from), object_key(to))
                .await;
        }

        let below = self.keys_below(from).await?;
        if below.is_empty() {
            return Err(BackendError::NotFound(from.to_string()).into());
        }
        let from_dir = dir_prefix(from);
        let to_dir = dir_prefix(to);
        for object in below {
            let target = format!("{to_dir}{}", &object.key[from_dir.len()..]);
            self.client.copy_object(&object.key, &target).await?;
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        if self.client.head_object(object_key(path)).await?.is_some() {
            return self.client.delete_object(object_key(path)).await;
        }

        let below = self.keys_below(path).await?;
        if below.is_empty() {
            return Err(BackendError::NotFound(path.to_string()).into());
        }
        for object in below {
            self.client.delete_object(&object.key).await?;
        }
        Ok(())
    }

    async fn create_directory(&self, path: &str) -> Result<()> {
        self.client.put_object(&dir_prefix(path), Vec::new()).await
    }

    fn browsable_url(&self, path: &str) -> Option<String> {
        let key = object_key(paths::trim_trailing(path));
        self.client.presigned_url(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryObjectClient;

    async fn seeded() -> ObjectStoreBackend<MemoryObjectClient> {
        let client = MemoryObjectClient::new();
        client.insert("photos/a[sunset].jpg", b"jpeg".to_vec(), 100);
        client.insert("photos/trip/b.jpg", b"jpeg".to_vec(), 300);
        client.insert("photos/trip/c.jpg", b"jpeg".to_vec(), 200);
        client.insert("photos/empty/", Vec::new(), 50);
        client.insert("photos/.ts/a[sunset].jpg.json", br#"{"tags":[]}"#.to_vec(), 10);
        client.insert("docs/readme.md", b"# hi".to_vec(), 10);
        ObjectStoreBackend::new(client)
    }

    #[tokio::test]
    async fn test_list_reinterprets_keys_as_tree() {
        let backend = seeded().await;
        let listing = backend.list_directory("photos").await.unwrap();

        let paths: Vec<_> = listing.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["photos/.ts", "photos/a[sunset].jpg", "photos/empty", "photos/trip"]
        );

        let trip = listing.iter().find(|r| r.path == "photos/trip").unwrap();
        assert!(!trip.is_file);
        assert_eq!(trip.last_modified, 300);

        let file = listing.iter().find(|r| r.is_file).unwrap();
        assert_eq!(file.size, 4);
    }

    /// Client answering directory listings natively, without timestamps.
    struct DelimitedClient(MemoryObjectClient);

    #[async_trait]
    impl ObjectClient for DelimitedClient {
        async fn list_objects(&self, _prefix: &str) -> Result<Vec<ObjectInfo>> {
            Err(BackendError::protocol("full listing not expected").into())
        }

        async fn list_children(&self, prefix: &str) -> Result<ObjectListing> {
            let mut listing = self.0.list_children(prefix).await?;
            for common in &mut listing.prefixes {
                common.last_modified = None;
            }
            Ok(listing)
        }

        async fn head_object(&self, key: &str) -> Result<Option<ObjectInfo>> {
            self.0.head_object(key).await
        }

        async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
            self.0.get_object(key).await
        }

        async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<()> {
            self.0.put_object(key, body).await
        }

        async fn copy_object(&self, from: &str, to: &str) -> Result<()> {
            self.0.copy_object(from, to).await
        }

        async fn delete_object(&self, key: &str) -> Result<()> {
            self.0.delete_object(key).await
        }

        fn presigned_url(&self, key: &str) -> Option<String> {
            self.0.presigned_url(key)
        }
    }

    #[test]
    fn test_group_splits_objects_and_prefixes() {
        let object = |key: &str, last_modified| ObjectInfo {
            key: key.to_string(),
            size: 1,
            last_modified,
        };
        let listing = ObjectListing::group(
            "p/",
            vec![
                object("p/", 1),
                object("p/a.txt", 2),
                object("p/d/x", 5),
                object("p/d/y/z", 9),
            ],
        );

        assert_eq!(listing.objects.len(), 1);
        assert_eq!(listing.objects[0].key, "p/a.txt");
        assert_eq!(
            listing.prefixes,
            vec![CommonPrefix {
                prefix: "p/d/".to_string(),
                last_modified: Some(9),
            }]
        );
    }

    #[tokio::test]
    async fn test_list_uses_delimited_listing() {
        let backend = seeded().await;
        let native = ObjectStoreBackend::new(DelimitedClient(backend.client().clone()));

        let listing = native.list_directory("photos").await.unwrap();
        let paths: Vec<_> = listing.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["photos/.ts", "photos/a[sunset].jpg", "photos/empty", "photos/trip"]
        );
        let trip = listing.iter().find(|r| r.path == "photos/trip").unwrap();
        assert_eq!(trip.last_modified, 0);
    }

    #[tokio::test]
    async fn test_list_root() {
        let backend = seeded().await;
        let listing = backend.list_directory("/").await.unwrap();
        let paths: Vec<_> = listing.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["docs", "photos"]);
    }

    #[tokio::test]
    async fn test_properties_for_files_and_prefixes() {
        let backend = seeded().await;

        let file = backend.get_properties("docs/readme.md").await.unwrap().unwrap();
        assert!(file.is_file);

        let dir = backend.get_properties("photos/trip").await.unwrap().unwrap();
        assert!(!dir.is_file);
        assert_eq!(dir.last_modified, 300);

        assert!(backend.get_properties("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rename_directory_moves_all_keys() {
        let backend = seeded().await;
        backend.rename("photos/trip", "photos/journey").await.unwrap();

        assert!(backend.get_properties("photos/trip").await.unwrap().is_none());
        let listing = backend.list_directory("photos/journey").await.unwrap();
        assert_eq!(listing.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let backend = seeded().await;
        let err = backend.delete("photos/none").await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Backend(BackendError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_text_and_urls() {
        let backend = seeded().await;
        assert_eq!(backend.read_text_file("docs/readme.md").await.unwrap(), "# hi");

        backend.write_text_file("/docs/new.txt", "x").await.unwrap();
        assert!(backend.get_properties("docs/new.txt").await.unwrap().is_some());

        assert_eq!(
            backend.browsable_url("/docs/readme.md").as_deref(),
            Some("memory://docs/readme.md")
        );

        backend.create_directory("docs/sub").await.unwrap();
        let dir = backend.get_properties("docs/sub").await.unwrap().unwrap();
        assert!(!dir.is_file);
    }
}
