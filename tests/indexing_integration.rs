//! Integration tests for index building and persistence.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tagdex::backend::{Backend, LocalBackend, Properties, RawEntry};
use tagdex::indexer::{build_index, BuildOptions, IndexPersistence, MetaFolderIndex};
use tagdex::model::{metadata, paths, Location, LocationType};
use tagdex::search::{evaluate, SearchQuery};
use tagdex::Result;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Backend whose listings never complete.
struct HungBackend;

#[async_trait]
impl Backend for HungBackend {
    fn kind(&self) -> LocationType {
        LocationType::Webdav
    }

    async fn list_directory(&self, _path: &str) -> Result<Vec<RawEntry>> {
        std::future::pending().await
    }

    async fn read_text_file(&self, _path: &str) -> Result<String> {
        std::future::pending().await
    }

    async fn write_text_file(&self, _path: &str, _content: &str) -> Result<()> {
        std::future::pending().await
    }

    async fn get_properties(&self, _path: &str) -> Result<Option<Properties>> {
        std::future::pending().await
    }

    async fn rename(&self, _from: &str, _to: &str) -> Result<()> {
        std::future::pending().await
    }

    async fn copy(&self, _from: &str, _to: &str) -> Result<()> {
        std::future::pending().await
    }

    async fn delete(&self, _path: &str) -> Result<()> {
        std::future::pending().await
    }

    async fn create_directory(&self, _path: &str) -> Result<()> {
        std::future::pending().await
    }
}

fn names(entries: &[tagdex::model::Entry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

/// Index of `report.pdf` and `photo[sunset].jpg`; an AND search for
/// `sunset` finds exactly the photo.
#[tokio::test]
async fn test_tag_search_over_built_index() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("report.pdf"), "%PDF").unwrap();
    fs::write(tmp.path().join("photo[sunset].jpg"), [0u8; 16]).unwrap();
    let root = tmp.path().to_string_lossy().into_owned();
    let location = Location::local("Docs", root.clone());

    let outcome = build_index(&LocalBackend::new(), &location, &root, &BuildOptions::default())
        .await
        .unwrap();
    assert!(!outcome.cancelled);
    assert_eq!(outcome.entries.len(), 2);

    let results = evaluate(&outcome.entries, &SearchQuery::new().with_tags_and(["sunset"])).unwrap();
    assert_eq!(names(&results), vec!["photo[sunset].jpg"]);
    assert_eq!(results[0].location_id, location.uuid);
}

/// Sidecar tags and ignore patterns apply across nested directories.
#[tokio::test]
async fn test_nested_sidecars_and_ignores() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_string_lossy().into_owned();
    fs::create_dir_all(tmp.path().join("trips/.ts")).unwrap();
    fs::create_dir_all(tmp.path().join("node_modules/pkg")).unwrap();
    fs::write(tmp.path().join("trips/beach.jpg"), [0u8; 4]).unwrap();
    fs::write(
        tmp.path().join("trips/.ts/beach.jpg.json"),
        r#"{"tags":[{"title":"holiday"}],"description":"Summer"}"#,
    )
    .unwrap();
    fs::write(tmp.path().join("node_modules/pkg/index.js"), "x").unwrap();

    let mut location = Location::local("Docs", root.clone());
    location.ignore_patterns = vec!["node_modules/".to_string()];
    let options = BuildOptions {
        ignore_patterns: location.ignore_patterns.clone(),
        ..BuildOptions::default()
    };

    let outcome = build_index(&LocalBackend::new(), &location, &root, &options)
        .await
        .unwrap();

    let beach = outcome
        .entries
        .iter()
        .find(|e| e.name == "beach.jpg")
        .unwrap();
    assert!(beach.has_tag("holiday"));
    assert_eq!(beach.description.as_deref(), Some("Summer"));
    assert!(outcome.entries.iter().all(|e| !e.path.contains("node_modules")));
    assert!(outcome.entries.iter().all(|e| !metadata::is_meta_path(&e.path)));
}

/// A hung backend call is abandoned once the session is cancelled.
#[tokio::test]
async fn test_cancel_abandons_hung_backend() {
    let location = Location::local("Remote", "/dav/").with_type(LocationType::Webdav);
    let cancel = CancellationToken::new();
    let options = BuildOptions {
        cancel: cancel.clone(),
        ..BuildOptions::default()
    };

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        build_index(&HungBackend, &location, "/dav/", &options),
    )
    .await
    .expect("cancelled build must return")
    .unwrap();

    canceller.await.unwrap();
    assert!(outcome.cancelled);
    assert!(outcome.entries.is_empty());
}

/// A persisted index loads back with the location's uuid.
#[tokio::test]
async fn test_persisted_index_round_trip() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a[x].txt"), "a").unwrap();
    let root = tmp.path().to_string_lossy().into_owned();
    let location = Location::local("Docs", root.clone());
    let backend: Arc<dyn Backend> = Arc::new(LocalBackend::new());

    let outcome = build_index(backend.as_ref(), &location, &root, &BuildOptions::default())
        .await
        .unwrap();
    MetaFolderIndex
        .persist_index(backend.as_ref(), &location, &outcome.entries)
        .await
        .unwrap();
    assert!(fs::metadata(metadata::index_file_path(&root)).is_ok());

    let renamed = location.clone().with_uuid("other");
    let loaded = MetaFolderIndex
        .load_index(backend.as_ref(), &renamed)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(names(&loaded), vec!["a[x].txt"]);
    assert_eq!(loaded[0].location_id, "other");
    assert_eq!(paths::parent(&loaded[0].path), Some(root.as_str()));
}
