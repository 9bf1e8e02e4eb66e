//! Directory index builder.
//!
//! Walks a location depth-first through the backend's shallow listings,
//! merging metadata-folder content into the entries it produces.

use std::collections::HashMap;
use std::future::Future;

use tokio_util::sync::CancellationToken;

use super::filter::{self, PathFilter};
use crate::backend::Backend;
use crate::config::Config;
use crate::error::LocationError;
use crate::model::metadata::{self, MetaListing, META_FOLDER};
use crate::model::{Entry, Location, RawEntry};
use crate::telemetry::metrics::INDEX_BUILDS;
use crate::Result;

/// Options for one build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Attach text excerpts to eligible files.
    pub extract_text: bool,
    /// Gitignore-style exclusions.
    pub ignore_patterns: Vec<String>,
    pub cancel: CancellationToken,
    /// Directory levels below the root to descend (`None` = unbounded).
    pub max_depth: Option<usize>,
    pub text_max_bytes: u64,
    pub excerpt_chars: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            extract_text: false,
            ignore_patterns: Vec::new(),
            cancel: CancellationToken::new(),
            max_depth: None,
            text_max_bytes: 1024 * 1024,
            excerpt_chars: 16 * 1024,
        }
    }
}

impl BuildOptions {
    /// Options for indexing `location` under `config`.
    #[must_use]
    pub fn for_location(
        config: &Config,
        location: &Location,
        extract_text: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            extract_text: extract_text || location.full_text_index,
            ignore_patterns: location.ignore_patterns.clone(),
            cancel,
            max_depth: None,
            text_max_bytes: config.text_max_bytes,
            excerpt_chars: config.text_excerpt_chars,
        }
    }
}

/// Build statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub directories: u64,
    pub files: u64,
    pub skipped: u64,
    pub errors: u64,
}

/// Result of a build. A cancelled build carries what was found so far.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub entries: Vec<Entry>,
    pub cancelled: bool,
    pub stats: BuildStats,
}

/// Run `fut` unless `cancel` fires first.
async fn or_cancelled<T>(cancel: &CancellationToken, fut: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

/// Build the index of `location` starting at `root`.
///
/// Per-entry failures are logged and skipped. Cancellation is not an error:
/// the partial result comes back with `cancelled` set.
///
/// # Errors
///
/// Returns `LocationError::Unreachable` if the root cannot be listed, or an
/// error for invalid ignore patterns.
pub async fn build_index(
    backend: &dyn Backend,
    location: &Location,
    root: &str,
    options: &BuildOptions,
) -> Result<BuildOutcome> {
    let filter = PathFilter::with_patterns(root, &options.ignore_patterns)?;
    let mut walk = Walk {
        backend,
        location,
        options,
        filter,
        outcome: BuildOutcome::default(),
        dir_positions: HashMap::new(),
    };

    tracing::info!(location = %location.name, root = %root, "Starting index build");

    let result = walk.run(root).await;
    let outcome_label = match &result {
        Ok(()) if walk.outcome.cancelled => "cancelled",
        Ok(()) => "complete",
        Err(_) => "failed",
    };
    INDEX_BUILDS.with_label_values(&[outcome_label]).inc();
    result?;

    let outcome = walk.outcome;
    tracing::info!(
        location = %location.name,
        entries = outcome.entries.len(),
        directories = outcome.stats.directories,
        files = outcome.stats.files,
        skipped = outcome.stats.skipped,
        errors = outcome.stats.errors,
        cancelled = outcome.cancelled,
        "Index build finished"
    );
    Ok(outcome)
}

struct Walk<'a> {
    backend: &'a dyn Backend,
    location: &'a Location,
    options: &'a BuildOptions,
    filter: PathFilter,
    outcome: BuildOutcome,
    /// Position of each directory entry, for folder metadata found later.
    dir_positions: HashMap<String, usize>,
}

impl Walk<'_> {
    async fn run(&mut self, root: &str) -> Result<()> {
        let options = self.options;
        let cancel = &options.cancel;
        let mut stack: Vec<(String, usize)> = vec![(root.to_string(), 0)];

        while let Some((dir, depth)) = stack.pop() {
            if cancel.is_cancelled() {
                self.outcome.cancelled = true;
                return Ok(());
            }

            let listing = match or_cancelled(cancel, self.backend.list_directory(&dir)).await {
                None => {
                    self.outcome.cancelled = true;
                    return Ok(());
                }
                Some(Ok(listing)) => listing,
                Some(Err(e)) if depth == 0 => {
                    tracing::warn!(location = %self.location.name, error = %e, "Cannot list location root");
                    return Err(LocationError::unreachable(&self.location.name, e).into());
                }
                Some(Err(e)) => {
                    tracing::warn!(dir = %dir, error = %e, "Skipping unreadable directory");
                    self.outcome.stats.errors += 1;
                    continue;
                }
            };
            self.outcome.stats.directories += 1;

            let Some(meta) = self.meta_listing(&dir, &listing).await else {
                self.outcome.cancelled = true;
                return Ok(());
            };
            if meta.has_folder_meta() && !self.apply_folder_meta(&dir).await {
                self.outcome.cancelled = true;
                return Ok(());
            }

            let descend = options.max_depth.map_or(true, |max| depth < max);
            let mut subdirs = Vec::new();

            for raw in &listing {
                let name = raw.name();
                if name == META_FOLDER {
                    continue;
                }
                if self.filter.is_ignored(&raw.path, !raw.is_file) {
                    self.outcome.stats.skipped += 1;
                    continue;
                }

                let Some(entry) = self.entry_for(raw, &meta).await else {
                    self.outcome.cancelled = true;
                    return Ok(());
                };

                if raw.is_file {
                    self.outcome.stats.files += 1;
                } else {
                    self.dir_positions
                        .insert(raw.path.clone(), self.outcome.entries.len());
                    if descend {
                        subdirs.push(raw.path.clone());
                    }
                }
                self.outcome.entries.push(entry);
            }

            // Reverse so the first subdirectory is expanded first.
            stack.extend(subdirs.into_iter().rev().map(|sub| (sub, depth + 1)));
        }

        Ok(())
    }

    /// Listing of the metadata folder of `dir`, if it has one.
    ///
    /// `None` means the build was cancelled.
    async fn meta_listing(&self, dir: &str, listing: &[RawEntry]) -> Option<MetaListing> {
        let has_meta = listing
            .iter()
            .any(|r| !r.is_file && r.name() == META_FOLDER);
        if !has_meta {
            return Some(MetaListing::default());
        }

        let meta_dir = metadata::meta_folder_path(dir);
        match or_cancelled(&self.options.cancel, self.backend.list_directory(&meta_dir)).await? {
            Ok(meta) => Some(MetaListing::from_listing(&meta)),
            Err(e) => {
                tracing::debug!(dir = %meta_dir, error = %e, "Cannot list metadata folder");
                Some(MetaListing::default())
            }
        }
    }

    /// Merge `tsm.json` of `dir` into its directory entry.
    ///
    /// Returns `false` if the build was cancelled.
    async fn apply_folder_meta(&mut self, dir: &str) -> bool {
        let Some(&pos) = self.dir_positions.get(dir) else {
            // The root has no entry of its own.
            return true;
        };
        let path = metadata::folder_meta_path(dir);
        let Some(read) = or_cancelled(&self.options.cancel, self.backend.read_text_file(&path)).await
        else {
            return false;
        };
        match read.and_then(|json| metadata::parse_sidecar(&json)) {
            Ok(meta) => metadata::apply_sidecar(&mut self.outcome.entries[pos], meta),
            Err(e) => tracing::debug!(path = %path, error = %e, "Ignoring unreadable folder metadata"),
        }
        true
    }

    /// Entry for one listing row with sidecar, thumbnail and text merged in.
    ///
    /// `None` means the build was cancelled.
    async fn entry_for(&self, raw: &RawEntry, meta: &MetaListing) -> Option<Entry> {
        let cancel = &self.options.cancel;
        let name = raw.name();
        let mut entry = metadata::entry_from_raw(raw, &self.location.uuid);

        if meta.has_sidecar(name) {
            let path = metadata::sidecar_path(&raw.path);
            let read = or_cancelled(cancel, self.backend.read_text_file(&path)).await?;
            match read.and_then(|json| metadata::parse_sidecar(&json)) {
                Ok(sidecar) => metadata::apply_sidecar(&mut entry, sidecar),
                Err(e) => tracing::debug!(path = %path, error = %e, "Ignoring unreadable sidecar"),
            }
        }

        if meta.has_thumbnail(name) {
            entry.thumbnail_path = Some(metadata::thumbnail_path(&raw.path));
        }

        if self.options.extract_text
            && raw.is_file
            && filter::is_text_extractable(&entry.extension, raw.size, self.options.text_max_bytes)
        {
            match or_cancelled(cancel, self.backend.read_text_file(&raw.path)).await? {
                Ok(text) => {
                    entry.text_content = Some(filter::excerpt(text, self.options.excerpt_chars));
                }
                Err(e) => tracing::warn!(path = %raw.path, error = %e, "Text extraction failed"),
            }
        }

        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LocalBackend, MemoryObjectClient, ObjectStoreBackend};
    use crate::model::{LocationType, TagType};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn root_of(tmp: &TempDir) -> String {
        tmp.path().to_string_lossy().into_owned()
    }

    fn names(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_depth_first_order_and_tags() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("a/inner.txt"), "x");
        write(&tmp.path().join("b.txt"), "x");
        write(&tmp.path().join("photo[sunset].jpg"), "x");
        let location = Location::local("Docs", root_of(&tmp));

        let outcome = build_index(
            &LocalBackend::new(),
            &location,
            &location.root_path,
            &BuildOptions::default(),
        )
        .await
        .unwrap();

        assert!(!outcome.cancelled);
        assert_eq!(
            names(&outcome.entries),
            vec!["a", "b.txt", "photo[sunset].jpg", "inner.txt"]
        );
        assert!(outcome.entries[2].has_tag("sunset"));
        assert!(outcome.entries.iter().all(|e| e.location_id == location.uuid));
        assert_eq!(outcome.stats.directories, 2);
        assert_eq!(outcome.stats.files, 3);
    }

    #[tokio::test]
    async fn test_sidecar_thumbnail_and_folder_meta() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("note[plain].txt"), "hello");
        write(
            &tmp.path().join(".ts/note[plain].txt.json"),
            r##"{"tags":[{"title":"work","color":"#f00"}],"description":"todo"}"##,
        );
        write(&tmp.path().join(".ts/note[plain].txt.jpg"), "jpeg");
        write(&tmp.path().join("album/pic.png"), "png");
        write(
            &tmp.path().join("album/.ts/tsm.json"),
            r#"{"tags":[{"title":"holiday"}]}"#,
        );
        write(&tmp.path().join("broken.txt"), "x");
        write(&tmp.path().join(".ts/broken.txt.json"), "{oops");
        let location = Location::local("Docs", root_of(&tmp));

        let outcome = build_index(
            &LocalBackend::new(),
            &location,
            &location.root_path,
            &BuildOptions::default(),
        )
        .await
        .unwrap();

        assert!(!names(&outcome.entries).contains(&".ts"));
        assert!(outcome.entries.iter().all(|e| !metadata::is_meta_path(&e.path)));

        let note = outcome.entries.iter().find(|e| e.name == "note[plain].txt").unwrap();
        assert_eq!(note.tags[0].title, "work");
        assert_eq!(note.tags[0].tag_type, TagType::Sidecar);
        assert!(note.has_tag("plain"));
        assert_eq!(note.description.as_deref(), Some("todo"));
        assert!(note.thumbnail_path.as_deref().unwrap().ends_with("note[plain].txt.jpg"));

        let album = outcome.entries.iter().find(|e| e.name == "album").unwrap();
        assert!(album.has_tag("holiday"));

        let broken = outcome.entries.iter().find(|e| e.name == "broken.txt").unwrap();
        assert!(broken.tags.is_empty());
    }

    #[tokio::test]
    async fn test_ignore_patterns_prune_directories() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("node_modules/pkg/index.js"), "x");
        write(&tmp.path().join("keep.txt"), "x");
        write(&tmp.path().join("drop.tmp"), "x");
        write(&tmp.path().join(".DS_Store"), "x");
        let mut location = Location::local("Docs", root_of(&tmp));
        location.ignore_patterns = vec!["node_modules/".to_string(), "*.tmp".to_string()];

        let options = BuildOptions {
            ignore_patterns: location.ignore_patterns.clone(),
            ..BuildOptions::default()
        };
        let outcome = build_index(&LocalBackend::new(), &location, &location.root_path, &options)
            .await
            .unwrap();

        assert_eq!(names(&outcome.entries), vec!["keep.txt"]);
        assert_eq!(outcome.stats.skipped, 3);
        assert_eq!(outcome.stats.directories, 1);
    }

    #[tokio::test]
    async fn test_text_extraction() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("notes.md"), "alpha beta gamma");
        write(&tmp.path().join("big.txt"), &"x".repeat(64));
        write(&tmp.path().join("image.jpg"), "binary");
        let location = Location::local("Docs", root_of(&tmp));
        let options = BuildOptions {
            extract_text: true,
            text_max_bytes: 32,
            excerpt_chars: 5,
            ..BuildOptions::default()
        };

        let outcome = build_index(&LocalBackend::new(), &location, &location.root_path, &options)
            .await
            .unwrap();

        let text = |name: &str| {
            outcome
                .entries
                .iter()
                .find(|e| e.name == name)
                .unwrap()
                .text_content
                .clone()
        };
        assert_eq!(text("notes.md").as_deref(), Some("alpha"));
        assert_eq!(text("big.txt"), None);
        assert_eq!(text("image.jpg"), None);
    }

    #[tokio::test]
    async fn test_max_depth() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("a/b/deep.txt"), "x");
        let location = Location::local("Docs", root_of(&tmp));
        let options = BuildOptions {
            max_depth: Some(1),
            ..BuildOptions::default()
        };

        let outcome = build_index(&LocalBackend::new(), &location, &location.root_path, &options)
            .await
            .unwrap();
        assert_eq!(names(&outcome.entries), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_unreachable_root_is_location_error() {
        let tmp = TempDir::new().unwrap();
        let location = Location::local("Gone", format!("{}/missing", root_of(&tmp)));

        let err = build_index(
            &LocalBackend::new(),
            &location,
            &location.root_path,
            &BuildOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(err.is_location_level());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_returns_partial() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("a.txt"), "x");
        let location = Location::local("Docs", root_of(&tmp));
        let options = BuildOptions::default();
        options.cancel.cancel();

        let outcome = build_index(&LocalBackend::new(), &location, &location.root_path, &options)
            .await
            .unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.entries.is_empty());
    }

    #[tokio::test]
    async fn test_object_store_walk() {
        let client = MemoryObjectClient::new();
        client.insert("photos/a[sunset].jpg", b"jpeg".to_vec(), 100);
        client.insert("photos/trip/b.jpg", b"jpeg".to_vec(), 300);
        client.insert(
            "photos/.ts/a[sunset].jpg.json",
            br#"{"tags":[{"title":"beach"}]}"#.to_vec(),
            10,
        );
        let backend = ObjectStoreBackend::new(client);
        let location = Location::local("Bucket", "photos").with_type(LocationType::Cloud);

        let outcome = build_index(&backend, &location, "photos", &BuildOptions::default())
            .await
            .unwrap();

        assert_eq!(names(&outcome.entries), vec!["a[sunset].jpg", "trip", "b.jpg"]);
        let photo = &outcome.entries[0];
        assert!(photo.has_tag("beach"));
        assert!(photo.has_tag("sunset"));
        assert_eq!(outcome.entries[2].path, "photos/trip/b.jpg");
    }

    /// Object store whose listing of one directory fails.
    struct BrokenDir {
        inner: ObjectStoreBackend<MemoryObjectClient>,
        broken: &'static str,
    }

    #[async_trait::async_trait]
    impl Backend for BrokenDir {
        fn kind(&self) -> LocationType {
            LocationType::Cloud
        }

        async fn list_directory(&self, path: &str) -> Result<Vec<RawEntry>> {
            if path == self.broken {
                return Err(crate::error::BackendError::protocol("listing refused").into());
            }
            self.inner.list_directory(path).await
        }

        async fn read_text_file(&self, path: &str) -> Result<String> {
            self.inner.read_text_file(path).await
        }

        async fn write_text_file(&self, path: &str, content: &str) -> Result<()> {
            self.inner.write_text_file(path, content).await
        }

        async fn get_properties(&self, path: &str) -> Result<Option<crate::backend::Properties>> {
            self.inner.get_properties(path).await
        }

        async fn rename(&self, from: &str, to: &str) -> Result<()> {
            self.inner.rename(from, to).await
        }

        async fn copy(&self, from: &str, to: &str) -> Result<()> {
            self.inner.copy(from, to).await
        }

        async fn delete(&self, path: &str) -> Result<()> {
            self.inner.delete(path).await
        }

        async fn create_directory(&self, path: &str) -> Result<()> {
            self.inner.create_directory(path).await
        }
    }

    #[tokio::test]
    async fn test_unreadable_subdirectory_is_skipped() {
        let client = MemoryObjectClient::new();
        client.insert("photos/a.jpg", b"jpeg".to_vec(), 1);
        client.insert("photos/locked/secret.jpg", b"jpeg".to_vec(), 1);
        client.insert("photos/open/b.jpg", b"jpeg".to_vec(), 1);
        client.insert("photos/z.jpg", b"jpeg".to_vec(), 1);
        let backend = BrokenDir {
            inner: ObjectStoreBackend::new(client),
            broken: "photos/locked",
        };
        let location = Location::local("Bucket", "photos").with_type(LocationType::Cloud);

        let outcome = build_index(&backend, &location, "photos", &BuildOptions::default())
            .await
            .unwrap();

        assert!(!outcome.cancelled);
        assert_eq!(
            names(&outcome.entries),
            vec!["a.jpg", "locked", "open", "z.jpg", "b.jpg"]
        );
        assert_eq!(outcome.stats.errors, 1);
        assert_eq!(outcome.stats.directories, 2);
    }
}
