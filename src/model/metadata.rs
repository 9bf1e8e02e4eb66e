//! Metadata extraction from names, directory listings and sidecar files.
//!
//! Every directory may carry a metadata folder (`.ts`) holding:
//! - `<name>.json`: sidecar tags and description of entry `<name>`
//! - `<name>.jpg`: thumbnail of entry `<name>`
//! - `tsm.json`: metadata of the directory itself
//! - `tsi.json`: persisted index (location root only)
//!
//! All functions here are pure.

use std::collections::HashSet;

use serde::Deserialize;

use super::entry::{Entry, Tag, TagType};
use super::paths;
use crate::Result;

/// Name of the per-directory metadata folder.
pub const META_FOLDER: &str = ".ts";

/// Directory metadata file inside the metadata folder.
pub const FOLDER_META_FILE: &str = "tsm.json";

/// Persisted location index inside the root metadata folder.
pub const INDEX_FILE: &str = "tsi.json";

const SIDECAR_EXT: &str = ".json";
const THUMBNAIL_EXT: &str = ".jpg";

/// Properties reported by a backend for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Properties {
    pub is_file: bool,
    pub size: u64,
    /// Epoch milliseconds.
    pub last_modified: i64,
}

/// One row of a raw backend directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub path: String,
    pub is_file: bool,
    pub size: u64,
    pub last_modified: i64,
}

impl RawEntry {
    /// Build a listing row from a path and its properties.
    #[must_use]
    pub fn from_properties(path: impl Into<String>, props: Properties) -> Self {
        Self {
            path: path.into(),
            is_file: props.is_file,
            size: props.size,
            last_modified: props.last_modified,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        paths::file_name(&self.path)
    }

    #[must_use]
    pub const fn properties(&self) -> Properties {
        Properties {
            is_file: self.is_file,
            size: self.size,
            last_modified: self.last_modified,
        }
    }
}

/// Lowercase extension of a file name, empty when there is none.
#[must_use]
pub fn extract_extension(name: &str) -> String {
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => name[pos + 1..].to_lowercase(),
        _ => String::new(),
    }
}

/// Tags encoded in the last `[...]` group of a name.
///
/// `photo[sunset beach].jpg` yields `sunset` and `beach`.
#[must_use]
pub fn extract_tags_from_name(name: &str, is_file: bool) -> Vec<Tag> {
    let stem = if is_file && !extract_extension(name).is_empty() {
        name.rfind('.').map_or(name, |pos| &name[..pos])
    } else {
        name
    };

    let Some(start) = stem.rfind('[') else {
        return Vec::new();
    };
    let Some(len) = stem[start..].find(']') else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    stem[start + 1..start + len]
        .split_whitespace()
        .filter(|title| seen.insert(*title))
        .map(Tag::plain)
        .collect()
}

/// Merge sidecar tags with filename tags.
///
/// Sidecar tags come first; a filename tag with a title already present is
/// dropped.
#[must_use]
pub fn merge_tags(sidecar: Vec<Tag>, name_tags: Vec<Tag>) -> Vec<Tag> {
    let mut merged = Vec::with_capacity(sidecar.len() + name_tags.len());
    for tag in sidecar.into_iter().chain(name_tags) {
        if !merged.iter().any(|t: &Tag| t.title == tag.title) {
            merged.push(tag);
        }
    }
    merged
}

/// Metadata folder of a directory.
#[must_use]
pub fn meta_folder_path(dir: &str) -> String {
    paths::join(dir, META_FOLDER)
}

/// Sidecar file of an entry.
#[must_use]
pub fn sidecar_path(entry_path: &str) -> String {
    companion_path(entry_path, SIDECAR_EXT)
}

/// Thumbnail file of an entry.
#[must_use]
pub fn thumbnail_path(entry_path: &str) -> String {
    companion_path(entry_path, THUMBNAIL_EXT)
}

/// Metadata file of a directory.
#[must_use]
pub fn folder_meta_path(dir: &str) -> String {
    paths::join(&meta_folder_path(dir), FOLDER_META_FILE)
}

/// Persisted index file of a location root.
#[must_use]
pub fn index_file_path(root: &str) -> String {
    paths::join(&meta_folder_path(root), INDEX_FILE)
}

fn companion_path(entry_path: &str, ext: &str) -> String {
    let name = paths::file_name(entry_path);
    let dir = paths::parent(entry_path).unwrap_or("");
    paths::join(&meta_folder_path(dir), &format!("{name}{ext}"))
}

/// Whether any segment of `path` is a metadata folder.
#[must_use]
pub fn is_meta_path(path: &str) -> bool {
    paths::segments(path).any(|s| s == META_FOLDER)
}

/// What a path inside a metadata folder refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaFile {
    /// The metadata folder itself.
    Folder { owner_dir: String },
    /// Sidecar of entry `entry_name` in `owner_dir`.
    EntrySidecar { owner_dir: String, entry_name: String },
    /// Metadata of `owner_dir` itself.
    FolderMeta { owner_dir: String },
    Thumbnail { owner_dir: String },
    LocationIndex { owner_dir: String },
    Other,
}

impl MetaFile {
    /// Whether a change to this file alters effective tags or descriptions.
    #[must_use]
    pub const fn affects_entries(&self) -> bool {
        matches!(self, Self::EntrySidecar { .. } | Self::FolderMeta { .. })
    }

    /// Directory whose listing owns this metadata.
    #[must_use]
    pub fn owner_dir(&self) -> Option<&str> {
        match self {
            Self::Folder { owner_dir }
            | Self::EntrySidecar { owner_dir, .. }
            | Self::FolderMeta { owner_dir }
            | Self::Thumbnail { owner_dir }
            | Self::LocationIndex { owner_dir } => Some(owner_dir),
            Self::Other => None,
        }
    }
}

/// Classify a path lying inside a metadata folder.
///
/// Returns `None` for ordinary paths.
#[must_use]
pub fn classify_meta_path(path: &str) -> Option<MetaFile> {
    if !is_meta_path(path) {
        return None;
    }

    let name = paths::file_name(path);
    let parent = paths::parent(path).unwrap_or("");

    if name == META_FOLDER {
        return Some(MetaFile::Folder {
            owner_dir: parent.to_string(),
        });
    }

    if paths::file_name(parent) != META_FOLDER {
        return Some(MetaFile::Other);
    }

    let owner_dir = paths::parent(parent).unwrap_or("").to_string();
    let kind = if name == FOLDER_META_FILE {
        MetaFile::FolderMeta { owner_dir }
    } else if name == INDEX_FILE {
        MetaFile::LocationIndex { owner_dir }
    } else if let Some(entry_name) = name.strip_suffix(SIDECAR_EXT) {
        MetaFile::EntrySidecar {
            owner_dir,
            entry_name: entry_name.to_string(),
        }
    } else if name.ends_with(THUMBNAIL_EXT) {
        MetaFile::Thumbnail { owner_dir }
    } else {
        MetaFile::Other
    };
    Some(kind)
}

/// Contents of a sidecar or folder metadata file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SidecarMeta {
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Parse sidecar JSON; every tag is marked as a sidecar tag.
///
/// # Errors
///
/// Returns an error if the JSON is malformed.
pub fn parse_sidecar(json: &str) -> Result<SidecarMeta> {
    // Editors write a BOM now and then.
    let mut meta: SidecarMeta = serde_json::from_str(json.trim_start_matches('\u{feff}'))?;
    for tag in &mut meta.tags {
        tag.tag_type = TagType::Sidecar;
    }
    meta.tags.retain(|t| !t.title.is_empty());
    Ok(meta)
}

/// Sidecars and thumbnails present in one metadata folder.
#[derive(Debug, Clone, Default)]
pub struct MetaListing {
    sidecars: HashSet<String>,
    thumbnails: HashSet<String>,
    has_folder_meta: bool,
}

impl MetaListing {
    /// Index the listing of a metadata folder.
    #[must_use]
    pub fn from_listing(listing: &[RawEntry]) -> Self {
        let mut meta = Self::default();
        for raw in listing.iter().filter(|r| r.is_file) {
            let name = raw.name();
            if name == FOLDER_META_FILE {
                meta.has_folder_meta = true;
            } else if name == INDEX_FILE {
                continue;
            } else if let Some(owner) = name.strip_suffix(SIDECAR_EXT) {
                meta.sidecars.insert(owner.to_string());
            } else if let Some(owner) = name.strip_suffix(THUMBNAIL_EXT) {
                meta.thumbnails.insert(owner.to_string());
            }
        }
        meta
    }

    #[must_use]
    pub fn has_sidecar(&self, entry_name: &str) -> bool {
        self.sidecars.contains(entry_name)
    }

    #[must_use]
    pub fn has_thumbnail(&self, entry_name: &str) -> bool {
        self.thumbnails.contains(entry_name)
    }

    #[must_use]
    pub const fn has_folder_meta(&self) -> bool {
        self.has_folder_meta
    }
}

/// Turn a listing row into an entry of `location_id`.
#[must_use]
pub fn entry_from_raw(raw: &RawEntry, location_id: &str) -> Entry {
    Entry::new(raw.path.clone(), raw.is_file)
        .with_size(raw.size)
        .with_last_modified(raw.last_modified)
        .with_location(location_id)
}

/// Merge sidecar metadata into an entry.
pub fn apply_sidecar(entry: &mut Entry, meta: SidecarMeta) {
    let name_tags: Vec<Tag> = entry
        .tags
        .drain(..)
        .filter(|t| t.tag_type == TagType::Plain)
        .collect();
    entry.tags = merge_tags(meta.tags, name_tags);
    if meta.description.as_deref().is_some_and(|d| !d.is_empty()) {
        entry.description = meta.description;
    }
}
