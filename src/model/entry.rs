//! Entry and tag records.

use serde::{Deserialize, Serialize};

use super::{metadata, paths};

/// Where a tag comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    /// Parsed from the file name.
    #[default]
    Plain,
    /// Stored in the sidecar metadata file.
    Sidecar,
}

/// A tag attached to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Tag title, matched by exact equality.
    pub title: String,

    #[serde(rename = "type", default)]
    pub tag_type: TagType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "textcolor")]
    pub text_color: Option<String>,
}

impl Tag {
    /// Create a filename tag.
    #[must_use]
    pub fn plain(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            tag_type: TagType::Plain,
            color: None,
            text_color: None,
        }
    }

    /// Create a sidecar tag.
    #[must_use]
    pub fn sidecar(title: impl Into<String>) -> Self {
        Self {
            tag_type: TagType::Sidecar,
            ..Self::plain(title)
        }
    }

    /// Set display colors.
    #[must_use]
    pub fn with_colors(mut self, color: impl Into<String>, text_color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self.text_color = Some(text_color.into());
        self
    }
}

/// One file or directory in a location index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Unique identifier within the owning location.
    pub path: String,

    pub name: String,

    /// Lowercase extension, empty for directories.
    #[serde(default)]
    pub extension: String,

    pub is_file: bool,

    /// Sidecar tags first, then filename tags.
    #[serde(default)]
    pub tags: Vec<Tag>,

    #[serde(default)]
    pub size: u64,

    /// Epoch milliseconds.
    #[serde(default)]
    pub last_modified: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Owning location uuid.
    #[serde(default)]
    pub location_id: String,

    /// Extracted text excerpt for full-text search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,

    /// Browsable URL for entries on remote backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Entry {
    /// Create an entry from its path, deriving name, extension and
    /// filename tags.
    #[must_use]
    pub fn new(path: impl Into<String>, is_file: bool) -> Self {
        let path = path.into();
        let name = paths::file_name(&path).to_string();
        let extension = if is_file {
            metadata::extract_extension(&name)
        } else {
            String::new()
        };
        let tags = metadata::extract_tags_from_name(&name, is_file);

        Self {
            path,
            name,
            extension,
            is_file,
            tags,
            size: 0,
            last_modified: 0,
            thumbnail_path: None,
            description: None,
            location_id: String::new(),
            text_content: None,
            url: None,
        }
    }

    #[must_use]
    pub const fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub const fn with_last_modified(mut self, millis: i64) -> Self {
        self.last_modified = millis;
        self
    }

    #[must_use]
    pub fn with_location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = location_id.into();
        self
    }

    /// Whether the entry carries a tag with exactly this title.
    #[must_use]
    pub fn has_tag(&self, title: &str) -> bool {
        self.tags.iter().any(|t| t.title == title)
    }

    /// Directory containing this entry.
    #[must_use]
    pub fn parent_directory(&self) -> Option<&str> {
        paths::parent(&self.path)
    }

    /// Move the entry to `new_path`.
    ///
    /// Name, extension and filename tags follow the new name; sidecar tags
    /// and other metadata stay.
    pub fn retarget(&mut self, new_path: String) {
        let renamed = Self::new(new_path, self.is_file);
        let sidecar: Vec<Tag> = self
            .tags
            .drain(..)
            .filter(|t| t.tag_type == TagType::Sidecar)
            .collect();
        self.tags = metadata::merge_tags(sidecar, renamed.tags);
        self.path = renamed.path;
        self.name = renamed.name;
        self.extension = renamed.extension;
    }
}
