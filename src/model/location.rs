//! Configured storage roots.

use serde::{Deserialize, Serialize};

/// Storage backend family of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    #[default]
    Local,
    /// S3-compatible object store.
    Cloud,
    Webdav,
}

impl LocationType {
    /// Whether the backend family can report filesystem changes.
    #[must_use]
    pub const fn supports_watching(self) -> bool {
        matches!(self, Self::Local)
    }
}

/// A configured storage root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default = "new_uuid")]
    pub uuid: String,

    pub name: String,

    #[serde(rename = "type", default)]
    pub location_type: LocationType,

    /// Root directory, bucket prefix or WebDAV collection.
    #[serde(alias = "path")]
    pub root_path: String,

    #[serde(default)]
    pub disable_indexing: bool,

    #[serde(default)]
    pub full_text_index: bool,

    /// Maximum index age in milliseconds before a rebuild.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_index_age: Option<u64>,

    /// Gitignore-style exclusions applied while indexing.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    #[serde(default = "default_true")]
    pub watch_for_changes: bool,
}

fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

const fn default_true() -> bool {
    true
}

impl Location {
    /// Create a local location with a fresh uuid.
    #[must_use]
    pub fn local(name: impl Into<String>, root_path: impl Into<String>) -> Self {
        Self {
            uuid: new_uuid(),
            name: name.into(),
            location_type: LocationType::Local,
            root_path: root_path.into(),
            disable_indexing: false,
            full_text_index: false,
            max_index_age: None,
            ignore_patterns: Vec::new(),
            watch_for_changes: true,
        }
    }

    /// Same location on another backend family.
    #[must_use]
    pub const fn with_type(mut self, location_type: LocationType) -> Self {
        self.location_type = location_type;
        self
    }

    #[must_use]
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }

    #[must_use]
    pub const fn is_cloud(&self) -> bool {
        matches!(self.location_type, LocationType::Cloud)
    }

    /// Whether the reconciler should watch this location when it is active.
    #[must_use]
    pub const fn should_watch(&self) -> bool {
        self.location_type.supports_watching() && !self.disable_indexing && self.watch_for_changes
    }
}
