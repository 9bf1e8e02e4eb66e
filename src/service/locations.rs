//! Configured locations.

use std::path::Path;

use parking_lot::RwLock;
use serde::Deserialize;

use crate::error::LocationError;
use crate::model::Location;
use crate::{Error, Result};

/// Source of the configured locations and the active one.
pub trait LocationRegistry: Send + Sync {
    fn locations(&self) -> Vec<Location>;

    /// The location the user is browsing, if any.
    fn current(&self) -> Option<Location>;

    /// Look up a location by uuid, then by name.
    fn find(&self, key: &str) -> Option<Location> {
        let locations = self.locations();
        locations
            .iter()
            .find(|l| l.uuid == key)
            .or_else(|| locations.iter().find(|l| l.name == key))
            .cloned()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LocationsFile {
    List(Vec<Location>),
    WithCurrent {
        locations: Vec<Location>,
        #[serde(default)]
        current: Option<String>,
    },
}

/// Fixed set of locations with a switchable current one.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    locations: Vec<Location>,
    current: RwLock<Option<String>>,
}

impl StaticRegistry {
    #[must_use]
    pub fn new(locations: Vec<Location>) -> Self {
        Self {
            locations,
            current: RwLock::new(None),
        }
    }

    /// Parse a JSON list of locations, or an object with `locations` and an
    /// optional `current` uuid.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or an unknown current location.
    pub fn from_json(json: &str) -> Result<Self> {
        let (locations, current) = match serde_json::from_str(json)? {
            LocationsFile::List(locations) => (locations, None),
            LocationsFile::WithCurrent { locations, current } => (locations, current),
        };
        let registry = Self::new(locations);
        if let Some(current) = current {
            registry.set_current(&current)?;
        }
        Ok(registry)
    }

    /// Load the locations file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read locations file {}: {e}", path.display()))
        })?;
        let registry = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), locations = registry.locations.len(), "Loaded locations");
        Ok(registry)
    }

    /// Make the location with uuid or name `key` the current one.
    ///
    /// # Errors
    ///
    /// Returns `LocationError::NotFound` for an unknown key.
    pub fn set_current(&self, key: &str) -> Result<Location> {
        let location = self
            .find(key)
            .ok_or_else(|| LocationError::NotFound(key.to_string()))?;
        *self.current.write() = Some(location.uuid.clone());
        Ok(location)
    }

    /// Leave the current location.
    pub fn clear_current(&self) {
        *self.current.write() = None;
    }
}

impl LocationRegistry for StaticRegistry {
    fn locations(&self) -> Vec<Location> {
        self.locations.clone()
    }

    fn current(&self) -> Option<Location> {
        let current = self.current.read();
        let uuid = current.as_deref()?;
        self.locations.iter().find(|l| l.uuid == uuid).cloned()
    }
}
