//! On-disk index cache.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::error::{BackendError, IndexError};
use crate::model::{metadata, now_millis, Entry, Location};
use crate::{Error, Result};

/// Loads and stores the persisted index of a location.
///
/// The format is private to each implementation.
#[async_trait]
pub trait IndexPersistence: Send + Sync {
    /// Persisted entries, `None` when nothing was persisted yet.
    async fn load_index(
        &self,
        backend: &dyn Backend,
        location: &Location,
    ) -> Result<Option<Vec<Entry>>>;

    async fn persist_index(
        &self,
        backend: &dyn Backend,
        location: &Location,
        entries: &[Entry],
    ) -> Result<()>;
}

/// Stores the index as JSON in `<root>/.ts/tsi.json` through the backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaFolderIndex;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexFile {
    location_id: String,
    created: i64,
    entries: Vec<Entry>,
}

#[async_trait]
impl IndexPersistence for MetaFolderIndex {
    async fn load_index(
        &self,
        backend: &dyn Backend,
        location: &Location,
    ) -> Result<Option<Vec<Entry>>> {
        let path = metadata::index_file_path(&location.root_path);
        let json = match backend.read_text_file(&path).await {
            Ok(json) => json,
            Err(Error::Backend(BackendError::NotFound(_))) => return Ok(None),
            Err(e) => return Err(e),
        };

        let file: IndexFile = serde_json::from_str(&json).map_err(|e| IndexError::Load {
            location: location.name.clone(),
            reason: e.to_string(),
        })?;

        tracing::debug!(
            location = %location.name,
            entries = file.entries.len(),
            created = file.created,
            "Loaded persisted index"
        );

        // The stored id may predate a uuid change; the location wins.
        let entries = file
            .entries
            .into_iter()
            .map(|entry| entry.with_location(location.uuid.clone()))
            .collect();
        Ok(Some(entries))
    }

    async fn persist_index(
        &self,
        backend: &dyn Backend,
        location: &Location,
        entries: &[Entry],
    ) -> Result<()> {
        let file = IndexFile {
            location_id: location.uuid.clone(),
            created: now_millis(),
            entries: entries.to_vec(),
        };
        let json = serde_json::to_string(&file)?;
        let path = metadata::index_file_path(&location.root_path);

        backend
            .write_text_file(&path, &json)
            .await
            .map_err(|e| IndexError::Persist {
                location: location.name.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(location = %location.name, entries = entries.len(), "Persisted index");
        Ok(())
    }
}
