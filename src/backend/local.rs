//! Local filesystem backend.

use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::Path;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;

use super::{Backend, Properties, RawEntry};
use crate::error::BackendError;
use crate::model::LocationType;
use crate::Result;

/// Backend over the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

impl LocalBackend {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn modified_millis(meta: &Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

fn properties(meta: &Metadata) -> Properties {
    Properties {
        is_file: meta.is_file(),
        size: if meta.is_file() { meta.len() } else { 0 },
        last_modified: modified_millis(meta),
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn kind(&self) -> LocationType {
        LocationType::Local
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<RawEntry>> {
        let mut dir = tokio::fs::read_dir(path)
            .await
            .map_err(|e| BackendError::io(path, e))?;

        let mut listing = Vec::new();
        while let Some(child) = dir
            .next_entry()
            .await
            .map_err(|e| BackendError::io(path, e))?
        {
            let child_path = child.path();
            // Follows symlinks; dangling links are skipped.
            match tokio::fs::metadata(&child_path).await {
                Ok(meta) => listing.push(RawEntry::from_properties(
                    child_path.to_string_lossy().into_owned(),
                    properties(&meta),
                )),
                Err(e) => {
                    tracing::debug!(path = %child_path.display(), error = %e, "Skipping unreadable entry");
                }
            }
        }

        listing.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(listing)
    }

    async fn read_text_file(&self, path: &str) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BackendError::io(path, e).into())
    }

    async fn write_text_file(&self, path: &str, content: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackendError::io(parent.to_string_lossy(), e))?;
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| BackendError::io(path, e).into())
    }

    async fn get_properties(&self, path: &str) -> Result<Option<Properties>> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(Some(properties(&meta))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BackendError::io(path, e).into()),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        tokio::fs::rename(from, to)
            .await
            .map_err(|e| BackendError::io(from, e).into())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let meta = tokio::fs::metadata(from)
            .await
            .map_err(|e| BackendError::io(from, e))?;
        if meta.is_dir() {
            return Err(BackendError::Unsupported("copy directory").into());
        }
        tokio::fs::copy(from, to)
            .await
            .map(|_| ())
            .map_err(|e| BackendError::io(from, e).into())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| BackendError::io(path, e))?;
        let result = if meta.is_dir() {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        };
        result.map_err(|e| BackendError::io(path, e).into())
    }

    async fn create_directory(&self, path: &str) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| BackendError::io(path, e).into())
    }
}
