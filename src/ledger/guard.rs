//! Backend wrapper that keeps our own mutations out of the watcher.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::IgnoreLedger;
use crate::backend::{Backend, Properties, RawEntry};
use crate::model::LocationType;
use crate::Result;

/// Backend whose mutations are registered with an `IgnoreLedger`.
///
/// Each mutating call ignores the touched paths before the I/O and
/// deignores them afterwards, whether the call succeeded or not.
#[derive(Clone)]
pub struct GuardedBackend {
    inner: Arc<dyn Backend>,
    ledger: IgnoreLedger,
}

impl GuardedBackend {
    #[must_use]
    pub fn new(inner: Arc<dyn Backend>, ledger: IgnoreLedger) -> Self {
        Self { inner, ledger }
    }

    #[must_use]
    pub const fn ledger(&self) -> &IgnoreLedger {
        &self.ledger
    }

    async fn guarded<T, F>(&self, touched: &[&str], op: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        self.ledger.ignore(touched.iter().copied());
        let result = op.await;
        self.ledger.deignore(touched.iter().copied());
        result
    }
}

#[async_trait]
impl Backend for GuardedBackend {
    fn kind(&self) -> LocationType {
        self.inner.kind()
    }

    fn supports_watching(&self) -> bool {
        self.inner.supports_watching()
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<RawEntry>> {
        self.inner.list_directory(path).await
    }

    async fn read_text_file(&self, path: &str) -> Result<String> {
        self.inner.read_text_file(path).await
    }

    async fn write_text_file(&self, path: &str, content: &str) -> Result<()> {
        self.guarded(&[path], self.inner.write_text_file(path, content))
            .await
    }

    async fn get_properties(&self, path: &str) -> Result<Option<Properties>> {
        self.inner.get_properties(path).await
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.guarded(&[from, to], self.inner.rename(from, to)).await
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        self.guarded(&[to], self.inner.copy(from, to)).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.guarded(&[path], self.inner.delete(path)).await
    }

    async fn create_directory(&self, path: &str) -> Result<()> {
        self.guarded(&[path], self.inner.create_directory(path))
            .await
    }

    fn browsable_url(&self, path: &str) -> Option<String> {
        self.inner.browsable_url(path)
    }
}
