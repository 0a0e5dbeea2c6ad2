//! In-memory catalog
//!
//! Append-only vector guarded by a tokio `RwLock`. Besides the [`Catalog`]
//! contract it can hold raw rows that would fail validation and can simulate
//! an unreachable or slow store.

use crate::catalog::Catalog;
use crate::error::{RecommendError, Result};
use crate::fingerprint::Fingerprint;
use crate::types::{CatalogEntry, StoredEntry};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Process-local catalog
#[derive(Default)]
pub struct MemoryCatalog {
    entries: RwLock<Vec<StoredEntry>>,
    unavailable: AtomicBool,
    latency: RwLock<Option<Duration>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stored row without validation, unless its fingerprint exists
    pub async fn insert_raw(&self, entry: StoredEntry) {
        let mut entries = self.entries.write().await;
        if !entries.iter().any(|e| e.fingerprint == entry.fingerprint) {
            entries.push(entry);
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Make every subsequent call fail with `CatalogUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every subsequent call by `latency`
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().await = latency;
    }

    async fn enter(&self) -> Result<()> {
        let latency = *self.latency.read().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RecommendError::CatalogUnavailable(
                "memory catalog marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<StoredEntry>> {
        self.enter().await?;
        let entries = self.entries.read().await;
        Ok(entries.iter().find(|e| &e.fingerprint == fingerprint).cloned())
    }

    async fn insert(&self, entry: &CatalogEntry) -> Result<()> {
        self.enter().await?;
        let mut stored = StoredEntry::from(entry.clone());
        stored.created_at.get_or_insert_with(Utc::now);
        self.insert_raw(stored).await;
        Ok(())
    }

    fn stream_all(&self) -> BoxStream<'_, Result<StoredEntry>> {
        stream::once(async move {
            match self.enter().await {
                Ok(()) => {
                    let snapshot = self.entries.read().await.clone();
                    stream::iter(snapshot.into_iter().map(Ok)).boxed()
                }
                Err(e) => stream::iter(vec![Err(e)]).boxed(),
            }
        })
        .flatten()
        .boxed()
    }
}
