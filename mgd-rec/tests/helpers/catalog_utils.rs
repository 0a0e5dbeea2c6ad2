//! Catalog fixtures

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use mgd_rec::features::{FeatureVector, FEATURE_DIM};
use mgd_rec::{
    Catalog, CatalogEntry, ContentFingerprinter, Fingerprint, MemoryCatalog, SqliteCatalog,
    StoredEntry, TrackMetadata,
};
use std::time::Duration;
use tempfile::TempDir;

/// Open a SQLite catalog in a fresh temporary directory
///
/// Keep the returned `TempDir` alive for the duration of the test.
pub async fn create_test_catalog() -> (TempDir, SqliteCatalog) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let catalog = SqliteCatalog::open(&dir.path().join("mgd.db"))
        .await
        .expect("Failed to open catalog");
    (dir, catalog)
}

/// Deterministic full-dimension entry named `name`
pub fn synthetic_entry(name: &str, seed: usize) -> CatalogEntry {
    let values: Vec<f64> = (0..FEATURE_DIM)
        .map(|d| ((seed * 31 + d * 7) as f64 * 0.37).sin() * (1.0 + d as f64))
        .collect();
    CatalogEntry::new(
        ContentFingerprinter::fingerprint(name.as_bytes()),
        TrackMetadata::new(name, format!("Artist {}", seed)),
        FeatureVector::from_slice(&values).expect("synthetic vector is valid"),
    )
}

/// Insert `count` synthetic entries named `track-<i>`
pub async fn seed_entries(catalog: &dyn Catalog, count: usize) -> Vec<CatalogEntry> {
    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let entry = synthetic_entry(&format!("track-{}", i), i);
        catalog.insert(&entry).await.expect("Failed to seed catalog");
        entries.push(entry);
    }
    entries
}

/// Memory catalog whose scans deliver every row after `row_delay`
pub struct SlowScanCatalog {
    inner: MemoryCatalog,
    row_delay: Duration,
}

impl SlowScanCatalog {
    pub fn new(inner: MemoryCatalog, row_delay: Duration) -> Self {
        Self { inner, row_delay }
    }

    pub fn inner(&self) -> &MemoryCatalog {
        &self.inner
    }
}

#[async_trait]
impl Catalog for SlowScanCatalog {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> mgd_rec::Result<Option<StoredEntry>> {
        self.inner.find_by_fingerprint(fingerprint).await
    }

    async fn insert(&self, entry: &CatalogEntry) -> mgd_rec::Result<()> {
        self.inner.insert(entry).await
    }

    fn stream_all(&self) -> BoxStream<'_, mgd_rec::Result<StoredEntry>> {
        let delay = self.row_delay;
        self.inner
            .stream_all()
            .then(move |row| async move {
                tokio::time::sleep(delay).await;
                row
            })
            .boxed()
    }
}
