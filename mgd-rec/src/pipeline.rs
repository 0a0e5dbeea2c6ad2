//! Recommendation pipeline
//!
//! **Purpose:** Turn uploaded audio bytes into a ranked list of similar
//! catalog tracks, cataloguing the upload along the way.
//!
//! **Algorithm:**
//! 1. Fingerprint the raw bytes (SHA-256)
//! 2. Look the fingerprint up in the catalog
//!    - hit: reuse the stored vector
//!    - miss: decode, extract, then insert the new entry
//! 3. Fetch the catalog, skipping corrupt rows and the query's own entry
//! 4. Fit a [`Scaler`] on the remaining entries
//! 5. Rank them against the query and return the top K
//!
//! Decoding, extraction and hashing run on tokio's blocking pool. Every
//! catalog call, and every row of a catalog scan, is bounded by
//! `catalog_timeout`; elapsing it is a transient `CatalogUnavailable` error.
//! The catalog insert runs in its own task: once started it completes even if
//! the caller drops the `recommend` future.

use crate::audio::{AudioDecoder, ContainerFormat, RawAudio};
use crate::catalog::Catalog;
use crate::error::{RecommendError, Result};
use crate::features::{FeatureExtractor, FeatureVector};
use crate::fingerprint::{ContentFingerprinter, Fingerprint};
use crate::instrumentation::{PipelineObserver, Stage, TracingObserver};
use crate::normalize::Scaler;
use crate::ranking::{SimilarityRanker, DEFAULT_CHUNK_SIZE};
use crate::types::{CatalogEntry, Recommendation, TrackMetadata};
use futures::StreamExt;
use mgd_common::config::RecommendSettings;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Number of results when a request does not specify K
pub const DEFAULT_K: usize = 10;

/// Default bound on each catalog call
pub const DEFAULT_CATALOG_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Configuration and request types
// ============================================================================

/// Pipeline tunables
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub default_k: usize,
    pub chunk_size: usize,
    pub catalog_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_k: DEFAULT_K,
            chunk_size: DEFAULT_CHUNK_SIZE,
            catalog_timeout: DEFAULT_CATALOG_TIMEOUT,
        }
    }
}

impl From<&RecommendSettings> for PipelineConfig {
    fn from(settings: &RecommendSettings) -> Self {
        Self {
            default_k: settings.default_k,
            chunk_size: settings.chunk_size,
            catalog_timeout: Duration::from_millis(settings.catalog_timeout_ms),
        }
    }
}

/// One `recommend` call's input
#[derive(Debug, Clone)]
pub struct RecommendRequest {
    /// Raw uploaded bytes; consumed by the call
    pub audio: Vec<u8>,
    /// Display metadata stored with a new entry ("Unknown" when absent)
    pub metadata: Option<TrackMetadata>,
    /// Number of results (pipeline default when absent)
    pub k: Option<usize>,
    /// Container hint used only when sniffing fails
    pub declared_format: Option<ContainerFormat>,
}

impl RecommendRequest {
    pub fn new(audio: Vec<u8>) -> Self {
        Self {
            audio,
            metadata: None,
            k: None,
            declared_format: None,
        }
    }

    pub fn with_metadata(mut self, metadata: TrackMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn with_declared_format(mut self, format: ContainerFormat) -> Self {
        self.declared_format = Some(format);
        self
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Content-based recommendation pipeline
///
/// Holds no per-request mutable state; one instance may serve concurrent
/// calls. The catalog is the only shared resource.
pub struct RecommendationPipeline {
    catalog: Arc<dyn Catalog>,
    decoder: AudioDecoder,
    extractor: Arc<FeatureExtractor>,
    ranker: SimilarityRanker,
    config: PipelineConfig,
    observer: Arc<dyn PipelineObserver>,
}

impl RecommendationPipeline {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        let config = PipelineConfig::default();
        Self {
            catalog,
            decoder: AudioDecoder::default(),
            extractor: Arc::new(FeatureExtractor::new()),
            ranker: SimilarityRanker::new(config.chunk_size),
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.ranker = SimilarityRanker::new(config.chunk_size);
        self.config = config;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_decoder(mut self, decoder: AudioDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    /// Recommend catalog tracks similar to the uploaded audio
    ///
    /// Returns at most K results, best first. An empty list means no other
    /// track is catalogued; every failure is an error, never an empty list.
    ///
    /// # Errors
    /// * `UnsupportedFormat`, `Decode`, `FeatureExtraction` - the upload cannot be analysed
    /// * `CatalogUnavailable` - catalog call failed or timed out; safe to retry
    /// * `Internal` - a worker task panicked
    pub async fn recommend(&self, request: RecommendRequest) -> Result<Vec<Recommendation>> {
        let RecommendRequest {
            audio,
            metadata,
            k,
            declared_format,
        } = request;
        let k = k.unwrap_or(self.config.default_k);
        let metadata = metadata.unwrap_or_default();

        let (fingerprint, audio) = self.fingerprint(audio).await?;
        info!(fingerprint = %fingerprint, bytes = audio.len(), k, "Recommendation requested");

        let mut raw = RawAudio::new(audio);
        if let Some(format) = declared_format {
            raw = raw.with_declared_format(format);
        }

        let query = self.resolve_features(&fingerprint, raw, metadata).await?;
        let entries = self.fetch_catalog(&fingerprint).await?;

        if entries.is_empty() {
            info!(fingerprint = %fingerprint, "No other catalog entries to rank against");
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let scaler = Scaler::fit(entries.iter().map(|e| &*e.features))?;
        self.observer.stage_completed(Stage::Normalize, started.elapsed());

        let started = Instant::now();
        let ranked = self
            .ranker
            .rank_scaled(&scaler, &query, &entries, Some(&fingerprint), k)?;
        self.observer.stage_completed(Stage::Rank, started.elapsed());

        info!(
            fingerprint = %fingerprint,
            candidates = entries.len(),
            returned = ranked.len(),
            "Recommendation complete"
        );

        Ok(ranked.iter().map(|r| r.to_recommendation()).collect())
    }

    /// Hash on the blocking pool, handing the bytes back
    async fn fingerprint(&self, audio: Vec<u8>) -> Result<(Fingerprint, Vec<u8>)> {
        let started = Instant::now();
        let result = tokio::task::spawn_blocking(move || {
            let fingerprint = ContentFingerprinter::fingerprint(&audio);
            (fingerprint, audio)
        })
        .await
        .map_err(|e| RecommendError::Internal(format!("Fingerprint task failed: {}", e)))?;
        self.observer.stage_completed(Stage::Fingerprint, started.elapsed());
        Ok(result)
    }

    /// Stored vector on a cache hit, freshly extracted (and stored) on a miss
    async fn resolve_features(
        &self,
        fingerprint: &Fingerprint,
        raw: RawAudio,
        metadata: TrackMetadata,
    ) -> Result<FeatureVector> {
        let started = Instant::now();
        let stored = self
            .bounded("lookup", self.catalog.find_by_fingerprint(fingerprint))
            .await?;
        self.observer.stage_completed(Stage::Lookup, started.elapsed());
        self.observer.cache_lookup(stored.is_some());

        let Some(stored) = stored else {
            debug!(fingerprint = %fingerprint, "Cache miss");
            let features = self.analyze(raw).await?;
            self.store(CatalogEntry::new(fingerprint.clone(), metadata, features))
                .await?;
            return Ok(features);
        };

        match stored.into_entry() {
            Ok(entry) => {
                debug!(fingerprint = %fingerprint, "Cache hit, reusing stored features");
                Ok(entry.features)
            }
            Err(e) => {
                // Entries are append-only: re-extract for this call, never overwrite
                warn!("Stored features unusable, re-extracting: {}", e);
                self.observer.corrupt_entry_skipped(&e);
                self.analyze(raw).await
            }
        }
    }

    /// Decode and extract on the blocking pool
    async fn analyze(&self, raw: RawAudio) -> Result<FeatureVector> {
        let decoder = self.decoder.clone();
        let extractor = Arc::clone(&self.extractor);
        let observer = Arc::clone(&self.observer);

        tokio::task::spawn_blocking(move || -> Result<FeatureVector> {
            let started = Instant::now();
            let signal = decoder.decode(raw)?;
            observer.stage_completed(Stage::Decode, started.elapsed());

            let started = Instant::now();
            let features = extractor.extract(&signal)?;
            observer.stage_completed(Stage::Extract, started.elapsed());

            Ok(features)
        })
        .await
        .map_err(|e| RecommendError::Internal(format!("Analysis task failed: {}", e)))?
    }

    /// Insert in a detached task so caller cancellation cannot interrupt it
    async fn store(&self, entry: CatalogEntry) -> Result<()> {
        let started = Instant::now();
        let catalog = Arc::clone(&self.catalog);
        let fingerprint = entry.fingerprint.clone();
        let handle = tokio::spawn(async move { catalog.insert(&entry).await });

        self.bounded("insert", async {
            handle
                .await
                .map_err(|e| RecommendError::Internal(format!("Catalog insert task failed: {}", e)))?
        })
        .await?;

        self.observer.stage_completed(Stage::Store, started.elapsed());
        info!(fingerprint = %fingerprint, "Catalogued new track");
        Ok(())
    }

    /// Valid catalog entries other than `exclude`, in insertion order
    ///
    /// The timeout bounds the wait for each row, not the whole scan: a large
    /// catalog that keeps delivering rows is never cut off.
    async fn fetch_catalog(&self, exclude: &Fingerprint) -> Result<Vec<CatalogEntry>> {
        let started = Instant::now();
        let mut stream = self.catalog.stream_all();
        let mut entries = Vec::new();

        while let Some(row) = self.bounded("scan", async { Ok(stream.next().await) }).await? {
            let entry = match row {
                Ok(stored) if &stored.fingerprint == exclude => continue,
                Ok(stored) => stored.into_entry(),
                Err(e) => Err(e),
            };

            match entry {
                Ok(entry) => entries.push(entry),
                Err(e @ RecommendError::CorruptCatalogEntry { .. }) => {
                    warn!("Skipping corrupt catalog entry: {}", e);
                    self.observer.corrupt_entry_skipped(&e);
                }
                Err(e) => return Err(e),
            }
        }

        self.observer.stage_completed(Stage::FetchCatalog, started.elapsed());
        debug!(entries = entries.len(), "Catalog fetched");
        Ok(entries)
    }

    /// Apply the catalog timeout to one catalog operation
    async fn bounded<T, F>(&self, operation: &str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.catalog_timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(RecommendError::CatalogUnavailable(format!(
                "catalog {} timed out after {} ms",
                operation,
                self.config.catalog_timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_settings() {
        let settings = RecommendSettings {
            default_k: 3,
            chunk_size: 7,
            catalog_timeout_ms: 250,
        };
        let config = PipelineConfig::from(&settings);
        assert_eq!(config.default_k, 3);
        assert_eq!(config.chunk_size, 7);
        assert_eq!(config.catalog_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_request_builder() {
        let request = RecommendRequest::new(vec![1, 2, 3])
            .with_k(4)
            .with_metadata(TrackMetadata::new("Song", "Band"))
            .with_declared_format(ContainerFormat::Flac);
        assert_eq!(request.k, Some(4));
        assert_eq!(request.metadata.unwrap().artist, "Band");
        assert_eq!(request.declared_format, Some(ContainerFormat::Flac));
    }
}
