//! Pipeline instrumentation hooks
//!
//! The pipeline reports stage timings, cache outcomes and skipped rows to a
//! [`PipelineObserver`]. Every method has a no-op default, so an observer only
//! overrides what it cares about.

use crate::error::RecommendError;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Fingerprint,
    Lookup,
    Decode,
    Extract,
    Store,
    FetchCatalog,
    Normalize,
    Rank,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Fingerprint => "fingerprint",
            Stage::Lookup => "lookup",
            Stage::Decode => "decode",
            Stage::Extract => "extract",
            Stage::Store => "store",
            Stage::FetchCatalog => "fetch_catalog",
            Stage::Normalize => "normalize",
            Stage::Rank => "rank",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives pipeline events; implementations must be cheap and non-blocking
pub trait PipelineObserver: Send + Sync {
    fn stage_completed(&self, _stage: Stage, _elapsed: Duration) {}

    fn cache_lookup(&self, _hit: bool) {}

    fn corrupt_entry_skipped(&self, _error: &RecommendError) {}
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Logs stage timings and cache outcomes through `tracing`
///
/// Skipped entries are not repeated here; the pipeline already warns once per
/// skipped row.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn stage_completed(&self, stage: Stage, elapsed: Duration) {
        debug!(stage = %stage, elapsed_ms = elapsed.as_millis() as u64, "Stage complete");
    }

    fn cache_lookup(&self, hit: bool) {
        debug!(hit, "Fingerprint cache lookup");
    }
}
