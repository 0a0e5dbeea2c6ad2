//! Observer that counts pipeline events

use mgd_rec::instrumentation::{PipelineObserver, Stage};
use mgd_rec::RecommendError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct CountingObserver {
    pub extractions: AtomicUsize,
    pub stores: AtomicUsize,
    pub cache_hits: AtomicUsize,
    pub cache_misses: AtomicUsize,
    pub corrupt_skipped: AtomicUsize,
}

impl CountingObserver {
    pub fn extractions(&self) -> usize {
        self.extractions.load(Ordering::SeqCst)
    }

    pub fn stores(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::SeqCst)
    }

    pub fn cache_misses(&self) -> usize {
        self.cache_misses.load(Ordering::SeqCst)
    }

    pub fn corrupt_skipped(&self) -> usize {
        self.corrupt_skipped.load(Ordering::SeqCst)
    }
}

impl PipelineObserver for CountingObserver {
    fn stage_completed(&self, stage: Stage, _elapsed: Duration) {
        match stage {
            Stage::Extract => {
                self.extractions.fetch_add(1, Ordering::SeqCst);
            }
            Stage::Store => {
                self.stores.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }

    fn cache_lookup(&self, hit: bool) {
        let counter = if hit { &self.cache_hits } else { &self.cache_misses };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn corrupt_entry_skipped(&self, _error: &RecommendError) {
        self.corrupt_skipped.fetch_add(1, Ordering::SeqCst);
    }
}
