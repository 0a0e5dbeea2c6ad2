//! Bounded-memory similarity ranking
//!
//! Cosine similarity between a query and every catalog entry, accumulated into
//! one global top-K.
//!
//! **Algorithm:**
//! 1. Pull entries from the catalog iterator into a chunk of at most `chunk_size`
//! 2. Normalise the chunk's vectors and score each against the query
//! 3. Offer every score to a global min-heap of size K
//! 4. Drain the heap best-first
//!
//! Scores are computed per entry and only the heap outlives a chunk, so the
//! result is identical for any chunk size. Equal scores keep catalog order.

use crate::error::{RecommendError, Result};
use crate::fingerprint::Fingerprint;
use crate::normalize::Scaler;
use crate::types::{CatalogEntry, Recommendation};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use tracing::debug;

/// Default number of entries normalised and scored together
pub const DEFAULT_CHUNK_SIZE: usize = 256;

/// Anything that can be ranked: an identity plus a vector
pub trait Rankable {
    fn fingerprint(&self) -> &Fingerprint;
    fn vector(&self) -> &[f64];
}

impl Rankable for CatalogEntry {
    fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    fn vector(&self) -> &[f64] {
        &self.features
    }
}

impl<T: Rankable + ?Sized> Rankable for &T {
    fn fingerprint(&self) -> &Fingerprint {
        (**self).fingerprint()
    }

    fn vector(&self) -> &[f64] {
        (**self).vector()
    }
}

/// One ranked entry
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityResult<T> {
    pub entry: T,
    /// Cosine similarity in [-1, 1]
    pub score: f64,
    /// Position of the entry in the catalog sequence
    pub position: usize,
}

impl SimilarityResult<&CatalogEntry> {
    pub fn to_recommendation(&self) -> Recommendation {
        Recommendation {
            artist: self.entry.metadata.artist.clone(),
            title: self.entry.metadata.title.clone(),
            score: self.score,
        }
    }
}

/// Heap candidate; `Ord` ranks better candidates higher
struct Candidate<T> {
    score: f64,
    position: usize,
    entry: T,
}

impl<T> PartialEq for Candidate<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Candidate<T> {}

impl<T> PartialOrd for Candidate<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Candidate<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.position.cmp(&self.position))
    }
}

/// Chunked top-K cosine ranker
#[derive(Debug, Clone)]
pub struct SimilarityRanker {
    chunk_size: usize,
}

impl Default for SimilarityRanker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl SimilarityRanker {
    /// A chunk size of 0 is treated as 1
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Rank already-normalised entries against an already-normalised query
    pub fn rank<T, I>(
        &self,
        query: &[f64],
        entries: I,
        exclude: Option<&Fingerprint>,
        k: usize,
    ) -> Result<Vec<SimilarityResult<T>>>
    where
        T: Rankable,
        I: IntoIterator<Item = T>,
    {
        self.rank_chunked(query, entries, exclude, k, |v| Ok(v.to_vec()))
    }

    /// Normalise query and entries with `scaler`, chunk by chunk, then rank
    pub fn rank_scaled<T, I>(
        &self,
        scaler: &Scaler,
        query: &[f64],
        entries: I,
        exclude: Option<&Fingerprint>,
        k: usize,
    ) -> Result<Vec<SimilarityResult<T>>>
    where
        T: Rankable,
        I: IntoIterator<Item = T>,
    {
        let query = scaler.transform(query)?;
        self.rank_chunked(&query, entries, exclude, k, |v| scaler.transform(v))
    }

    fn rank_chunked<T, I, F>(
        &self,
        query: &[f64],
        entries: I,
        exclude: Option<&Fingerprint>,
        k: usize,
        normalize: F,
    ) -> Result<Vec<SimilarityResult<T>>>
    where
        T: Rankable,
        I: IntoIterator<Item = T>,
        F: Fn(&[f64]) -> Result<Vec<f64>>,
    {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_norm = norm(query);
        let mut heap: BinaryHeap<Reverse<Candidate<T>>> = BinaryHeap::with_capacity(k + 1);
        let mut chunk: Vec<(usize, T)> = Vec::with_capacity(self.chunk_size);
        let mut chunks = 0usize;
        let mut scored = 0usize;

        let mut entries = entries.into_iter().enumerate().peekable();
        while entries.peek().is_some() {
            chunk.clear();
            chunk.extend(
                entries
                    .by_ref()
                    .filter(|(_, entry)| Some(entry.fingerprint()) != exclude)
                    .take(self.chunk_size),
            );
            if chunk.is_empty() {
                break;
            }
            chunks += 1;

            let normalized = chunk
                .iter()
                .map(|(_, entry)| normalize(entry.vector()))
                .collect::<Result<Vec<_>>>()?;
            let scores = normalized
                .iter()
                .map(|vector| cosine(query, query_norm, vector))
                .collect::<Result<Vec<_>>>()?;

            for ((position, entry), score) in chunk.drain(..).zip(scores) {
                scored += 1;
                offer(&mut heap, k, Candidate { score, position, entry });
            }
        }

        let mut ranked: Vec<Candidate<T>> = heap.into_iter().map(|Reverse(c)| c).collect();
        ranked.sort_by(|a, b| b.cmp(a));

        debug!(chunks, scored, returned = ranked.len(), "Ranking complete");

        Ok(ranked
            .into_iter()
            .map(|c| SimilarityResult {
                entry: c.entry,
                score: c.score,
                position: c.position,
            })
            .collect())
    }
}

fn offer<T>(heap: &mut BinaryHeap<Reverse<Candidate<T>>>, k: usize, candidate: Candidate<T>) {
    if heap.len() < k {
        heap.push(Reverse(candidate));
        return;
    }
    let beats_worst = heap
        .peek()
        .map_or(false, |Reverse(worst)| candidate > *worst);
    if beats_worst {
        heap.pop();
        heap.push(Reverse(candidate));
    }
}

fn norm(vector: &[f64]) -> f64 {
    vector.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Cosine similarity; a zero vector on either side scores 0
fn cosine(query: &[f64], query_norm: f64, other: &[f64]) -> Result<f64> {
    if other.len() != query.len() {
        return Err(RecommendError::DimensionMismatch {
            expected: query.len(),
            actual: other.len(),
        });
    }
    let other_norm = norm(other);
    if query_norm == 0.0 || other_norm == 0.0 {
        return Ok(0.0);
    }
    let dot: f64 = query.iter().zip(other).map(|(a, b)| a * b).sum();
    Ok(dot / (query_norm * other_norm))
}
