//! mgd-rec - content-based music recommendation
//!
//! Turns raw audio bytes into a fixed-length acoustic feature vector and ranks
//! a catalog of previously seen tracks against it. No listening history is
//! involved: similarity is purely acoustic.
//!
//! ```text
//! bytes -> fingerprint -> catalog lookup
//!            hit:  stored vector
//!            miss: decode -> extract -> insert
//!       -> fetch catalog -> normalise -> rank -> top K
//! ```

pub mod audio;
pub mod catalog;
pub mod error;
pub mod features;
pub mod fingerprint;
pub mod instrumentation;
pub mod normalize;
pub mod pipeline;
pub mod ranking;
pub mod types;

pub use crate::catalog::{Catalog, MemoryCatalog, SqliteCatalog};
pub use crate::error::{RecommendError, Result};
pub use crate::features::{FeatureExtractor, FeatureVector, FEATURE_DIM};
pub use crate::fingerprint::{ContentFingerprinter, Fingerprint};
pub use crate::pipeline::{PipelineConfig, RecommendRequest, RecommendationPipeline};
pub use crate::types::{CatalogEntry, Recommendation, StoredEntry, TrackMetadata};
