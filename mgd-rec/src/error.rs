//! Error types for mgd-rec
//!
//! Every variant except [`RecommendError::CorruptCatalogEntry`] aborts a
//! `recommend` call. A corrupt catalog row is skipped from ranking and reported
//! as a warning instead.

use thiserror::Error;

/// Recommendation pipeline error
#[derive(Debug, Error)]
pub enum RecommendError {
    /// Container or codec not recognised; raised before any decoding
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Corrupt stream or resampling failure
    #[error("Decode error: {0}")]
    Decode(String),

    /// Degenerate or too-short signal, or numerical failure
    #[error("Feature extraction failed: {0}")]
    FeatureExtraction(String),

    /// Normalisation attempted without reference vectors
    #[error("Catalog is empty: no reference vectors to normalize against")]
    EmptyCatalog,

    /// Stored vector has the wrong dimension or non-finite values
    #[error("Corrupt catalog entry {fingerprint}: {reason}")]
    CorruptCatalogEntry { fingerprint: String, reason: String },

    /// Transient failure talking to the catalog store; safe to retry
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// Two vectors that must share a dimension do not
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Internal error (worker task failure and similar)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecommendError {
    /// Whether retrying the whole `recommend` call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::CatalogUnavailable(_))
    }
}

impl From<sqlx::Error> for RecommendError {
    fn from(err: sqlx::Error) -> Self {
        Self::CatalogUnavailable(err.to_string())
    }
}

impl From<mgd_common::Error> for RecommendError {
    fn from(err: mgd_common::Error) -> Self {
        match err {
            mgd_common::Error::Database(e) => Self::CatalogUnavailable(e.to_string()),
            mgd_common::Error::Io(e) => Self::CatalogUnavailable(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, RecommendError>;
