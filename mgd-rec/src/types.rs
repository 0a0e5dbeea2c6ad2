//! Catalog entry and result types

use crate::error::RecommendError;
use crate::features::FeatureVector;
use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder used when the caller supplies no display metadata
pub const UNKNOWN: &str = "Unknown";

/// Display metadata of a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
}

impl TrackMetadata {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }
}

impl Default for TrackMetadata {
    fn default() -> Self {
        Self::new(UNKNOWN, UNKNOWN)
    }
}

/// Validated catalog entry; append-only once written
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub fingerprint: Fingerprint,
    pub metadata: TrackMetadata,
    pub features: FeatureVector,
    /// Set by the store on insert
    pub created_at: Option<DateTime<Utc>>,
}

impl CatalogEntry {
    pub fn new(fingerprint: Fingerprint, metadata: TrackMetadata, features: FeatureVector) -> Self {
        Self {
            fingerprint,
            metadata,
            features,
            created_at: None,
        }
    }
}

/// Catalog row as read from a store, before dimension validation
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub fingerprint: Fingerprint,
    pub metadata: TrackMetadata,
    pub features: Vec<f64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    /// Validate the stored vector and produce a catalog entry
    ///
    /// A vector whose length is not the deployment's dimension is corrupt; it is
    /// never truncated or padded.
    pub fn into_entry(self) -> Result<CatalogEntry, RecommendError> {
        match FeatureVector::from_slice(&self.features) {
            Ok(features) => Ok(CatalogEntry {
                fingerprint: self.fingerprint,
                metadata: self.metadata,
                features,
                created_at: self.created_at,
            }),
            Err(reason) => Err(RecommendError::CorruptCatalogEntry {
                fingerprint: self.fingerprint.to_string(),
                reason,
            }),
        }
    }
}

impl From<CatalogEntry> for StoredEntry {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            fingerprint: entry.fingerprint,
            metadata: entry.metadata,
            features: entry.features.to_vec(),
            created_at: entry.created_at,
        }
    }
}

/// One ranked recommendation as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub artist: String,
    pub title: String,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_DIM;
    use crate::fingerprint::ContentFingerprinter;

    fn stored(len: usize) -> StoredEntry {
        StoredEntry {
            fingerprint: ContentFingerprinter::fingerprint(b"x"),
            metadata: TrackMetadata::default(),
            features: vec![0.25; len],
            created_at: None,
        }
    }

    #[test]
    fn test_valid_stored_entry_converts() {
        let entry = stored(FEATURE_DIM).into_entry().unwrap();
        assert_eq!(entry.features.len(), FEATURE_DIM);
        assert_eq!(entry.metadata.title, UNKNOWN);
    }

    #[test]
    fn test_wrong_dimension_is_corrupt() {
        let err = stored(FEATURE_DIM + 1).into_entry().unwrap_err();
        assert!(matches!(err, RecommendError::CorruptCatalogEntry { .. }));
    }

    #[test]
    fn test_recommendation_serializes_flat() {
        let json = serde_json::to_value(Recommendation {
            artist: "A".into(),
            title: "T".into(),
            score: 0.5,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"artist": "A", "title": "T", "score": 0.5}));
    }
}
