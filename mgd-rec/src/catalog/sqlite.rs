//! SQLite catalog
//!
//! **Storage:** one row per fingerprint in `tracks`; `seq` gives insertion order
//! and `features` holds the vector wire form (little-endian f64 values).

use crate::catalog::Catalog;
use crate::error::{RecommendError, Result};
use crate::features::decode_wire;
use crate::fingerprint::Fingerprint;
use crate::types::{CatalogEntry, StoredEntry, TrackMetadata};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::stream::{BoxStream, StreamExt};
use mgd_common::db::init_database;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

const FIND_BY_FINGERPRINT_SQL: &str =
    "SELECT fingerprint, title, artist, features, created_at FROM tracks WHERE fingerprint = ?";

const STREAM_ALL_SQL: &str =
    "SELECT fingerprint, title, artist, features, created_at FROM tracks ORDER BY seq";

/// Catalog backed by a SQLite database file
#[derive(Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    /// Open (creating if needed) the catalog database at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = init_database(path).await?;
        info!("Catalog opened: {}", path.display());
        Ok(Self { pool })
    }

    /// Wrap an existing pool whose schema is already in place
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of stored entries
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tracks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("Catalog closed");
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<StoredEntry>> {
        let row = sqlx::query(FIND_BY_FINGERPRINT_SQL)
            .bind(fingerprint.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_entry(&row)).transpose()
    }

    async fn insert(&self, entry: &CatalogEntry) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO tracks (fingerprint, title, artist, features)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(entry.fingerprint.as_str())
        .bind(&entry.metadata.title)
        .bind(&entry.metadata.artist)
        .bind(entry.features.to_wire())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(fingerprint = %entry.fingerprint, "Fingerprint already catalogued, insert skipped");
        }

        Ok(())
    }

    fn stream_all(&self) -> BoxStream<'_, Result<StoredEntry>> {
        sqlx::query(STREAM_ALL_SQL)
            .fetch(&self.pool)
            .map(|row| match row {
                Ok(row) => row_to_entry(&row),
                Err(e) => Err(RecommendError::from(e)),
            })
            .boxed()
    }
}

/// Convert a `tracks` row into a stored entry
///
/// The fingerprint column is read first so a corrupt row can still be named.
fn row_to_entry(row: &SqliteRow) -> Result<StoredEntry> {
    let raw_fingerprint: String = row.try_get("fingerprint")?;
    let corrupt = |reason: String| RecommendError::CorruptCatalogEntry {
        fingerprint: raw_fingerprint.clone(),
        reason,
    };

    let fingerprint = Fingerprint::from_hex(&raw_fingerprint)
        .ok_or_else(|| corrupt("malformed fingerprint".to_string()))?;

    let blob: Vec<u8> = row.try_get("features")?;
    let features = decode_wire(&blob).map_err(corrupt)?;

    let created_at = row
        .try_get::<Option<NaiveDateTime>, _>("created_at")
        .ok()
        .flatten()
        .map(|t| t.and_utc());

    Ok(StoredEntry {
        fingerprint,
        metadata: TrackMetadata::new(
            row.try_get::<String, _>("title")?,
            row.try_get::<String, _>("artist")?,
        ),
        features,
        created_at,
    })
}
