//! Persistent catalog of fingerprinted tracks
//!
//! The catalog is append-only and keyed by [`Fingerprint`]. Reads hand back
//! [`StoredEntry`] rows exactly as stored; dimension validation happens in the
//! pipeline so a single corrupt row never poisons a whole scan.
//!
//! # Implementations
//! - [`SqliteCatalog`] - sqlx / SQLite, used by the CLI
//! - [`MemoryCatalog`] - in-process store for tests and embedding

pub mod memory;
pub mod sqlite;

pub use memory::MemoryCatalog;
pub use sqlite::SqliteCatalog;

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::types::{CatalogEntry, StoredEntry};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Catalog store contract
///
/// Implementations must make `insert` insert-if-absent: a second insert with an
/// existing fingerprint is a no-op, never an overwrite. `stream_all` yields rows
/// in insertion order; it need not be a consistent snapshot across concurrent
/// writers, and each call starts a fresh scan.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Look up a stored entry by fingerprint
    async fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<StoredEntry>>;

    /// Insert an entry unless its fingerprint is already present
    async fn insert(&self, entry: &CatalogEntry) -> Result<()>;

    /// Lazily scan every stored entry in insertion order
    ///
    /// Rows that cannot even be read back as a [`StoredEntry`] are yielded as
    /// `CorruptCatalogEntry` errors; the scan continues after them.
    fn stream_all(&self) -> BoxStream<'_, Result<StoredEntry>>;
}
