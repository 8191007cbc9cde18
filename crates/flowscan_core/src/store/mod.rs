//! Durable state: the scan cursor and the transaction collection.
//!
//! The indexer is the sole writer of both; the web process only reads.
//! Traits keep the scanner testable against in-memory or failure-injecting
//! backends.

use thiserror::Error;

use crate::record::TxRecord;

pub mod sqlite;

pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store mutex poisoned")]
    Poisoned,
}

/// The singleton "next height to scan" checkpoint.
///
/// `set_cursor` must be atomic; the persisted value is the only durable
/// record of scan progress.
pub trait CursorStore {
    fn cursor(&self) -> Result<Option<i64>, StoreError>;
    fn set_cursor(&self, height: i64) -> Result<(), StoreError>;
}

/// The persisted transaction collection, keyed by hash.
pub trait TxStore {
    /// Upserts all records atomically: either the whole batch is durable
    /// or none of it is. Re-running the same batch is a no-op apart from
    /// overwriting identical field values.
    fn upsert_batch(&self, records: &[TxRecord]) -> Result<usize, StoreError>;

    /// Records where `address` is sender or recipient, newest block first,
    /// at most `limit`.
    fn by_address(&self, address: &str, limit: usize) -> Result<Vec<TxRecord>, StoreError>;

    fn get(&self, hash: &str) -> Result<Option<TxRecord>, StoreError>;

    fn count(&self) -> Result<u64, StoreError>;
}
