use std::fs::create_dir_all;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};

use super::{CursorStore, StoreError, TxStore};
use crate::record::TxRecord;

const CURSOR_KEY: &str = "lastScanned";

const UPSERT_SQL: &str = "INSERT INTO transactions \
     (hash, block, from_addr, to_addr, value, timestamp, method, is_native) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
     ON CONFLICT(hash) DO UPDATE SET \
     block = excluded.block, from_addr = excluded.from_addr, \
     to_addr = excluded.to_addr, value = excluded.value, \
     timestamp = excluded.timestamp, method = excluded.method, \
     is_native = excluded.is_native";

const SELECT_COLS: &str =
    "hash, block, from_addr, to_addr, value, timestamp, method, is_native";

/// SQLite-backed implementation of both store traits.
///
/// One connection behind a mutex is enough here: the indexer writes from a
/// single loop and the web process issues short indexed reads.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and applies the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let p = path.as_ref();
        if let Some(dir) = p.parent()
            && !dir.as_os_str().is_empty()
            && !dir.exists()
        {
            create_dir_all(dir)?;
        }
        let conn = Connection::open(p)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<TxRecord> {
    Ok(TxRecord {
        hash: row.get(0)?,
        block: row.get(1)?,
        from: row.get(2)?,
        to: row.get(3)?,
        value: row.get(4)?,
        timestamp: row.get(5)?,
        method: row.get(6)?,
        is_native: row.get(7)?,
    })
}

impl CursorStore for SqliteStore {
    fn cursor(&self) -> Result<Option<i64>, StoreError> {
        let conn = self.lock()?;
        let val = conn
            .query_row(
                "SELECT val FROM scan_state WHERE key = ?1",
                params![CURSOR_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(val)
    }

    fn set_cursor(&self, height: i64) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO scan_state (key, val) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET val = excluded.val",
            params![CURSOR_KEY, height],
        )?;
        Ok(())
    }
}

impl TxStore for SqliteStore {
    fn upsert_batch(&self, records: &[TxRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_SQL)?;
            for rec in records {
                stmt.execute(params![
                    rec.hash,
                    rec.block,
                    rec.from,
                    rec.to,
                    rec.value,
                    rec.timestamp,
                    rec.method,
                    rec.is_native,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    fn by_address(&self, address: &str, limit: usize) -> Result<Vec<TxRecord>, StoreError> {
        let addr = address.to_lowercase();
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SELECT_COLS} FROM transactions \
             WHERE from_addr = ?1 OR to_addr = ?1 \
             ORDER BY block DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![addr, limit as i64], row_to_record)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn get(&self, hash: &str) -> Result<Option<TxRecord>, StoreError> {
        let conn = self.lock()?;
        let rec = conn
            .query_row(
                &format!("SELECT {SELECT_COLS} FROM transactions WHERE hash = ?1"),
                params![hash],
                row_to_record,
            )
            .optional()?;
        Ok(rec)
    }

    fn count(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: &str, block: i64, from: &str, to: Option<&str>) -> TxRecord {
        TxRecord {
            hash: hash.to_string(),
            block,
            from: from.to_string(),
            to: to.map(str::to_string),
            value: "1.000000000000000000".to_string(),
            timestamp: 1_700_000_000 + block,
            method: "Transfer".to_string(),
            is_native: true,
        }
    }

    #[test]
    fn cursor_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.cursor().unwrap(), None);
        store.set_cursor(1000).unwrap();
        assert_eq!(store.cursor().unwrap(), Some(1000));
        store.set_cursor(999).unwrap();
        assert_eq!(store.cursor().unwrap(), Some(999));
        store.set_cursor(-1).unwrap();
        assert_eq!(store.cursor().unwrap(), Some(-1));
    }

    #[test]
    fn upsert_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let batch = vec![
            record("0x1", 10, "0xabc", Some("0xdef")),
            record("0x2", 10, "0xdef", None),
        ];
        store.upsert_batch(&batch).unwrap();
        store.upsert_batch(&batch).unwrap();
        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.get("0x1").unwrap().unwrap(), batch[0]);
        assert_eq!(store.get("0x2").unwrap().unwrap(), batch[1]);
    }

    #[test]
    fn batch_is_atomic_on_mid_batch_failure() {
        let store = SqliteStore::open_in_memory().unwrap();
        // The empty hash violates the schema's CHECK constraint midway
        // through the batch.
        let batch = vec![
            record("0xaa", 5, "0x1", None),
            record("", 5, "0x2", None),
            record("0xbb", 5, "0x3", None),
        ];
        assert!(store.upsert_batch(&batch).is_err());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn address_query_is_newest_first_and_capped() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_batch(&[
                record("0x1", 30, "0xabc", Some("0x9")),
                record("0x2", 50, "0x9", Some("0xabc")),
                record("0x3", 40, "0xabc", None),
                record("0x4", 45, "0x9", Some("0x8")),
            ])
            .unwrap();

        let txs = store.by_address("0xABC", 100).unwrap();
        let blocks: Vec<i64> = txs.iter().map(|t| t.block).collect();
        assert_eq!(blocks, vec![50, 40, 30]);

        let capped = store.by_address("0xabc", 2).unwrap();
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].block, 50);
    }
}
