//! On-disk key-value store backed by redb.
//!
//! Holds persisted layout and view records across sessions. Every write is
//! its own transaction; reads use MVCC snapshots.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, TableDefinition};

use crate::error::StoreError;

use super::{KvStore, StoreResult};

/// File name of the layout cache inside the data directory.
pub const DB_FILE: &str = "intel-graph.redb";

const LAYOUT_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("layout");

/// redb-backed store.
pub struct DurableStore {
    db: Arc<Database>,
}

fn redb_error(op: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Redb {
        message: format!("{op} failed: {e}"),
    }
}

impl DurableStore {
    /// Open or create the store in `data_dir`.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join(DB_FILE);
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl KvStore for DurableStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(|e| redb_error("begin_read", e))?;
        let table = match txn.open_table(LAYOUT_TABLE) {
            Ok(t) => t,
            // Nothing has been written yet.
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(redb_error("open_table", e)),
        };
        let result = table.get(key).map_err(|e| redb_error("get", e))?;
        Ok(result.map(|guard| guard.value().to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(|e| redb_error("begin_write", e))?;
        {
            let mut table = txn
                .open_table(LAYOUT_TABLE)
                .map_err(|e| redb_error("open_table", e))?;
            table
                .insert(key, value)
                .map_err(|e| redb_error("insert", e))?;
        }
        txn.commit().map_err(|e| redb_error("commit", e))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(|e| redb_error("begin_write", e))?;
        let existed = {
            let mut table = txn
                .open_table(LAYOUT_TABLE)
                .map_err(|e| redb_error("open_table", e))?;
            let removed = table.remove(key).map_err(|e| redb_error("remove", e))?;
            removed.is_some()
        };
        txn.commit().map_err(|e| redb_error("commit", e))?;
        Ok(existed)
    }

    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(|e| redb_error("begin_read", e))?;
        let table = match txn.open_table(LAYOUT_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(redb_error("open_table", e)),
        };
        let mut out = Vec::new();
        for entry in table
            .range(prefix..)
            .map_err(|e| redb_error("range", e))?
        {
            let (key, _) = entry.map_err(|e| redb_error("range", e))?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            out.push(key.to_string());
        }
        Ok(out)
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish()
    }
}
