//! Redb-backed key/value store with per-key expiry.
//!
//! # Schema
//!
//! ```text
//! KV: key -> StoredValue (rmp-serde) { expires_at_ms, value }
//! ```
//!
//! Expiry is enforced on access: a record past its deadline reads as absent
//! and is deleted when read. Every write also prunes expired records, so keys
//! that are never read again do not accumulate. Nothing runs in the
//! background.

use super::{StoreEvent, StoreFailure, StoreKind};
use crate::events::Emitter;
use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const KV: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// Errors from the key/value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredValue {
    /// Unix epoch milliseconds; `None` never expires.
    expires_at_ms: Option<i64>,
    value: Vec<u8>,
}

impl StoredValue {
    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms.is_some_and(|at| at <= now_ms)
    }
}

#[derive(Clone)]
pub struct KvStore {
    db: Arc<Database>,
    events: Arc<Emitter<StoreEvent>>,
}

impl KvStore {
    /// Open (or create) the store at `path`.
    pub fn open<P: AsRef<Path>>(
        path: P,
        events: Arc<Emitter<StoreEvent>>,
    ) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref())?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(KV)?;
        }
        write_txn.commit()?;

        info!(path = %path.as_ref().display(), "Key/value store opened");
        Ok(Self {
            db: Arc::new(db),
            events,
        })
    }

    /// Announce readiness to store listeners.
    pub fn ready(&self) {
        self.events.emit(&StoreEvent::Ready(StoreKind::KeyValue));
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.observe(self.get_inner(key))
    }

    /// Store `value` under `key`, expiring after `ttl`.
    pub fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at_ms = Utc::now().timestamp_millis().saturating_add(ttl_ms);
        self.observe(self.put(key, value, Some(expires_at_ms)))
    }

    /// Store `value` under `key` with no expiry.
    pub fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.observe(self.put(key, value, None))
    }

    /// Delete `key`. Returns true if a live record was removed.
    pub fn del(&self, key: &str) -> Result<bool, StoreError> {
        self.observe(self.del_inner(key))
    }

    fn get_inner(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KV)?;
        let Some(raw) = table.get(key)? else {
            return Ok(None);
        };
        let stored = decode(raw.value())?;
        let now_ms = Utc::now().timestamp_millis();
        if stored.is_expired(now_ms) {
            debug!(key = %key, "Key expired");
            self.remove_expired(key, now_ms)?;
            return Ok(None);
        }
        Ok(Some(stored.value))
    }

    /// Delete `key` if it is still expired at `now_ms`. A concurrent
    /// rewrite of the key wins.
    fn remove_expired(&self, key: &str, now_ms: i64) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(KV)?;
            let expired = match table.get(key)? {
                Some(raw) => decode(raw.value()).is_ok_and(|stored| stored.is_expired(now_ms)),
                None => false,
            };
            if expired {
                table.remove(key)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn put(&self, key: &str, value: &[u8], expires_at_ms: Option<i64>) -> Result<(), StoreError> {
        let stored = StoredValue {
            expires_at_ms,
            value: value.to_vec(),
        };
        let encoded =
            rmp_serde::to_vec(&stored).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let now_ms = Utc::now().timestamp_millis();
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(KV)?;
            // Undecodable records are left for an operator to inspect.
            table.retain(|_, raw| !decode(raw).is_ok_and(|stored| stored.is_expired(now_ms)))?;
            table.insert(key, encoded.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn del_inner(&self, key: &str) -> Result<bool, StoreError> {
        let now_ms = Utc::now().timestamp_millis();
        let write_txn = self.db.begin_write()?;
        let live = {
            let mut table = write_txn.open_table(KV)?;
            match table.remove(key)? {
                Some(raw) => decode(raw.value()).is_ok_and(|stored| !stored.is_expired(now_ms)),
                None => false,
            }
        };
        write_txn.commit()?;
        Ok(live)
    }

    fn observe<T>(&self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        if let Err(ref e) = result {
            self.events.emit(&StoreEvent::Error(
                StoreKind::KeyValue,
                StoreFailure::Query(e.to_string()),
            ));
        }
        result
    }
}

fn decode(raw: &[u8]) -> Result<StoredValue, StoreError> {
    rmp_serde::from_slice(raw).map_err(|e| StoreError::Serialization(e.to_string()))
}
