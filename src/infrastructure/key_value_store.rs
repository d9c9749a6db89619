// src/infrastructure/key_value_store.rs
//
// Persistent Key-Value Storage
//
// Namespaced string values with a hard capacity. Each entry is independent;
// there is no multi-key atomicity. A write that would exceed the quota
// fails with `QuotaExceeded` and leaves the store unchanged.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use std::sync::Arc;

use crate::db::{format_timestamp, get_connection, parse_timestamp, ConnectionPool};
use crate::error::{AppError, AppResult};
use crate::infrastructure::storage_keys::{StorageKey, StorageNamespace};
use crate::infrastructure::storage_quota::StorageQuota;

/// One stored value with its bookkeeping columns.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub namespace: String,
    pub item_key: String,
    pub value: String,
    pub size_bytes: u64,
    pub updated_at: DateTime<Utc>,
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &StorageKey) -> AppResult<Option<String>>;
    fn get_entry(&self, key: &StorageKey) -> AppResult<Option<StoredEntry>>;
    fn set(&self, key: &StorageKey, value: &str) -> AppResult<()>;

    /// Returns true if an entry was removed
    fn remove(&self, key: &StorageKey) -> AppResult<bool>;

    /// Entries of one namespace, oldest first
    fn entries(&self, namespace: StorageNamespace) -> AppResult<Vec<StoredEntry>>;

    fn clear_namespace(&self, namespace: StorageNamespace) -> AppResult<usize>;

    /// Removes every entry in every namespace
    fn clear(&self) -> AppResult<usize>;

    /// Total footprint of all entries
    fn usage_bytes(&self) -> AppResult<u64>;
}

pub struct SqliteKeyValueStore {
    pool: Arc<ConnectionPool>,
    quota: StorageQuota,
}

impl SqliteKeyValueStore {
    pub fn new(pool: Arc<ConnectionPool>, quota: StorageQuota) -> Self {
        Self { pool, quota }
    }

    fn row_to_entry(row: &Row) -> Result<StoredEntry, rusqlite::Error> {
        let size_bytes: i64 = row.get("size_bytes")?;
        let updated_at: String = row.get("updated_at")?;

        Ok(StoredEntry {
            namespace: row.get("namespace")?,
            item_key: row.get("item_key")?,
            value: row.get("value")?,
            size_bytes: size_bytes.max(0) as u64,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &StorageKey) -> AppResult<Option<String>> {
        Ok(self.get_entry(key)?.map(|entry| entry.value))
    }

    fn get_entry(&self, key: &StorageKey) -> AppResult<Option<StoredEntry>> {
        let conn = get_connection(&self.pool)?;

        let entry = conn
            .query_row(
                "SELECT * FROM kv_entries WHERE namespace = ?1 AND item_key = ?2",
                params![key.namespace().as_str(), key.item_key()],
                Self::row_to_entry,
            )
            .optional()?;

        Ok(entry)
    }

    fn set(&self, key: &StorageKey, value: &str) -> AppResult<()> {
        let mut conn = get_connection(&self.pool)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let previous: i64 = tx
            .query_row(
                "SELECT size_bytes FROM kv_entries WHERE namespace = ?1 AND item_key = ?2",
                params![key.namespace().as_str(), key.item_key()],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);

        let footprint = key.footprint(value);
        let used = StorageQuota::usage(&tx)?.total();
        self.quota
            .ensure_fits(used.saturating_sub(previous.max(0) as u64), footprint)?;

        tx.execute(
            "INSERT OR REPLACE INTO kv_entries (namespace, item_key, value, size_bytes, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                key.namespace().as_str(),
                key.item_key(),
                value,
                footprint as i64,
                format_timestamp(&Utc::now()),
            ],
        )
        .map_err(AppError::from_write)?;

        tx.commit().map_err(AppError::from_write)?;
        Ok(())
    }

    fn remove(&self, key: &StorageKey) -> AppResult<bool> {
        let conn = get_connection(&self.pool)?;
        let removed = conn.execute(
            "DELETE FROM kv_entries WHERE namespace = ?1 AND item_key = ?2",
            params![key.namespace().as_str(), key.item_key()],
        )?;
        Ok(removed > 0)
    }

    fn entries(&self, namespace: StorageNamespace) -> AppResult<Vec<StoredEntry>> {
        let conn = get_connection(&self.pool)?;

        let mut stmt = conn.prepare(
            "SELECT * FROM kv_entries WHERE namespace = ?1 ORDER BY updated_at ASC, item_key ASC",
        )?;

        let entries = stmt
            .query_map(params![namespace.as_str()], Self::row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn clear_namespace(&self, namespace: StorageNamespace) -> AppResult<usize> {
        let conn = get_connection(&self.pool)?;
        let removed = conn.execute(
            "DELETE FROM kv_entries WHERE namespace = ?1",
            params![namespace.as_str()],
        )?;
        Ok(removed)
    }

    fn clear(&self) -> AppResult<usize> {
        let conn = get_connection(&self.pool)?;
        let removed = conn.execute("DELETE FROM kv_entries", [])?;
        Ok(removed)
    }

    fn usage_bytes(&self) -> AppResult<u64> {
        let conn = get_connection(&self.pool)?;
        Ok(StorageQuota::usage(&conn)?.kv_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestDb;

    fn store(db: &TestDb, capacity: u64) -> SqliteKeyValueStore {
        SqliteKeyValueStore::new(db.pool.clone(), StorageQuota::new(capacity))
    }

    #[test]
    fn test_empty_store_returns_defaults() {
        let db = TestDb::new();
        let kv = store(&db, 1_000);

        assert_eq!(kv.get(&StorageKey::card_mapping("missing")).unwrap(), None);
        assert!(kv.entries(StorageNamespace::CardMapping).unwrap().is_empty());
        assert_eq!(kv.usage_bytes().unwrap(), 0);
        assert_eq!(kv.clear().unwrap(), 0);
    }

    #[test]
    fn test_set_then_get() {
        let db = TestDb::new();
        let kv = store(&db, 1_000);
        let key = StorageKey::catalog_card("E1");

        kv.set(&key, "{\"name\":\"Shock\"}").unwrap();

        assert_eq!(kv.get(&key).unwrap().as_deref(), Some("{\"name\":\"Shock\"}"));
        assert_eq!(kv.usage_bytes().unwrap(), key.footprint("{\"name\":\"Shock\"}"));
    }

    #[test]
    fn test_overwrite_replaces_footprint() {
        let db = TestDb::new();
        let kv = store(&db, 1_000);
        let key = StorageKey::catalog_card("E1");

        kv.set(&key, "aaaaaaaaaa").unwrap();
        kv.set(&key, "b").unwrap();

        assert_eq!(kv.get(&key).unwrap().as_deref(), Some("b"));
        assert_eq!(kv.usage_bytes().unwrap(), key.footprint("b"));
    }

    #[test]
    fn test_quota_exceeded_leaves_store_unchanged() {
        let db = TestDb::new();
        let kv = store(&db, 60);
        let first = StorageKey::catalog_card("E1");
        let second = StorageKey::catalog_card("E2");

        kv.set(&first, &"x".repeat(30)).unwrap();
        let err = kv.set(&second, &"y".repeat(30)).unwrap_err();

        assert!(err.is_quota_exceeded());
        assert_eq!(kv.get(&second).unwrap(), None);
        assert_eq!(kv.usage_bytes().unwrap(), first.footprint(&"x".repeat(30)));
    }

    #[test]
    fn test_overwrite_within_quota_counts_old_value_as_free() {
        let db = TestDb::new();
        let kv = store(&db, 60);
        let key = StorageKey::catalog_card("E1");

        kv.set(&key, &"x".repeat(40)).unwrap();
        kv.set(&key, &"z".repeat(40)).unwrap();

        assert_eq!(kv.get(&key).unwrap(), Some("z".repeat(40)));
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let db = TestDb::new();
        let kv = store(&db, 10_000);

        kv.set(&StorageKey::card_mapping("E1"), "mapping").unwrap();
        kv.set(&StorageKey::catalog_card("E1"), "card").unwrap();

        assert_eq!(kv.clear_namespace(StorageNamespace::CatalogCard).unwrap(), 1);
        assert_eq!(
            kv.get(&StorageKey::card_mapping("E1")).unwrap().as_deref(),
            Some("mapping")
        );
        assert!(kv.remove(&StorageKey::card_mapping("E1")).unwrap());
        assert!(!kv.remove(&StorageKey::card_mapping("E1")).unwrap());
    }
}
