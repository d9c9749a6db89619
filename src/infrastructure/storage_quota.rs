// src/infrastructure/storage_quota.rs
//
// Storage Quota
//
// The key-value entries and the bulk dataset share one capacity. Usage is
// the sum of every key-value footprint plus the stored dataset footprint.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{AppError, AppResult};

/// Default capacity: 2 GiB
pub const DEFAULT_QUOTA_BYTES: u64 = 2 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageQuota {
    capacity_bytes: u64,
}

/// Bytes in use, split by owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageUsage {
    pub kv_bytes: u64,
    pub dataset_bytes: u64,
}

impl StorageUsage {
    pub fn total(&self) -> u64 {
        self.kv_bytes + self.dataset_bytes
    }
}

impl StorageQuota {
    pub fn new(capacity_bytes: u64) -> Self {
        Self { capacity_bytes }
    }

    pub fn unlimited() -> Self {
        Self::new(u64::MAX)
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    /// Current usage as seen by `conn` (inside its transaction, if any).
    pub fn usage(conn: &Connection) -> AppResult<StorageUsage> {
        let kv_bytes: i64 = conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM kv_entries",
            [],
            |row| row.get(0),
        )?;

        let dataset_bytes: Option<i64> = conn
            .query_row("SELECT size_bytes FROM dataset_meta WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        Ok(StorageUsage {
            kv_bytes: kv_bytes.max(0) as u64,
            dataset_bytes: dataset_bytes.unwrap_or(0).max(0) as u64,
        })
    }

    /// Fail with `QuotaExceeded` unless `incoming` bytes fit next to `used`.
    pub fn ensure_fits(&self, used: u64, incoming: u64) -> AppResult<()> {
        let available = self.capacity_bytes.saturating_sub(used);
        if incoming > available {
            return Err(AppError::QuotaExceeded {
                required: incoming,
                available,
            });
        }
        Ok(())
    }
}

impl Default for StorageQuota {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTA_BYTES)
    }
}
