// src/repositories/bulk_dataset_repository.rs
//
// Bulk Dataset Store
//
// Owns the reference dataset (sets -> printings -> prices) on disk.
//
// RULES:
// - A dataset is replaced wholesale, inside one transaction
// - Readers see either the previous dataset or the new one, never a mix
// - Any failure during ingestion (quota, malformed set, cancellation)
//   rolls back and leaves the previous dataset in place
// - Lookups never load more than the requested rows

use chrono::{SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::sync::Arc;

use crate::db::{format_timestamp, get_connection, parse_timestamp, ConnectionPool};
use crate::domain::{
    normalize_name, DatasetBlob, DatasetMetadata, IngestReport, PricePoint, ReferencePrinting,
};
use crate::error::{AppError, AppResult};
use crate::infrastructure::{CancellationSignal, IngestProgress, StorageQuota};

const PRINTING_COLUMNS: &str =
    "reference_id, name, set_code, collector_number, rarity, external_id_hint";

#[cfg_attr(test, mockall::automock)]
pub trait BulkDatasetStore: Send + Sync {
    /// Whether a dataset is currently stored
    fn is_available(&self) -> AppResult<bool>;

    /// Replace the stored dataset with `blob`.
    ///
    /// Fails with `QuotaExceeded` when the new dataset does not fit next to
    /// the key-value entries, and with `Cancelled` when `cancel` fires
    /// before commit. The previous dataset survives every failure.
    /// `progress` hears about every set as it is written.
    fn store_dataset(
        &self,
        blob: &DatasetBlob,
        cancel: &CancellationSignal,
        progress: &IngestProgress,
    ) -> AppResult<IngestReport>;

    fn lookup_by_external_id_hint(&self, external_id: &str)
        -> AppResult<Option<ReferencePrinting>>;

    fn lookup_by_reference_id(&self, reference_id: &str) -> AppResult<Option<ReferencePrinting>>;

    /// Substring search over normalized names.
    ///
    /// Exact matches first, then prefix matches, then the rest, each group
    /// ordered by name and reference id.
    fn search_by_name(&self, name: &str, limit: usize) -> AppResult<Vec<ReferencePrinting>>;

    /// Same matching and order as `search_by_name`, but one printing per
    /// normalized name (the lowest reference id), so reprints do not crowd
    /// out other names.
    fn search_distinct_names(&self, name: &str, limit: usize) -> AppResult<Vec<ReferencePrinting>>;

    /// Printings of `set_code` (any case) whose normalized name equals
    /// `normalized_name`.
    fn find_by_name_in_set(
        &self,
        normalized_name: &str,
        set_code: &str,
    ) -> AppResult<Vec<ReferencePrinting>>;

    /// Printings of `set_code` whose collector number matches, ignoring case.
    fn find_by_collector_number(
        &self,
        set_code: &str,
        collector_number: &str,
    ) -> AppResult<Vec<ReferencePrinting>>;

    /// Price series of one printing, oldest first
    fn price_history(&self, reference_id: &str) -> AppResult<Vec<PricePoint>>;

    /// Metadata of the stored dataset, `None` when absent
    fn get_stats(&self) -> AppResult<Option<DatasetMetadata>>;

    fn clear(&self) -> AppResult<()>;
}

pub struct SqliteBulkDatasetStore {
    pool: Arc<ConnectionPool>,
    quota: StorageQuota,
}

impl SqliteBulkDatasetStore {
    pub fn new(pool: Arc<ConnectionPool>, quota: StorageQuota) -> Self {
        Self { pool, quota }
    }

    /// Substring search over normalized names, narrowed by `extra_filter`
    /// (a clause on alias `p`).
    fn search(
        &self,
        name: &str,
        limit: usize,
        extra_filter: &str,
    ) -> AppResult<Vec<ReferencePrinting>> {
        let normalized = normalize_name(name);
        if normalized.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        // Normalized names hold only letters, digits and spaces, so no
        // LIKE wildcard can leak in from the query.
        let conn = get_connection(&self.pool)?;
        Self::query_printings(
            &conn,
            &format!(
                "SELECT {} FROM reference_printings p
                 WHERE p.name_normalized LIKE ?1 {}
                 ORDER BY (p.name_normalized = ?2) DESC,
                          (p.name_normalized LIKE ?3) DESC,
                          p.name_normalized ASC,
                          p.reference_id ASC
                 LIMIT ?4",
                PRINTING_COLUMNS, extra_filter
            ),
            params![
                format!("%{}%", normalized),
                normalized,
                format!("{}%", normalized),
                limit as i64,
            ],
        )
    }

    fn row_to_printing(row: &Row) -> rusqlite::Result<ReferencePrinting> {
        Ok(ReferencePrinting {
            reference_id: row.get("reference_id")?,
            name: row.get("name")?,
            set_code: row.get("set_code")?,
            collector_number: row.get("collector_number")?,
            rarity: row.get("rarity")?,
            external_id_hint: row.get("external_id_hint")?,
            prices: Vec::new(),
        })
    }

    fn row_to_metadata(row: &Row) -> rusqlite::Result<DatasetMetadata> {
        let ingest_date: String = row.get("ingest_date")?;

        Ok(DatasetMetadata {
            version: row.get("version")?,
            published_date: row.get("published_date")?,
            ingest_date: parse_timestamp(&ingest_date)?,
            total_printings: row.get::<_, i64>("total_printings")?.max(0) as u64,
            total_sets: row.get::<_, i64>("total_sets")?.max(0) as u64,
            size_bytes: row.get::<_, i64>("size_bytes")?.max(0) as u64,
            content_hash: row.get("content_hash")?,
        })
    }

    fn load_prices(conn: &Connection, reference_id: &str) -> AppResult<Vec<PricePoint>> {
        let mut stmt = conn.prepare_cached(
            "SELECT price_date, price FROM printing_prices
             WHERE reference_id = ?1 ORDER BY price_date ASC",
        )?;

        let prices = stmt
            .query_map(params![reference_id], |row| {
                Ok(PricePoint {
                    date: row.get(0)?,
                    price: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(prices)
    }

    /// Run a printing query and attach each row's prices.
    fn query_printings<P: rusqlite::Params>(
        conn: &Connection,
        sql: &str,
        params: P,
    ) -> AppResult<Vec<ReferencePrinting>> {
        let mut stmt = conn.prepare(sql)?;
        let mut printings = stmt
            .query_map(params, Self::row_to_printing)?
            .collect::<Result<Vec<_>, _>>()?;

        for printing in &mut printings {
            printing.prices = Self::load_prices(conn, &printing.reference_id)?;
        }

        Ok(printings)
    }

    fn query_printing<P: rusqlite::Params>(
        conn: &Connection,
        sql: &str,
        params: P,
    ) -> AppResult<Option<ReferencePrinting>> {
        let printing = conn.query_row(sql, params, Self::row_to_printing).optional()?;

        match printing {
            Some(mut printing) => {
                printing.prices = Self::load_prices(conn, &printing.reference_id)?;
                Ok(Some(printing))
            }
            None => Ok(None),
        }
    }

    fn delete_dataset(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "DELETE FROM printing_prices;
             DELETE FROM reference_printings;
             DELETE FROM reference_sets;
             DELETE FROM dataset_meta;",
        )
    }
}

impl BulkDatasetStore for SqliteBulkDatasetStore {
    fn is_available(&self) -> AppResult<bool> {
        let conn = get_connection(&self.pool)?;
        let present = conn
            .query_row("SELECT 1 FROM dataset_meta WHERE id = 1", [], |_| Ok(()))
            .optional()?;
        Ok(present.is_some())
    }

    fn store_dataset(
        &self,
        blob: &DatasetBlob,
        cancel: &CancellationSignal,
        progress: &IngestProgress,
    ) -> AppResult<IngestReport> {
        let mut conn = get_connection(&self.pool)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // The dataset being replaced does not count against the new one
        let other_bytes = StorageQuota::usage(&tx)?.kv_bytes;

        Self::delete_dataset(&tx).map_err(AppError::from_write)?;

        let mut size_bytes: u64 = 0;
        let mut total_printings: u64 = 0;
        let mut total_sets: u64 = 0;
        let mut skipped_printings: u64 = 0;

        {
            let mut insert_set =
                tx.prepare("INSERT OR IGNORE INTO reference_sets (code, name) VALUES (?1, ?2)")?;
            let mut insert_printing = tx.prepare(
                "INSERT OR IGNORE INTO reference_printings (
                    reference_id, name, name_normalized, set_code,
                    collector_number, rarity, external_id_hint
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            let mut insert_price = tx.prepare(
                "INSERT OR REPLACE INTO printing_prices (reference_id, price_date, price)
                 VALUES (?1, ?2, ?3)",
            )?;

            let sets_total = blob.set_count();

            for (index, set) in blob.decode_sets().enumerate() {
                if cancel.is_cancelled() {
                    log::info!("Dataset ingestion cancelled, rolling back");
                    return Err(AppError::Cancelled);
                }

                let set = set?;
                skipped_printings += set.skipped as u64;

                let inserted = insert_set
                    .execute(params![set.code, set.name])
                    .map_err(AppError::from_write)?;
                if inserted > 0 {
                    total_sets += 1;
                    size_bytes += set.storage_footprint();
                }

                for printing in &set.printings {
                    let normalized = normalize_name(&printing.name);

                    let inserted = insert_printing
                        .execute(params![
                            printing.reference_id,
                            printing.name,
                            normalized,
                            printing.set_code,
                            printing.collector_number,
                            printing.rarity,
                            printing.external_id_hint,
                        ])
                        .map_err(AppError::from_write)?;

                    // Duplicate uuid: first occurrence wins
                    if inserted == 0 {
                        log::debug!(
                            "Duplicate printing {} in set {} skipped",
                            printing.reference_id,
                            set.code
                        );
                        skipped_printings += 1;
                        continue;
                    }

                    for price in &printing.prices {
                        insert_price
                            .execute(params![printing.reference_id, price.date, price.price])
                            .map_err(AppError::from_write)?;
                    }

                    total_printings += 1;
                    size_bytes += printing.storage_footprint(&normalized);
                }

                progress.report(index + 1, sets_total);
            }
        }

        if cancel.is_cancelled() {
            log::info!("Dataset ingestion cancelled before commit, rolling back");
            return Err(AppError::Cancelled);
        }

        self.quota.ensure_fits(other_bytes, size_bytes)?;

        let metadata = DatasetMetadata {
            version: blob.meta().version.clone(),
            published_date: blob.meta().date.clone(),
            ingest_date: Utc::now().trunc_subsecs(6),
            total_printings,
            total_sets,
            size_bytes,
            content_hash: blob.content_hash().to_string(),
        };

        tx.execute(
            "INSERT INTO dataset_meta (
                id, version, published_date, ingest_date,
                total_printings, total_sets, size_bytes, content_hash
            ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                metadata.version,
                metadata.published_date,
                format_timestamp(&metadata.ingest_date),
                metadata.total_printings as i64,
                metadata.total_sets as i64,
                metadata.size_bytes as i64,
                metadata.content_hash,
            ],
        )
        .map_err(AppError::from_write)?;

        tx.commit().map_err(AppError::from_write)?;

        log::info!(
            "Stored dataset {} ({} sets, {} printings, {} bytes, {} skipped)",
            metadata.version,
            metadata.total_sets,
            metadata.total_printings,
            metadata.size_bytes,
            skipped_printings
        );

        Ok(IngestReport {
            metadata,
            skipped_printings,
        })
    }

    fn lookup_by_external_id_hint(
        &self,
        external_id: &str,
    ) -> AppResult<Option<ReferencePrinting>> {
        let conn = get_connection(&self.pool)?;
        Self::query_printing(
            &conn,
            &format!(
                "SELECT {} FROM reference_printings
                 WHERE external_id_hint = ?1
                 ORDER BY reference_id LIMIT 1",
                PRINTING_COLUMNS
            ),
            params![external_id],
        )
    }

    fn lookup_by_reference_id(&self, reference_id: &str) -> AppResult<Option<ReferencePrinting>> {
        let conn = get_connection(&self.pool)?;
        Self::query_printing(
            &conn,
            &format!(
                "SELECT {} FROM reference_printings WHERE reference_id = ?1",
                PRINTING_COLUMNS
            ),
            params![reference_id],
        )
    }

    fn search_by_name(&self, name: &str, limit: usize) -> AppResult<Vec<ReferencePrinting>> {
        self.search(name, limit, "")
    }

    fn search_distinct_names(&self, name: &str, limit: usize) -> AppResult<Vec<ReferencePrinting>> {
        self.search(
            name,
            limit,
            "AND p.reference_id = (
                 SELECT MIN(q.reference_id) FROM reference_printings q
                 WHERE q.name_normalized = p.name_normalized
             )",
        )
    }

    fn find_by_name_in_set(
        &self,
        normalized_name: &str,
        set_code: &str,
    ) -> AppResult<Vec<ReferencePrinting>> {
        let conn = get_connection(&self.pool)?;
        Self::query_printings(
            &conn,
            &format!(
                "SELECT {} FROM reference_printings
                 WHERE name_normalized = ?1 AND set_code = ?2
                 ORDER BY reference_id",
                PRINTING_COLUMNS
            ),
            params![normalized_name, set_code.trim().to_uppercase()],
        )
    }

    fn find_by_collector_number(
        &self,
        set_code: &str,
        collector_number: &str,
    ) -> AppResult<Vec<ReferencePrinting>> {
        let conn = get_connection(&self.pool)?;
        Self::query_printings(
            &conn,
            &format!(
                "SELECT {} FROM reference_printings
                 WHERE set_code = ?1 AND collector_number = ?2 COLLATE NOCASE
                 ORDER BY reference_id",
                PRINTING_COLUMNS
            ),
            params![set_code.trim().to_uppercase(), collector_number.trim()],
        )
    }

    fn price_history(&self, reference_id: &str) -> AppResult<Vec<PricePoint>> {
        let conn = get_connection(&self.pool)?;
        Self::load_prices(&conn, reference_id)
    }

    fn get_stats(&self) -> AppResult<Option<DatasetMetadata>> {
        let conn = get_connection(&self.pool)?;
        let metadata = conn
            .query_row(
                "SELECT * FROM dataset_meta WHERE id = 1",
                [],
                Self::row_to_metadata,
            )
            .optional()?;
        Ok(metadata)
    }

    fn clear(&self) -> AppResult<()> {
        let mut conn = get_connection(&self.pool)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Self::delete_dataset(&tx)?;
        tx.commit()?;
        log::info!("Bulk dataset cleared");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
