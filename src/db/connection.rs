// src/db/connection.rs
//
// Database connection management
//
// One SQLite file holds the bulk dataset and every key-value namespace.
// WAL mode lets readers keep a consistent snapshot while an ingestion
// transaction is open on another connection.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

use crate::error::{AppError, AppResult};

/// Type alias for connection pool
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled connection
pub type PooledConn = PooledConnection<SqliteConnectionManager>;

const DATABASE_FILE: &str = "cardvault.db";

/// Create a connection pool for the database inside `data_dir`.
///
/// The directory is created if missing.
pub fn create_connection_pool(data_dir: &Path) -> AppResult<ConnectionPool> {
    std::fs::create_dir_all(data_dir)?;
    create_connection_pool_at(&data_dir.join(DATABASE_FILE))
}

/// Create a connection pool for an explicit database file.
///
/// Pool configuration:
/// - Max 8 connections (single-user process)
/// - WAL journal, NORMAL sync
/// - Busy timeout so a long ingestion does not fail concurrent readers
pub fn create_connection_pool_at(db_path: &Path) -> AppResult<ConnectionPool> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    });

    let pool = Pool::builder()
        .max_size(8)
        .build(manager)
        .map_err(|e| AppError::Other(format!("Failed to create connection pool: {}", e)))?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// Convenience wrapper with a better error message.
pub fn get_connection(pool: &ConnectionPool) -> AppResult<PooledConn> {
    pool.get()
        .map_err(|e| AppError::Pool(format!("Failed to get database connection: {}", e)))
}
