// src/db/mod.rs
//
// Database module
//
// Provides:
// - Connection pooling
// - Schema migrations
// - Timestamp column encoding
// - Database diagnostics

pub mod connection;
pub mod migrations;
pub mod time;

pub use connection::{
    create_connection_pool, create_connection_pool_at, get_connection, ConnectionPool, PooledConn,
};

pub use migrations::{
    get_database_stats, initialize_database, verify_database_integrity, DatabaseStats,
};

pub use time::{format_timestamp, parse_timestamp};
