// src/infrastructure/mod.rs
//
// Infrastructure Layer
//
// Storage primitives shared by the repositories and services: the key
// schema, the quota-limited key-value store, the single cleanup entry
// point, cooperative cancellation and ingestion progress.
//
// RULES:
// - Infrastructure serves the domain
// - Infrastructure never dictates domain behavior

pub mod cancellation;
pub mod ingest_progress;
pub mod key_value_store;
pub mod storage_janitor;
pub mod storage_keys;
pub mod storage_quota;

pub use cancellation::CancellationSignal;
pub use ingest_progress::IngestProgress;
pub use key_value_store::{KeyValueStore, SqliteKeyValueStore, StoredEntry};
pub use storage_janitor::{CleanupReport, StorageJanitor};
pub use storage_keys::{StorageKey, StorageNamespace};
pub use storage_quota::{StorageQuota, StorageUsage, DEFAULT_QUOTA_BYTES};
