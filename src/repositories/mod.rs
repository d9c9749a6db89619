// src/repositories/mod.rs
//
// Repository layer
//
// RULES:
// - Repositories are data mappers over storage
// - NO reconciliation logic
// - NO event emission
// - NO cross-repository calls
// - Explicit SQL only

pub mod bulk_dataset_repository;
pub mod card_mapping_repository;

pub use bulk_dataset_repository::{BulkDatasetStore, SqliteBulkDatasetStore};
pub use card_mapping_repository::{KeyValueMappingCache, MappingCache};

#[cfg(test)]
pub use bulk_dataset_repository::MockBulkDatasetStore;
