// src/repositories/card_mapping_repository.rs
//
// Mapping Cache
//
// Durable external id -> CardMapping cache, stored as JSON in the
// `card_mapping` namespace of the key-value store.
//
// RULES:
// - One entry per external id; `put` overwrites
// - A `put` is visible to the next `get` for the same id
// - Empty or never-written storage yields empty results, never errors
// - An entry that fails to decode is reported as absent and logged

use std::sync::Arc;

use crate::domain::{CardMapping, MappingStats};
use crate::error::AppResult;
use crate::infrastructure::{KeyValueStore, StorageKey, StorageNamespace};

pub trait MappingCache: Send + Sync {
    fn get(&self, external_id: &str) -> AppResult<Option<CardMapping>>;

    /// Upsert by external id
    fn put(&self, mapping: &CardMapping) -> AppResult<()>;

    fn get_all(&self) -> AppResult<Vec<CardMapping>>;

    /// Returns the number of mappings removed
    fn clear(&self) -> AppResult<usize>;

    fn stats(&self) -> AppResult<MappingStats>;
}

pub struct KeyValueMappingCache {
    kv_store: Arc<dyn KeyValueStore>,
}

impl KeyValueMappingCache {
    pub fn new(kv_store: Arc<dyn KeyValueStore>) -> Self {
        Self { kv_store }
    }

    fn decode(item_key: &str, raw: &str) -> Option<CardMapping> {
        match serde_json::from_str(raw) {
            Ok(mapping) => Some(mapping),
            Err(e) => {
                log::warn!("Ignoring unreadable mapping for {}: {}", item_key, e);
                None
            }
        }
    }
}

impl MappingCache for KeyValueMappingCache {
    fn get(&self, external_id: &str) -> AppResult<Option<CardMapping>> {
        let raw = self.kv_store.get(&StorageKey::card_mapping(external_id))?;
        Ok(raw.and_then(|raw| Self::decode(external_id, &raw)))
    }

    fn put(&self, mapping: &CardMapping) -> AppResult<()> {
        let value = serde_json::to_string(mapping)?;
        self.kv_store
            .set(&StorageKey::card_mapping(mapping.external_id.as_str()), &value)
    }

    fn get_all(&self) -> AppResult<Vec<CardMapping>> {
        let mappings = self
            .kv_store
            .entries(StorageNamespace::CardMapping)?
            .into_iter()
            .filter_map(|entry| Self::decode(&entry.item_key, &entry.value))
            .collect();
        Ok(mappings)
    }

    fn clear(&self) -> AppResult<usize> {
        self.kv_store.clear_namespace(StorageNamespace::CardMapping)
    }

    fn stats(&self) -> AppResult<MappingStats> {
        Ok(MappingStats::from_mappings(&self.get_all()?))
    }
}
