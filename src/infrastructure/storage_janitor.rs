// src/infrastructure/storage_janitor.rs
//
// Storage Cleanup
//
// The single entry point for freeing quota. Only namespaces declared
// evictable in the key schema are touched; mappings and the bulk dataset
// are never deleted here.

use std::sync::Arc;

use crate::error::AppResult;
use crate::events::{EventBus, StorageCleanedUp};
use crate::infrastructure::key_value_store::KeyValueStore;
use crate::infrastructure::storage_keys::{StorageKey, StorageNamespace};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub entries_evicted: usize,
    pub bytes_freed: u64,

    /// False when every evictable entry is gone and the target was not reached
    pub target_met: bool,
}

pub struct StorageJanitor {
    kv_store: Arc<dyn KeyValueStore>,
    event_bus: Arc<EventBus>,
}

impl StorageJanitor {
    pub fn new(kv_store: Arc<dyn KeyValueStore>, event_bus: Arc<EventBus>) -> Self {
        Self { kv_store, event_bus }
    }

    /// Evict the oldest evictable entries until `bytes_needed` are freed.
    pub fn free_space(&self, bytes_needed: u64) -> AppResult<CleanupReport> {
        let mut report = CleanupReport::default();

        'namespaces: for namespace in StorageNamespace::eviction_order() {
            if report.bytes_freed >= bytes_needed {
                break;
            }

            for entry in self.kv_store.entries(namespace)? {
                if report.bytes_freed >= bytes_needed {
                    break 'namespaces;
                }

                let key = Self::key_for(namespace, entry.item_key);
                if self.kv_store.remove(&key)? {
                    report.entries_evicted += 1;
                    report.bytes_freed += entry.size_bytes;
                }
            }
        }

        report.target_met = report.bytes_freed >= bytes_needed;

        log::info!(
            "Storage cleanup evicted {} entries ({} bytes) for a {} byte target",
            report.entries_evicted,
            report.bytes_freed,
            bytes_needed
        );
        self.event_bus.emit(StorageCleanedUp::new(
            bytes_needed,
            report.bytes_freed,
            report.entries_evicted,
        ));

        Ok(report)
    }

    fn key_for(namespace: StorageNamespace, item_key: String) -> StorageKey {
        match namespace {
            StorageNamespace::CardMapping => StorageKey::card_mapping(item_key),
            StorageNamespace::CatalogCard => StorageKey::catalog_card(item_key),
            StorageNamespace::CatalogSearch => StorageKey::catalog_search(item_key),
        }
    }
}
