// src/infrastructure/storage_keys.rs
//
// Storage Key Schema
//
// Every key this system writes to the key-value store is enumerated here.
// Cleanup decides what it may evict from the namespace, never from string
// prefixes.

use std::fmt;

/// A group of keys with a shared lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageNamespace {
    /// Reconciliation results. Durable; only an explicit clear removes them.
    CardMapping,

    /// Catalog card records fetched from the live API
    CatalogCard,

    /// Catalog search result lists, keyed by normalized query
    CatalogSearch,
}

impl StorageNamespace {
    pub const ALL: [StorageNamespace; 3] = [
        StorageNamespace::CardMapping,
        StorageNamespace::CatalogCard,
        StorageNamespace::CatalogSearch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageNamespace::CardMapping => "card_mapping",
            StorageNamespace::CatalogCard => "catalog_card",
            StorageNamespace::CatalogSearch => "catalog_search",
        }
    }

    /// Whether quota cleanup may delete entries from this namespace.
    pub fn is_evictable(self) -> bool {
        !matches!(self, StorageNamespace::CardMapping)
    }

    /// Evictable namespaces, in the order cleanup drains them.
    /// Search lists go first: they are the cheapest to rebuild.
    pub fn eviction_order() -> [StorageNamespace; 2] {
        [StorageNamespace::CatalogSearch, StorageNamespace::CatalogCard]
    }
}

impl fmt::Display for StorageNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully qualified key in the key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageKey {
    CardMapping { external_id: String },
    CatalogCard { external_id: String },
    CatalogSearch { query: String },
}

impl StorageKey {
    pub fn card_mapping(external_id: impl Into<String>) -> Self {
        StorageKey::CardMapping {
            external_id: external_id.into(),
        }
    }

    pub fn catalog_card(external_id: impl Into<String>) -> Self {
        StorageKey::CatalogCard {
            external_id: external_id.into(),
        }
    }

    pub fn catalog_search(query: impl Into<String>) -> Self {
        StorageKey::CatalogSearch {
            query: query.into(),
        }
    }

    pub fn namespace(&self) -> StorageNamespace {
        match self {
            StorageKey::CardMapping { .. } => StorageNamespace::CardMapping,
            StorageKey::CatalogCard { .. } => StorageNamespace::CatalogCard,
            StorageKey::CatalogSearch { .. } => StorageNamespace::CatalogSearch,
        }
    }

    /// The key within its namespace.
    pub fn item_key(&self) -> &str {
        match self {
            StorageKey::CardMapping { external_id } | StorageKey::CatalogCard { external_id } => {
                external_id
            }
            StorageKey::CatalogSearch { query } => query,
        }
    }

    /// Quota footprint of this key holding `value`.
    pub fn footprint(&self, value: &str) -> u64 {
        (self.to_string().len() + value.len()) as u64
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace(), self.item_key())
    }
}
