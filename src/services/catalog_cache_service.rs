// src/services/catalog_cache_service.rs
//
// Catalog Cache Service
//
// Read-through cache in front of the live catalog. Card records and search
// results land in the evictable namespaces, so the janitor may drop them
// whenever the dataset needs room.
//
// RULES:
// - Entries older than the TTL are refetched
// - Cache reads and writes are best-effort; the live answer always wins
// - Misses from the catalog are not cached

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::domain::{validate_external_card, ExternalCardRecord};
use crate::error::AppResult;
use crate::infrastructure::{KeyValueStore, StorageKey, StorageNamespace};
use crate::integrations::CatalogService;

pub const DEFAULT_CATALOG_TTL_HOURS: i64 = 24;

pub struct CatalogCacheService {
    catalog: Arc<dyn CatalogService>,
    kv_store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl CatalogCacheService {
    pub fn new(catalog: Arc<dyn CatalogService>, kv_store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            catalog,
            kv_store,
            ttl: Duration::hours(DEFAULT_CATALOG_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Drop the cached record of one card
    pub fn invalidate(&self, external_id: &str) -> AppResult<bool> {
        self.kv_store.remove(&StorageKey::catalog_card(external_id))
    }

    /// Drop every cached card and search result
    pub fn clear(&self) -> AppResult<usize> {
        let cards = self.kv_store.clear_namespace(StorageNamespace::CatalogCard)?;
        let searches = self.kv_store.clear_namespace(StorageNamespace::CatalogSearch)?;
        Ok(cards + searches)
    }

    fn search_key(query: &str) -> StorageKey {
        StorageKey::catalog_search(query.trim().to_lowercase())
    }

    fn read_fresh<T: DeserializeOwned>(&self, key: &StorageKey) -> Option<T> {
        let entry = match self.kv_store.get_entry(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Catalog cache read failed for {}: {}", key, e);
                return None;
            }
        };

        if Utc::now() - entry.updated_at > self.ttl {
            log::debug!("Catalog cache entry {} expired", key);
            return None;
        }

        match serde_json::from_str(&entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Ignoring unreadable catalog cache entry {}: {}", key, e);
                None
            }
        }
    }

    fn write_best_effort<T: Serialize + ?Sized>(&self, key: &StorageKey, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(Into::into)
            .and_then(|json| self.kv_store.set(key, &json));

        if let Err(e) = result {
            log::warn!("Catalog cache write skipped for {}: {}", key, e);
        }
    }
}

#[async_trait]
impl CatalogService for CatalogCacheService {
    async fn get_card(&self, external_id: &str) -> AppResult<Option<ExternalCardRecord>> {
        let key = StorageKey::catalog_card(external_id);

        if let Some(card) = self.read_fresh::<ExternalCardRecord>(&key) {
            return Ok(Some(card));
        }

        let card = self.catalog.get_card(external_id).await?;

        if let Some(card) = &card {
            match validate_external_card(card) {
                Ok(()) => self.write_best_effort(&key, card),
                Err(e) => log::warn!("Not caching catalog card {}: {}", external_id, e),
            }
        }

        Ok(card)
    }

    async fn search_cards(&self, query: &str) -> AppResult<Vec<ExternalCardRecord>> {
        let key = Self::search_key(query);

        if let Some(cards) = self.read_fresh::<Vec<ExternalCardRecord>>(&key) {
            return Ok(cards);
        }

        let cards = self.catalog.search_cards(query).await?;
        self.write_best_effort(&key, &cards);

        Ok(cards)
    }
}
