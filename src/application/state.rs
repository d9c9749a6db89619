// src/application/state.rs
//
// Composition root.
//
// Builds every repository and service once at startup and hands them out
// Arc-wrapped. The admin binary and the tests go through this one place.
//
// RULES:
// - The dataset store and the key-value store share one StorageQuota
// - One EventBus per process
// - Schema initialization happens before any repository is built

use std::sync::Arc;

use crate::app::AppConfig;
use crate::db::{create_connection_pool, get_connection, initialize_database, ConnectionPool};
use crate::error::AppResult;
use crate::events::{DatasetCleared, EventBus, MappingCacheCleared};
use crate::infrastructure::{
    KeyValueStore, SqliteKeyValueStore, StorageJanitor, StorageQuota, StorageUsage,
};
use crate::integrations::{BulkDatasetProvider, CatalogService, HttpBulkDatasetProvider};
use crate::repositories::{
    BulkDatasetStore, KeyValueMappingCache, MappingCache, SqliteBulkDatasetStore,
};
use crate::services::{CatalogCacheService, DatasetAcquisitionService, ReconciliationService};

/// Application state shared by every command.
/// All fields are Arc-wrapped for thread-safe sharing.
pub struct AppState {
    pub config: AppConfig,
    pub pool: Arc<ConnectionPool>,
    pub event_bus: Arc<EventBus>,
    pub kv_store: Arc<dyn KeyValueStore>,
    pub dataset: Arc<dyn BulkDatasetStore>,
    pub mappings: Arc<dyn MappingCache>,
    pub janitor: Arc<StorageJanitor>,
    pub reconciliation_service: Arc<ReconciliationService>,
    pub acquisition_service: Arc<DatasetAcquisitionService>,
}

impl AppState {
    /// Open the database under `config.data_dir` and wire the HTTP provider.
    pub fn initialize(config: &AppConfig) -> AppResult<Self> {
        let pool = Arc::new(create_connection_pool(&config.data_dir)?);
        let provider: Arc<dyn BulkDatasetProvider> =
            Arc::new(HttpBulkDatasetProvider::new(config.dataset_url.clone())?);

        Self::assemble(config, pool, provider)
    }

    /// Wire everything over an existing pool and dataset provider.
    pub fn assemble(
        config: &AppConfig,
        pool: Arc<ConnectionPool>,
        provider: Arc<dyn BulkDatasetProvider>,
    ) -> AppResult<Self> {
        // 1. SCHEMA (idempotent)
        {
            let conn = get_connection(&pool)?;
            initialize_database(&conn)?;
        }

        // 2. INFRASTRUCTURE
        let event_bus = Arc::new(EventBus::new());
        let quota = StorageQuota::new(config.quota_bytes);
        let kv_store: Arc<dyn KeyValueStore> =
            Arc::new(SqliteKeyValueStore::new(pool.clone(), quota));
        let janitor = Arc::new(StorageJanitor::new(kv_store.clone(), event_bus.clone()));

        // 3. REPOSITORIES
        let dataset: Arc<dyn BulkDatasetStore> =
            Arc::new(SqliteBulkDatasetStore::new(pool.clone(), quota));
        let mappings: Arc<dyn MappingCache> =
            Arc::new(KeyValueMappingCache::new(kv_store.clone()));

        // 4. SERVICES
        let reconciliation_service = Arc::new(
            ReconciliationService::new(dataset.clone(), mappings.clone(), event_bus.clone())
                .with_rules(config.rules.clone()),
        );
        let acquisition_service = Arc::new(
            DatasetAcquisitionService::new(
                dataset.clone(),
                provider,
                janitor.clone(),
                event_bus.clone(),
            )
            .with_freshness_window(config.freshness_window()),
        );

        log::info!("Application state ready (data dir {})", config.data_dir.display());

        Ok(Self {
            config: config.clone(),
            pool,
            event_bus,
            kv_store,
            dataset,
            mappings,
            janitor,
            reconciliation_service,
            acquisition_service,
        })
    }

    /// Put the response cache in front of a live catalog.
    pub fn catalog_cache(&self, catalog: Arc<dyn CatalogService>) -> CatalogCacheService {
        CatalogCacheService::new(catalog, self.kv_store.clone()).with_ttl(self.config.catalog_ttl())
    }

    /// Bytes held by the dataset and by the key-value store
    pub fn storage_usage(&self) -> AppResult<StorageUsage> {
        let conn = get_connection(&self.pool)?;
        StorageQuota::usage(&conn)
    }

    pub fn clear_mappings(&self) -> AppResult<usize> {
        let removed = self.mappings.clear()?;
        log::info!("Cleared {} card mappings", removed);
        self.event_bus.emit(MappingCacheCleared::new(removed));
        Ok(removed)
    }

    pub fn clear_dataset(&self) -> AppResult<()> {
        self.dataset.clear()?;
        log::info!("Bulk dataset cleared");
        self.event_bus.emit(DatasetCleared::new());
        Ok(())
    }
}
