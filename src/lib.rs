// src/lib.rs
// CardVault - Local-first card portfolio core
//
// Architecture:
// - Domain-centric: card identity, mappings and dataset metadata live in domain/
// - Event-driven: services report progress and outcomes through the EventBus
// - Explicit: no background work; callers decide when to download
// - Local-first: one SQLite file holds the bulk dataset and every cache
// - Bounded: the dataset and the key-value store share one storage quota

// ============================================================================
// FOUNDATION
// ============================================================================

pub mod db;
pub mod domain;
pub mod error;
pub mod events;
pub mod infrastructure;
pub mod repositories;
pub mod services;

// ============================================================================
// APPLICATION LAYER
// ============================================================================

pub mod app;
pub mod application;
pub mod integrations;

#[cfg(test)]
mod test_support;

// ============================================================================
// PUBLIC API - Domain
// ============================================================================

pub use domain::{
    normalize_name, similarity, validate_external_card, validate_mapping, validate_printing,
    CardMapping, DatasetBlob, DatasetMetadata, DomainError, EditDistance, ExternalCardRecord,
    IngestReport, MappingStats, MatchConfidence, MatchMethod, PricePoint, ReferenceId,
    ReferencePrinting, ReferenceSet,
};

// ============================================================================
// PUBLIC API - Errors
// ============================================================================

pub use error::{AppError, AppResult};

// ============================================================================
// PUBLIC API - Events
// ============================================================================

pub use events::{
    create_event_bus, AcquisitionProgressed, AcquisitionStage, CardReconciled, DatasetCleared,
    DatasetIngested, DomainEvent, EventBus, EventLogEntry, MappingCacheCleared,
    ReconciliationBatchCompleted, ReconciliationMissed, StorageCleanedUp,
};

// ============================================================================
// PUBLIC API - Database
// ============================================================================

pub use db::{create_connection_pool, initialize_database, ConnectionPool};

// ============================================================================
// PUBLIC API - Storage
// ============================================================================

pub use infrastructure::{
    CancellationSignal, KeyValueStore, SqliteKeyValueStore, StorageJanitor, StorageKey,
    StorageNamespace, StorageQuota,
};

pub use repositories::{BulkDatasetStore, KeyValueMappingCache, MappingCache, SqliteBulkDatasetStore};

// ============================================================================
// PUBLIC API - Services
// ============================================================================

pub use services::{
    AcquisitionOutcome, AcquisitionState, CatalogCacheService, DatasetAcquisitionService,
    DatasetStatus, ReconciliationOutcome, ReconciliationRules, ReconciliationService,
};

// ============================================================================
// PUBLIC API - Application & Integrations
// ============================================================================

pub use app::AppConfig;
pub use application::{AppState, ErrorResponse, ErrorType};
pub use integrations::{BulkDatasetProvider, CatalogService, HttpBulkDatasetProvider};
