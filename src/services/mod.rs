// src/services/mod.rs
//
// Services Module - Orchestration Layer

pub mod acquisition_service;
pub mod acquisition_types;
pub mod catalog_cache_service;
pub mod reconciliation_service;

#[cfg(test)]
mod acquisition_service_tests;
#[cfg(test)]
mod reconciliation_service_tests;

pub use acquisition_service::{DatasetAcquisitionService, DEFAULT_FRESHNESS_DAYS};

pub use acquisition_types::{AcquisitionOutcome, AcquisitionState, DatasetStatus};

pub use catalog_cache_service::{CatalogCacheService, DEFAULT_CATALOG_TTL_HOURS};

pub use reconciliation_service::{
    ReconciliationOutcome,
    ReconciliationRules,
    ReconciliationService,
};
