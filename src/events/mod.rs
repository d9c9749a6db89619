// src/events/mod.rs
//
// Internal event system: public API

pub mod acquisition_events;
pub mod bus;
pub mod reconciliation_events;
pub mod types;

pub use types::DomainEvent;

pub use types::{DatasetCleared, DatasetIngested, MappingCacheCleared, StorageCleanedUp};

pub use acquisition_events::{AcquisitionProgressed, AcquisitionStage};

pub use reconciliation_events::{
    CardReconciled, ReconciliationBatchCompleted, ReconciliationMissed,
};

pub use bus::{EventBus, EventLogEntry};

/// Initialize a new event bus
pub fn create_event_bus() -> EventBus {
    EventBus::new()
}
