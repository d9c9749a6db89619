// src/events/types.rs
//
// Domain events for the dataset store, the key-value store and the mapping cache.
// Each event is an immutable fact that has already happened.
//
// RULES:
// - Events are facts, not commands
// - Events carry only the data a listener needs to react
// - No business logic in event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trait that all domain events implement
pub trait DomainEvent: std::fmt::Debug + Clone {
    /// Unique identifier for this event instance
    fn event_id(&self) -> Uuid;

    /// When this event occurred
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Human-readable event type name
    fn event_type(&self) -> &'static str;
}

// ============================================================================
// DATASET EVENTS
// ============================================================================

/// Emitted after a dataset has been committed to storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetIngested {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub version: String,
    pub total_printings: u64,
    pub total_sets: u64,
    pub size_bytes: u64,
}

impl DatasetIngested {
    pub fn new(version: String, total_printings: u64, total_sets: u64, size_bytes: u64) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            version,
            total_printings,
            total_sets,
            size_bytes,
        }
    }
}

impl DomainEvent for DatasetIngested {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "DatasetIngested" }
}

/// Emitted when the stored dataset is removed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetCleared {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl DatasetCleared {
    pub fn new() -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }
}

impl Default for DatasetCleared {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainEvent for DatasetCleared {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "DatasetCleared" }
}

// ============================================================================
// STORAGE EVENTS
// ============================================================================

/// Emitted after the janitor evicted cache entries to make room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageCleanedUp {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub bytes_requested: u64,
    pub bytes_freed: u64,
    pub entries_evicted: usize,
}

impl StorageCleanedUp {
    pub fn new(bytes_requested: u64, bytes_freed: u64, entries_evicted: usize) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            bytes_requested,
            bytes_freed,
            entries_evicted,
        }
    }
}

impl DomainEvent for StorageCleanedUp {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "StorageCleanedUp" }
}

/// Emitted when every persisted card mapping was dropped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingCacheCleared {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub removed: usize,
}

impl MappingCacheCleared {
    pub fn new(removed: usize) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            removed,
        }
    }
}

impl DomainEvent for MappingCacheCleared {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "MappingCacheCleared" }
}
