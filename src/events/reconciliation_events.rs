// src/events/reconciliation_events.rs
//
// Outputs of card reconciliation.
//
// INVARIANTS:
// - CardReconciled is emitted once per successful resolution, cache hits included
// - ReconciliationMissed carries the reason as text; it is never an error
// - ReconciliationBatchCompleted is emitted once per batch, after all items

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{MatchMethod, ReferenceId};
use crate::events::DomainEvent;

// ============================================================================
// CARD RECONCILED
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardReconciled {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub external_id: String,
    pub reference_id: ReferenceId,
    pub method: MatchMethod,
    pub confidence: f64,
    /// True when answered from the mapping cache
    pub from_cache: bool,
}

impl CardReconciled {
    pub fn new(
        external_id: String,
        reference_id: ReferenceId,
        method: MatchMethod,
        confidence: f64,
        from_cache: bool,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            external_id,
            reference_id,
            method,
            confidence,
            from_cache,
        }
    }
}

impl DomainEvent for CardReconciled {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "CardReconciled" }
}

// ============================================================================
// RECONCILIATION MISSED
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationMissed {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub external_id: String,
    pub name: String,
    pub set_code: String,
    pub reason: String,
}

impl ReconciliationMissed {
    pub fn new(external_id: String, name: String, set_code: String, reason: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            external_id,
            name,
            set_code,
            reason: reason.into(),
        }
    }
}

impl DomainEvent for ReconciliationMissed {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "ReconciliationMissed" }
}

// ============================================================================
// BATCH COMPLETED
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationBatchCompleted {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub duration_ms: u64,
}

impl ReconciliationBatchCompleted {
    pub fn new(total: usize, resolved: usize, duration_ms: u64) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            total,
            resolved,
            unresolved: total.saturating_sub(resolved),
            duration_ms,
        }
    }
}

impl DomainEvent for ReconciliationBatchCompleted {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "ReconciliationBatchCompleted" }
}
