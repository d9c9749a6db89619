// src/domain/mod.rs
//
// Domain Root - The Single Source of Truth for Domain API
//
// All other modules import domain types from `crate::domain::*`.

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod card;
pub mod dataset;
pub mod mapping;
pub mod similarity;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Card Domain
pub use card::{
    validate_external_card, validate_printing, ExternalCardRecord, PricePoint, ReferenceId,
    ReferencePrinting, ReferenceSet,
};

// Mapping Domain
pub use mapping::{validate_mapping, CardMapping, MatchConfidence, MatchMethod, MappingStats};

// Dataset Domain
pub use dataset::{DatasetBlob, DatasetMetadata, IngestReport};

// Name matching
pub use similarity::{normalize_name, similarity, EditDistance};

// ============================================================================
// DOMAIN ERROR TYPES
// ============================================================================

use thiserror::Error;

/// Domain-level errors
/// These represent violations of business rules and invariants
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Entity not found: {0}")]
    NotFound(String),
}

/// Domain result type
pub type DomainResult<T> = Result<T, DomainError>;
