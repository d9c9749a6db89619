// src/domain/card/mod.rs

pub mod entity;
pub mod invariants;

pub use entity::{ExternalCardRecord, PricePoint, ReferenceId, ReferencePrinting, ReferenceSet};
pub use invariants::{validate_external_card, validate_printing};
