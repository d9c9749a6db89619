// src/domain/card/invariants.rs
//
// Validation at the boundaries where card records enter the system.

use super::entity::{ExternalCardRecord, ReferencePrinting};
use crate::domain::{DomainError, DomainResult};

/// Validates an incoming catalog record before reconciliation
pub fn validate_external_card(card: &ExternalCardRecord) -> DomainResult<()> {
    if card.external_id.trim().is_empty() {
        return Err(DomainError::InvariantViolation(
            "External card id cannot be empty".to_string(),
        ));
    }

    if card.name.trim().is_empty() {
        return Err(DomainError::InvariantViolation(
            "External card name cannot be empty".to_string(),
        ));
    }

    if let Some(price) = card.price_usd {
        if !price.is_finite() || price < 0.0 {
            return Err(DomainError::InvariantViolation(format!(
                "External card price must be a non-negative number, got {}",
                price
            )));
        }
    }

    Ok(())
}

/// Validates a printing decoded from the bulk dataset
pub fn validate_printing(printing: &ReferencePrinting) -> DomainResult<()> {
    if printing.reference_id.trim().is_empty() {
        return Err(DomainError::InvariantViolation(
            "Reference id cannot be empty".to_string(),
        ));
    }

    if printing.name.trim().is_empty() {
        return Err(DomainError::InvariantViolation(format!(
            "Printing {} has an empty name",
            printing.reference_id
        )));
    }

    if printing.set_code.trim().is_empty() {
        return Err(DomainError::InvariantViolation(format!(
            "Printing {} has no set code",
            printing.reference_id
        )));
    }

    if let Some(point) = printing.prices.iter().find(|p| !p.price.is_finite()) {
        return Err(DomainError::InvariantViolation(format!(
            "Printing {} has a non-finite price on {}",
            printing.reference_id, point.date
        )));
    }

    Ok(())
}
