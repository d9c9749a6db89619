// src/domain/mapping/entity.rs
//
// Card Mapping Entity
//
// The persisted result of reconciling one catalog card to one printing.
//
// INVARIANTS:
// - At most one mapping per external id (last write wins)
// - Confidence lies in [0.0, 1.0]
// - Mappings are trusted until explicitly cleared; nothing re-validates them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{DomainError, DomainResult};

// ============================================================================
// MATCH METHOD
// ============================================================================

/// Which strategy produced a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMethod {
    /// The dataset carried the catalog id for the printing
    Direct,

    /// Normalized name equal within the same set
    NameAndSet,

    /// Same set and collector number, corroborated by name similarity
    CollectorNumber,

    /// Best fuzzy name match above the threshold
    FuzzyName,

    /// Linked by the user
    Manual,
}

impl MatchMethod {
    pub const ALL: [MatchMethod; 5] = [
        MatchMethod::Direct,
        MatchMethod::NameAndSet,
        MatchMethod::CollectorNumber,
        MatchMethod::FuzzyName,
        MatchMethod::Manual,
    ];
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchMethod::Direct => write!(f, "direct"),
            MatchMethod::NameAndSet => write!(f, "name-and-set"),
            MatchMethod::CollectorNumber => write!(f, "collector-number"),
            MatchMethod::FuzzyName => write!(f, "fuzzy-name"),
            MatchMethod::Manual => write!(f, "manual"),
        }
    }
}

// ============================================================================
// MATCH CONFIDENCE
// ============================================================================

/// How trustworthy a mapping is, from 0.0 to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchConfidence(f64);

impl MatchConfidence {
    /// Creates a confidence score, clamped to [0.0, 1.0]
    pub fn new(score: f64) -> Self {
        if score.is_nan() {
            return Self(0.0);
        }
        Self(score.clamp(0.0, 1.0))
    }

    pub fn certain() -> Self {
        Self(1.0)
    }

    pub fn score(&self) -> f64 {
        self.0
    }
}

impl PartialEq for MatchConfidence {
    fn eq(&self, other: &Self) -> bool {
        (self.0 - other.0).abs() < f64::EPSILON
    }
}

impl std::fmt::Display for MatchConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}%", self.0 * 100.0)
    }
}

// ============================================================================
// CARD MAPPING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMapping {
    pub external_id: String,
    pub reference_id: String,
    pub confidence: MatchConfidence,
    pub match_method: MatchMethod,
    pub last_updated: DateTime<Utc>,
}

impl CardMapping {
    /// Creates a mapping stamped with the current time
    pub fn new(
        external_id: impl Into<String>,
        reference_id: impl Into<String>,
        confidence: MatchConfidence,
        match_method: MatchMethod,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            reference_id: reference_id.into(),
            confidence,
            match_method,
            last_updated: Utc::now(),
        }
    }
}

/// Validates CardMapping invariants
pub fn validate_mapping(mapping: &CardMapping) -> DomainResult<()> {
    if mapping.external_id.trim().is_empty() {
        return Err(DomainError::InvariantViolation(
            "Mapping external id cannot be empty".to_string(),
        ));
    }

    if mapping.reference_id.trim().is_empty() {
        return Err(DomainError::InvariantViolation(
            "Mapping reference id cannot be empty".to_string(),
        ));
    }

    let score = mapping.confidence.score();
    if !(0.0..=1.0).contains(&score) {
        return Err(DomainError::InvariantViolation(format!(
            "Mapping confidence {} is outside [0, 1]",
            score
        )));
    }

    Ok(())
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Aggregate view over the mapping cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingStats {
    pub total_mappings: usize,
    pub count_by_method: BTreeMap<MatchMethod, usize>,
}

impl MappingStats {
    pub fn from_mappings<'a>(mappings: impl IntoIterator<Item = &'a CardMapping>) -> Self {
        let mut stats = Self::default();
        for mapping in mappings {
            stats.total_mappings += 1;
            *stats.count_by_method.entry(mapping.match_method).or_insert(0) += 1;
        }
        stats
    }

    pub fn count(&self, method: MatchMethod) -> usize {
        self.count_by_method.get(&method).copied().unwrap_or(0)
    }
}

// ============================================================================
// TESTS
// ============================================================================
