// src/services/reconciliation_service.rs
//
// Reconciliation Service
//
// Resolves a catalog card to a printing of the bulk dataset.
//
// CASCADE (first success wins, nothing below a success runs):
// 1. Mapping cache hit         stored confidence and method
// 2. Direct id hint            1.0,   direct
// 3. Name + set exact          0.95,  name-and-set
// 4. Collector number          0.9,   collector-number (name corroborated)
// 5. Fuzzy name                similarity x 0.8, fuzzy-name
//
// RULES:
// - A miss is an expected outcome; it is logged, never returned as an error
// - A failing strategy declines and the cascade moves on
// - Every match is written to the mapping cache before returning
// - A failed cache write does not fail the resolution
// - Cached mappings are trusted as-is, even after a dataset refresh

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::domain::{
    normalize_name, similarity, CardMapping, EditDistance, ExternalCardRecord, MatchConfidence,
    MatchMethod, PricePoint, ReferenceId, ReferencePrinting,
};
use crate::error::{AppError, AppResult};
use crate::events::{CardReconciled, EventBus, ReconciliationBatchCompleted, ReconciliationMissed};
use crate::repositories::{BulkDatasetStore, MappingCache};

// ============================================================================
// RULES
// ============================================================================

/// Tunables of the cascade.
///
/// The thresholds are empirical; keep them configurable.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationRules {
    pub direct_confidence: f64,
    pub name_and_set_confidence: f64,
    pub collector_number_confidence: f64,

    /// Name similarity a collector-number candidate must exceed
    pub collector_name_threshold: f64,

    /// Similarity the best fuzzy candidate must exceed
    pub fuzzy_threshold: f64,

    /// Fuzzy confidence = similarity x discount
    pub fuzzy_discount: f64,

    /// Upper bound on fuzzy candidates compared per resolution
    pub fuzzy_candidate_cap: usize,

    pub edit_distance: EditDistance,
}

impl Default for ReconciliationRules {
    fn default() -> Self {
        Self {
            direct_confidence: 1.0,
            name_and_set_confidence: 0.95,
            collector_number_confidence: 0.9,
            collector_name_threshold: 0.8,
            fuzzy_threshold: 0.9,
            fuzzy_discount: 0.8,
            fuzzy_candidate_cap: 20,
            edit_distance: EditDistance::default(),
        }
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationOutcome {
    /// Answered from the mapping cache
    CacheHit(CardMapping),

    /// Answered by a strategy; the mapping has been cached
    Matched(CardMapping),

    /// Every strategy declined
    NotFound,

    /// No dataset stored and nothing cached
    DatasetUnavailable,
}

impl ReconciliationOutcome {
    pub fn mapping(&self) -> Option<&CardMapping> {
        match self {
            Self::CacheHit(mapping) | Self::Matched(mapping) => Some(mapping),
            Self::NotFound | Self::DatasetUnavailable => None,
        }
    }

    pub fn reference_id(&self) -> Option<&str> {
        self.mapping().map(|mapping| mapping.reference_id.as_str())
    }

    pub fn is_resolved(&self) -> bool {
        self.mapping().is_some()
    }
}

/// A strategy's pick
struct Candidate {
    printing: ReferencePrinting,
    method: MatchMethod,
    confidence: f64,
}

// ============================================================================
// RECONCILIATION SERVICE
// ============================================================================

pub struct ReconciliationService {
    dataset: Arc<dyn BulkDatasetStore>,
    mappings: Arc<dyn MappingCache>,
    event_bus: Arc<EventBus>,
    rules: ReconciliationRules,
}

impl ReconciliationService {
    pub fn new(
        dataset: Arc<dyn BulkDatasetStore>,
        mappings: Arc<dyn MappingCache>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            dataset,
            mappings,
            event_bus,
            rules: ReconciliationRules::default(),
        }
    }

    pub fn with_rules(mut self, rules: ReconciliationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &ReconciliationRules {
        &self.rules
    }

    /// Resolve one card to a reference id, `None` when nothing matches.
    pub fn resolve(&self, external: &ExternalCardRecord) -> Option<ReferenceId> {
        self.resolve_detailed(external)
            .reference_id()
            .map(str::to_string)
    }

    /// Resolve one card and report how.
    pub fn resolve_detailed(&self, external: &ExternalCardRecord) -> ReconciliationOutcome {
        if external.external_id.trim().is_empty() {
            self.report_miss(external, "record has no external id");
            return ReconciliationOutcome::NotFound;
        }

        if let Some(mapping) = self.cached_mapping(&external.external_id) {
            log::debug!(
                "Cache hit for {} -> {} ({})",
                mapping.external_id,
                mapping.reference_id,
                mapping.match_method
            );
            self.event_bus.emit(CardReconciled::new(
                mapping.external_id.clone(),
                mapping.reference_id.clone(),
                mapping.match_method,
                mapping.confidence.score(),
                true,
            ));
            return ReconciliationOutcome::CacheHit(mapping);
        }

        match self.dataset.is_available() {
            Ok(true) => {}
            Ok(false) => {
                self.report_miss(external, "no dataset stored");
                return ReconciliationOutcome::DatasetUnavailable;
            }
            Err(e) => {
                log::warn!("Dataset availability check failed: {}", e);
                self.report_miss(external, "dataset unreadable");
                return ReconciliationOutcome::DatasetUnavailable;
            }
        }

        let Some(candidate) = self.run_cascade(external) else {
            self.report_miss(external, "no strategy matched");
            return ReconciliationOutcome::NotFound;
        };

        let mapping = CardMapping::new(
            external.external_id.as_str(),
            candidate.printing.reference_id.as_str(),
            MatchConfidence::new(candidate.confidence),
            candidate.method,
        );

        if let Err(e) = self.mappings.put(&mapping) {
            log::warn!(
                "Could not cache mapping {} -> {}: {}",
                mapping.external_id,
                mapping.reference_id,
                e
            );
        }

        log::debug!(
            "Resolved {} -> {} via {} ({})",
            mapping.external_id,
            mapping.reference_id,
            mapping.match_method,
            mapping.confidence
        );
        self.event_bus.emit(CardReconciled::new(
            mapping.external_id.clone(),
            mapping.reference_id.clone(),
            mapping.match_method,
            mapping.confidence.score(),
            false,
        ));

        ReconciliationOutcome::Matched(mapping)
    }

    /// Resolve many cards, keeping only the successes.
    pub fn resolve_batch(&self, externals: &[ExternalCardRecord]) -> HashMap<String, ReferenceId> {
        let start_time = Instant::now();
        let mut resolved = HashMap::with_capacity(externals.len());

        for external in externals {
            if let Some(reference_id) = self.resolve(external) {
                resolved.insert(external.external_id.clone(), reference_id);
            }
        }

        let duration_ms = start_time.elapsed().as_millis() as u64;
        log::info!(
            "Reconciled {}/{} cards in {} ms",
            resolved.len(),
            externals.len(),
            duration_ms
        );
        self.event_bus.emit(ReconciliationBatchCompleted::new(
            externals.len(),
            resolved.len(),
            duration_ms,
        ));

        resolved
    }

    /// Pin a catalog card to a printing chosen by the user.
    ///
    /// Overwrites any existing mapping for `external_id`.
    pub fn link_manually(&self, external_id: &str, reference_id: &str) -> AppResult<CardMapping> {
        if external_id.trim().is_empty() {
            return Err(AppError::Other("External id cannot be empty".to_string()));
        }

        let printing = self
            .dataset
            .lookup_by_reference_id(reference_id)?
            .ok_or(AppError::NotFound)?;

        let mapping = CardMapping::new(
            external_id,
            printing.reference_id,
            MatchConfidence::certain(),
            MatchMethod::Manual,
        );
        self.mappings.put(&mapping)?;

        log::info!("Linked {} -> {} manually", mapping.external_id, mapping.reference_id);
        self.event_bus.emit(CardReconciled::new(
            mapping.external_id.clone(),
            mapping.reference_id.clone(),
            MatchMethod::Manual,
            mapping.confidence.score(),
            false,
        ));

        Ok(mapping)
    }

    /// Price series of the printing `external` resolves to.
    ///
    /// `None` when the card does not resolve.
    pub fn price_history_for(
        &self,
        external: &ExternalCardRecord,
    ) -> AppResult<Option<Vec<PricePoint>>> {
        match self.resolve(external) {
            Some(reference_id) => Ok(Some(self.dataset.price_history(&reference_id)?)),
            None => Ok(None),
        }
    }

    // ========================================================================
    // CASCADE
    // ========================================================================

    fn cached_mapping(&self, external_id: &str) -> Option<CardMapping> {
        match self.mappings.get(external_id) {
            Ok(mapping) => mapping,
            Err(e) => {
                log::warn!("Mapping cache read failed for {}: {}", external_id, e);
                None
            }
        }
    }

    fn run_cascade(&self, external: &ExternalCardRecord) -> Option<Candidate> {
        let normalized = normalize_name(&external.name);

        self.attempt("direct", external, || self.match_direct(external))
            .or_else(|| {
                self.attempt("name-and-set", external, || {
                    self.match_name_and_set(external, &normalized)
                })
            })
            .or_else(|| {
                self.attempt("collector-number", external, || {
                    self.match_collector_number(external, &normalized)
                })
            })
            .or_else(|| {
                self.attempt("fuzzy-name", external, || self.match_fuzzy_name(&normalized))
            })
    }

    /// Run one strategy; an error counts as a decline.
    fn attempt(
        &self,
        strategy: &str,
        external: &ExternalCardRecord,
        run: impl FnOnce() -> AppResult<Option<Candidate>>,
    ) -> Option<Candidate> {
        match run() {
            Ok(candidate) => candidate,
            Err(e) => {
                log::warn!(
                    "Strategy {} declined for {} after error: {}",
                    strategy,
                    external.external_id,
                    e
                );
                None
            }
        }
    }

    fn match_direct(&self, external: &ExternalCardRecord) -> AppResult<Option<Candidate>> {
        let printing = self
            .dataset
            .lookup_by_external_id_hint(&external.external_id)?;

        Ok(printing.map(|printing| Candidate {
            printing,
            method: MatchMethod::Direct,
            confidence: self.rules.direct_confidence,
        }))
    }

    fn match_name_and_set(
        &self,
        external: &ExternalCardRecord,
        normalized: &str,
    ) -> AppResult<Option<Candidate>> {
        if normalized.is_empty() || external.set_code.trim().is_empty() {
            return Ok(None);
        }

        let printing = self
            .dataset
            .find_by_name_in_set(normalized, &external.set_code)?
            .into_iter()
            .next();

        Ok(printing.map(|printing| Candidate {
            printing,
            method: MatchMethod::NameAndSet,
            confidence: self.rules.name_and_set_confidence,
        }))
    }

    fn match_collector_number(
        &self,
        external: &ExternalCardRecord,
        normalized: &str,
    ) -> AppResult<Option<Candidate>> {
        if external.collector_number.trim().is_empty() || external.set_code.trim().is_empty() {
            return Ok(None);
        }

        let candidates = self
            .dataset
            .find_by_collector_number(&external.set_code, &external.collector_number)?;

        let best = self.best_by_similarity(normalized, candidates);

        Ok(best
            .filter(|(_, score)| *score > self.rules.collector_name_threshold)
            .map(|(printing, _)| Candidate {
                printing,
                method: MatchMethod::CollectorNumber,
                confidence: self.rules.collector_number_confidence,
            }))
    }

    fn match_fuzzy_name(&self, normalized: &str) -> AppResult<Option<Candidate>> {
        if normalized.is_empty() {
            return Ok(None);
        }

        let candidates = self.fuzzy_candidates(normalized)?;
        let best = self.best_by_similarity(normalized, candidates);

        Ok(best
            .filter(|(_, score)| *score > self.rules.fuzzy_threshold)
            .map(|(printing, score)| Candidate {
                printing,
                method: MatchMethod::FuzzyName,
                confidence: score * self.rules.fuzzy_discount,
            }))
    }

    /// Candidate pool for fuzzy matching, at most `fuzzy_candidate_cap`
    /// distinct names.
    ///
    /// Substring search on the whole name first, then on each word of a
    /// multi-word name, longest word first. Words under three characters
    /// are not searched on their own. Reprints share a name and a score, so
    /// only one printing per normalized name enters the pool.
    fn fuzzy_candidates(&self, normalized: &str) -> AppResult<Vec<ReferencePrinting>> {
        let cap = self.rules.fuzzy_candidate_cap;
        let mut pool: Vec<ReferencePrinting> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let mut queries: Vec<&str> = vec![normalized];
        if normalized.contains(' ') {
            let mut words: Vec<&str> = normalized
                .split(' ')
                .filter(|word| word.chars().count() >= 3)
                .collect();
            words.sort_by_key(|word| std::cmp::Reverse(word.chars().count()));

            let mut unique = HashSet::new();
            words.retain(|word| unique.insert(*word));
            queries.extend(words);
        }

        for query in queries {
            if pool.len() >= cap {
                break;
            }

            for printing in self.dataset.search_distinct_names(query, cap)? {
                if pool.len() >= cap {
                    break;
                }
                if seen.insert(normalize_name(&printing.name)) {
                    pool.push(printing);
                }
            }
        }

        Ok(pool)
    }

    /// Highest-similarity candidate; ties keep the earlier one.
    fn best_by_similarity(
        &self,
        normalized: &str,
        candidates: Vec<ReferencePrinting>,
    ) -> Option<(ReferencePrinting, f64)> {
        let mut best: Option<(ReferencePrinting, f64)> = None;

        for printing in candidates {
            let score = similarity(
                normalized,
                &normalize_name(&printing.name),
                self.rules.edit_distance,
            );
            if best.as_ref().map_or(true, |(_, top)| score > *top) {
                best = Some((printing, score));
            }
        }

        best
    }

    fn report_miss(&self, external: &ExternalCardRecord, reason: &str) {
        log::info!(
            "No reference printing for {} ({} / {}): {}",
            external.external_id,
            external.name,
            external.set_code,
            reason
        );
        self.event_bus.emit(ReconciliationMissed::new(
            external.external_id.clone(),
            external.name.clone(),
            external.set_code.clone(),
            reason,
        ));
    }
}
