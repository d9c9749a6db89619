// src/services/reconciliation_service_tests.rs
//
// Reconciliation Service tests
//
// INVARIANTS TESTED:
// - Each strategy of the cascade matches with its own method and confidence
// - A higher strategy always wins over a lower one
// - Resolving twice hits the mapping cache and leaves the dataset untouched
// - A batch keeps the successes and never fails as a whole
// - Misses, missing datasets and cache write failures are not errors

#[cfg(test)]
mod cascade_tests {
    use std::sync::{Arc, Mutex};

    use serde_json::{json, Value};

    use crate::domain::{
        CardMapping, EditDistance, ExternalCardRecord, MatchConfidence, MatchMethod,
    };
    use crate::events::{CardReconciled, EventBus, ReconciliationBatchCompleted, ReconciliationMissed};
    use crate::infrastructure::{
        CancellationSignal, IngestProgress, KeyValueStore, SqliteKeyValueStore, StorageQuota,
    };
    use crate::repositories::{
        BulkDatasetStore, KeyValueMappingCache, MappingCache, SqliteBulkDatasetStore,
    };
    use crate::services::reconciliation_service::{
        ReconciliationOutcome, ReconciliationRules, ReconciliationService,
    };
    use crate::test_support::{parse_blob, sample_dataset, TestDb};

    struct Harness {
        _db: TestDb,
        cache: Arc<KeyValueMappingCache>,
        bus: Arc<EventBus>,
        service: ReconciliationService,
    }

    fn harness(dataset: Option<Value>) -> Harness {
        harness_with_quota(dataset, StorageQuota::unlimited())
    }

    fn harness_with_quota(dataset: Option<Value>, kv_quota: StorageQuota) -> Harness {
        let db = TestDb::new();
        let store = Arc::new(SqliteBulkDatasetStore::new(
            db.pool.clone(),
            StorageQuota::unlimited(),
        ));
        if let Some(dataset) = dataset {
            store
                .store_dataset(&parse_blob(&dataset), &CancellationSignal::new(), &IngestProgress::silent())
                .unwrap();
        }

        let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::new(db.pool.clone(), kv_quota));
        let cache = Arc::new(KeyValueMappingCache::new(kv));
        let bus = Arc::new(EventBus::new());
        let service = ReconciliationService::new(store, cache.clone(), bus.clone());

        Harness {
            _db: db,
            cache,
            bus,
            service,
        }
    }

    fn only_lightning_bolt() -> Value {
        json!({
            "meta": { "version": "1" },
            "data": {
                "LEA": { "name": "Limited Edition Alpha", "code": "LEA", "cards": [
                    { "uuid": "U1", "name": "Lightning Bolt", "setCode": "LEA", "number": "162" }
                ] }
            }
        })
    }

    // ------------------------------------------------------------------------
    // STRATEGIES
    // ------------------------------------------------------------------------

    #[test]
    fn test_direct_hint_match() {
        let h = harness(Some(sample_dataset("1")));
        let card = ExternalCardRecord::new("E1", "Lightning Bolt", "LEA", "162");

        let outcome = h.service.resolve_detailed(&card);

        let mapping = outcome.mapping().unwrap();
        assert!(matches!(outcome, ReconciliationOutcome::Matched(_)));
        assert_eq!(mapping.reference_id, "U1");
        assert_eq!(mapping.match_method, MatchMethod::Direct);
        assert_eq!(mapping.confidence.score(), 1.0);
    }

    #[test]
    fn test_name_and_set_match() {
        let h = harness(Some(sample_dataset("1")));
        let card = ExternalCardRecord::new("E2", "Lightning Bolt", "LEA", "");

        let outcome = h.service.resolve_detailed(&card);

        let mapping = outcome.mapping().unwrap();
        assert_eq!(mapping.reference_id, "U1");
        assert_eq!(mapping.match_method, MatchMethod::NameAndSet);
        assert_eq!(mapping.confidence.score(), 0.95);
    }

    #[test]
    fn test_name_and_set_respects_set() {
        let h = harness(Some(sample_dataset("1")));
        let card = ExternalCardRecord::new("E7", "lightning bolt!", "m10", "");

        assert_eq!(h.service.resolve(&card).as_deref(), Some("U3"));
    }

    #[test]
    fn test_name_and_set_composes_combining_marks() {
        let dataset = json!({
            "meta": { "version": "1" },
            "data": { "ALL": { "name": "Alliances", "cards": [
                { "uuid": "JG", "name": "J\u{00f6}tun Grunt", "setCode": "ALL", "number": "1" }
            ] } }
        });
        let h = harness(Some(dataset));
        let card = ExternalCardRecord::new("E8", "Jo\u{0308}tun Grunt", "ALL", "");

        let mapping = h.service.resolve_detailed(&card).mapping().cloned().unwrap();
        assert_eq!(mapping.reference_id, "JG");
        assert_eq!(mapping.match_method, MatchMethod::NameAndSet);
    }

    #[test]
    fn test_collector_number_match_with_corroborating_name() {
        let h = harness(Some(sample_dataset("1")));
        let card = ExternalCardRecord::new("E5", "Llanowar Elvs", "LEA", "12A");

        let mapping = h.service.resolve_detailed(&card).mapping().cloned().unwrap();
        assert_eq!(mapping.reference_id, "U4");
        assert_eq!(mapping.match_method, MatchMethod::CollectorNumber);
        assert_eq!(mapping.confidence.score(), 0.9);
    }

    #[test]
    fn test_collector_number_rejected_without_similar_name() {
        let h = harness(Some(sample_dataset("1")));
        let card = ExternalCardRecord::new("E6", "Giant Growth", "LEA", "162");

        assert_eq!(h.service.resolve_detailed(&card), ReconciliationOutcome::NotFound);
    }

    #[test]
    fn test_fuzzy_name_match_on_typo() {
        let h = harness(Some(only_lightning_bolt()));
        let card = ExternalCardRecord::new("E3", "Lightning Blot", "LEA", "");

        let mapping = h.service.resolve_detailed(&card).mapping().cloned().unwrap();
        assert_eq!(mapping.reference_id, "U1");
        assert_eq!(mapping.match_method, MatchMethod::FuzzyName);

        // One transposition over 14 code points
        let expected = (1.0 - 1.0 / 14.0) * 0.8;
        assert!((mapping.confidence.score() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_fuzzy_threshold_depends_on_metric() {
        let h = harness(Some(only_lightning_bolt()));
        let rules = ReconciliationRules {
            edit_distance: EditDistance::Levenshtein,
            ..ReconciliationRules::default()
        };
        let service = ReconciliationService::new(
            Arc::new(SqliteBulkDatasetStore::new(h._db.pool.clone(), StorageQuota::unlimited())),
            h.cache.clone(),
            h.bus.clone(),
        )
        .with_rules(rules);

        // Two substitutions: 12/14 is below the 0.9 threshold
        let card = ExternalCardRecord::new("E3", "Lightning Blot", "LEA", "");
        assert_eq!(service.resolve(&card), None);
    }

    #[test]
    fn test_fuzzy_pool_is_not_crowded_out_by_reprints() {
        let reprints: Vec<Value> = (1..=25)
            .map(|i| json!({ "uuid": format!("AXE-{:02}", i), "name": "Lightning Axe", "number": i.to_string() }))
            .collect();
        let dataset = json!({
            "meta": { "version": "1" },
            "data": {
                "AXE": { "name": "Axe Reprints", "code": "AXE", "cards": reprints },
                "LEA": { "name": "Limited Edition Alpha", "code": "LEA", "cards": [
                    { "uuid": "U1", "name": "Lightning Bolt", "number": "162" }
                ] }
            }
        });
        let h = harness(Some(dataset));
        let card = ExternalCardRecord::new("E3", "Lightning Blot", "LEA", "");

        let mapping = h.service.resolve_detailed(&card).mapping().cloned().unwrap();
        assert_eq!(mapping.reference_id, "U1");
        assert_eq!(mapping.match_method, MatchMethod::FuzzyName);
    }

    #[test]
    fn test_unmatched_name_returns_none() {
        let h = harness(Some(sample_dataset("1")));
        let card = ExternalCardRecord::new("E4", "Shock", "LEA", "");

        assert_eq!(h.service.resolve(&card), None);
        assert_eq!(h.cache.get("E4").unwrap(), None);
    }

    // ------------------------------------------------------------------------
    // PRIORITY AND CACHING
    // ------------------------------------------------------------------------

    #[test]
    fn test_direct_match_wins_over_fuzzy() {
        let h = harness(Some(sample_dataset("1")));
        // Name and set would only fuzzy-match; the hint is authoritative
        let card = ExternalCardRecord::new("E1", "Lightning Blot", "M10", "");

        let mapping = h.service.resolve_detailed(&card).mapping().cloned().unwrap();
        assert_eq!(mapping.reference_id, "U1");
        assert_eq!(mapping.match_method, MatchMethod::Direct);
    }

    #[test]
    fn test_match_is_cached_then_served_from_cache() {
        let h = harness(Some(sample_dataset("1")));
        let card = ExternalCardRecord::new("E2", "Lightning Bolt", "LEA", "");

        let first = h.service.resolve_detailed(&card);
        let second = h.service.resolve_detailed(&card);

        assert!(matches!(first, ReconciliationOutcome::Matched(_)));
        assert!(matches!(second, ReconciliationOutcome::CacheHit(_)));
        assert_eq!(first.reference_id(), second.reference_id());
        assert_eq!(h.cache.get("E2").unwrap().unwrap().match_method, MatchMethod::NameAndSet);
    }

    #[test]
    fn test_cached_mapping_is_trusted_without_dataset() {
        let h = harness(None);
        h.cache
            .put(&CardMapping::new("E1", "GONE", MatchConfidence::new(0.9), MatchMethod::CollectorNumber))
            .unwrap();

        let outcome = h.service.resolve_detailed(&ExternalCardRecord::new("E1", "x", "y", "z"));

        assert!(matches!(outcome, ReconciliationOutcome::CacheHit(_)));
        assert_eq!(outcome.reference_id(), Some("GONE"));
    }

    #[test]
    fn test_missing_dataset_is_reported_not_raised() {
        let h = harness(None);
        let card = ExternalCardRecord::new("E1", "Lightning Bolt", "LEA", "162");

        assert_eq!(h.service.resolve_detailed(&card), ReconciliationOutcome::DatasetUnavailable);
        assert_eq!(h.service.resolve(&card), None);
    }

    #[test]
    fn test_blank_external_id_is_not_found() {
        let h = harness(Some(sample_dataset("1")));
        let card = ExternalCardRecord::new("  ", "Lightning Bolt", "LEA", "162");

        assert_eq!(h.service.resolve_detailed(&card), ReconciliationOutcome::NotFound);
    }

    #[test]
    fn test_cache_write_failure_still_resolves() {
        // The stored dataset alone already exceeds this quota
        let h = harness_with_quota(Some(sample_dataset("1")), StorageQuota::new(10));
        let card = ExternalCardRecord::new("E1", "Lightning Bolt", "LEA", "162");

        assert_eq!(h.service.resolve(&card).as_deref(), Some("U1"));
        assert_eq!(h.cache.get("E1").unwrap(), None);
    }

    // ------------------------------------------------------------------------
    // BATCH, MANUAL LINKS, PRICES
    // ------------------------------------------------------------------------

    #[test]
    fn test_batch_keeps_only_successes() {
        let h = harness(Some(sample_dataset("1")));
        let completed = Arc::new(Mutex::new(Vec::new()));
        let sink = completed.clone();
        h.bus.subscribe::<ReconciliationBatchCompleted, _>(move |event| {
            sink.lock().unwrap().push((event.total, event.resolved, event.unresolved));
        });

        let cards = vec![
            ExternalCardRecord::new("E1", "Lightning Bolt", "LEA", "162"),
            ExternalCardRecord::new("E4", "Shock", "XXX", ""),
        ];
        let resolved = h.service.resolve_batch(&cards);

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.get("E1").map(String::as_str), Some("U1"));
        assert!(!resolved.contains_key("E4"));
        assert_eq!(*completed.lock().unwrap(), vec![(2, 1, 1)]);
    }

    #[test]
    fn test_events_for_hit_and_miss() {
        let h = harness(Some(sample_dataset("1")));
        let reconciled = Arc::new(Mutex::new(Vec::new()));
        let missed = Arc::new(Mutex::new(Vec::new()));

        let sink = reconciled.clone();
        h.bus.subscribe::<CardReconciled, _>(move |event| {
            sink.lock().unwrap().push((event.method, event.from_cache));
        });
        let sink = missed.clone();
        h.bus.subscribe::<ReconciliationMissed, _>(move |event| {
            sink.lock().unwrap().push(event.external_id.clone());
        });

        let bolt = ExternalCardRecord::new("E1", "Lightning Bolt", "LEA", "162");
        h.service.resolve(&bolt);
        h.service.resolve(&bolt);
        h.service.resolve(&ExternalCardRecord::new("E4", "Shock", "LEA", ""));

        assert_eq!(
            *reconciled.lock().unwrap(),
            vec![(MatchMethod::Direct, false), (MatchMethod::Direct, true)]
        );
        assert_eq!(*missed.lock().unwrap(), vec!["E4".to_string()]);
    }

    #[test]
    fn test_link_manually_overrides_mapping() {
        let h = harness(Some(sample_dataset("1")));
        let card = ExternalCardRecord::new("E2", "Lightning Bolt", "LEA", "");
        h.service.resolve(&card);

        let mapping = h.service.link_manually("E2", "U3").unwrap();

        assert_eq!(mapping.match_method, MatchMethod::Manual);
        assert_eq!(mapping.confidence, MatchConfidence::certain());
        assert_eq!(h.service.resolve(&card).as_deref(), Some("U3"));
    }

    #[test]
    fn test_link_manually_rejects_unknown_reference() {
        let h = harness(Some(sample_dataset("1")));

        assert!(h.service.link_manually("E2", "NOPE").is_err());
        assert_eq!(h.cache.get("E2").unwrap(), None);
    }

    #[test]
    fn test_price_history_for_resolved_card() {
        let h = harness(Some(sample_dataset("1")));

        let prices = h
            .service
            .price_history_for(&ExternalCardRecord::new("E1", "Lightning Bolt", "LEA", "162"))
            .unwrap()
            .unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[1].price, 420.0);

        let unresolved = h
            .service
            .price_history_for(&ExternalCardRecord::new("E4", "Shock", "LEA", ""))
            .unwrap();
        assert_eq!(unresolved, None);
    }
}

#[cfg(test)]
mod idempotency_tests {
    use std::sync::Arc;

    use crate::domain::{ExternalCardRecord, MatchMethod, ReferencePrinting};
    use crate::error::AppError;
    use crate::events::EventBus;
    use crate::infrastructure::{KeyValueStore, SqliteKeyValueStore, StorageQuota};
    use crate::repositories::{KeyValueMappingCache, MappingCache, MockBulkDatasetStore};
    use crate::services::reconciliation_service::ReconciliationService;
    use crate::test_support::TestDb;

    fn bolt() -> ReferencePrinting {
        ReferencePrinting {
            reference_id: "U1".to_string(),
            name: "Lightning Bolt".to_string(),
            set_code: "LEA".to_string(),
            collector_number: "162".to_string(),
            rarity: Some("common".to_string()),
            external_id_hint: Some("E1".to_string()),
            prices: Vec::new(),
        }
    }

    fn cache(db: &TestDb) -> Arc<KeyValueMappingCache> {
        let kv: Arc<dyn KeyValueStore> =
            Arc::new(SqliteKeyValueStore::new(db.pool.clone(), StorageQuota::unlimited()));
        Arc::new(KeyValueMappingCache::new(kv))
    }

    /// The second resolve must not reach the dataset at all.
    #[test]
    fn test_second_resolve_does_not_query_dataset() {
        let db = TestDb::new();
        let mut store = MockBulkDatasetStore::new();
        store.expect_is_available().times(1).returning(|| Ok(true));
        store
            .expect_lookup_by_external_id_hint()
            .withf(|id| id == "E1")
            .times(1)
            .returning(|_| Ok(Some(bolt())));

        let service = ReconciliationService::new(Arc::new(store), cache(&db), Arc::new(EventBus::new()));
        let card = ExternalCardRecord::new("E1", "Lightning Bolt", "LEA", "162");

        let first = service.resolve(&card);
        let second = service.resolve(&card);

        assert_eq!(first.as_deref(), Some("U1"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_direct_match_skips_lower_strategies() {
        let db = TestDb::new();
        let mut store = MockBulkDatasetStore::new();
        store.expect_is_available().returning(|| Ok(true));
        store
            .expect_lookup_by_external_id_hint()
            .returning(|_| Ok(Some(bolt())));
        store.expect_find_by_name_in_set().never();
        store.expect_find_by_collector_number().never();
        store.expect_search_distinct_names().never();

        let cache = cache(&db);
        let service = ReconciliationService::new(Arc::new(store), cache.clone(), Arc::new(EventBus::new()));

        service.resolve(&ExternalCardRecord::new("E1", "Lightning Bolt", "LEA", "162"));

        assert_eq!(cache.get("E1").unwrap().unwrap().match_method, MatchMethod::Direct);
    }

    #[test]
    fn test_failing_strategy_declines_and_cascade_continues() {
        let db = TestDb::new();
        let mut store = MockBulkDatasetStore::new();
        store.expect_is_available().returning(|| Ok(true));
        store
            .expect_lookup_by_external_id_hint()
            .returning(|_| Err(AppError::Other("index unreadable".to_string())));
        store
            .expect_find_by_name_in_set()
            .returning(|_, _| Ok(vec![bolt()]));

        let cache = cache(&db);
        let service = ReconciliationService::new(Arc::new(store), cache.clone(), Arc::new(EventBus::new()));

        let resolved = service.resolve(&ExternalCardRecord::new("E9", "Lightning Bolt", "LEA", ""));

        assert_eq!(resolved.as_deref(), Some("U1"));
        assert_eq!(cache.get("E9").unwrap().unwrap().match_method, MatchMethod::NameAndSet);
    }
}
