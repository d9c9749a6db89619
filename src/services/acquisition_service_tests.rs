// src/services/acquisition_service_tests.rs
//
// Dataset Acquisition Service tests
//
// INVARIANTS TESTED:
// - Absent -> Ready on a successful acquisition, with every progress stage
// - A fresh dataset is not downloaded again by ensure_dataset
// - Network, validation and quota failures keep the prior dataset
// - Cancellation returns to the prior state
// - Quota pressure triggers exactly one cleanup and one retry
// - Mapping entries survive cleanup

#[cfg(test)]
mod acquisition_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Duration;

    use crate::domain::{CardMapping, MatchConfidence, MatchMethod};
    use crate::error::{AppError, AppResult};
    use crate::events::{
        AcquisitionProgressed, AcquisitionStage, DatasetIngested, EventBus, StorageCleanedUp,
    };
    use crate::infrastructure::{
        CancellationSignal, IngestProgress, KeyValueStore, SqliteKeyValueStore, StorageJanitor,
        StorageKey, StorageQuota,
    };
    use crate::integrations::{BulkDatasetProvider, DownloadProgress};
    use crate::repositories::{
        BulkDatasetStore, KeyValueMappingCache, MappingCache, SqliteBulkDatasetStore,
    };
    use crate::services::acquisition_service::DatasetAcquisitionService;
    use crate::services::acquisition_types::{AcquisitionOutcome, AcquisitionState};
    use crate::test_support::{numbered_dataset, parse_blob, sample_dataset, to_bytes, TestDb};

    // ------------------------------------------------------------------------
    // FAKE PROVIDERS
    // ------------------------------------------------------------------------

    /// Serves queued responses in order, repeating the last one.
    struct FakeProvider {
        responses: Mutex<Vec<AppResult<Vec<u8>>>>,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn serving(bytes: Vec<u8>) -> Arc<Self> {
            Self::sequence(vec![Ok(bytes)])
        }

        fn sequence(responses: Vec<AppResult<Vec<u8>>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn clone_response(response: &AppResult<Vec<u8>>) -> AppResult<Vec<u8>> {
        match response {
            Ok(bytes) => Ok(bytes.clone()),
            Err(AppError::Network(reason)) => Err(AppError::Network(reason.clone())),
            Err(other) => Err(AppError::Other(other.to_string())),
        }
    }

    #[async_trait]
    impl BulkDatasetProvider for FakeProvider {
        fn source(&self) -> &str {
            "fake://dataset"
        }

        async fn fetch(
            &self,
            on_progress: &(dyn Fn(DownloadProgress) + Send + Sync),
        ) -> AppResult<Vec<u8>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let response = {
                let responses = self.responses.lock().unwrap();
                let index = call.min(responses.len() - 1);
                clone_response(&responses[index])
            };

            if let Ok(bytes) = &response {
                let total = Some(bytes.len() as u64);
                on_progress(DownloadProgress { bytes_received: 0, total_bytes: total });
                on_progress(DownloadProgress { bytes_received: bytes.len() as u64, total_bytes: total });
            }
            response
        }
    }

    /// Never finishes; only cancellation ends a fetch.
    struct StalledProvider;

    #[async_trait]
    impl BulkDatasetProvider for StalledProvider {
        fn source(&self) -> &str {
            "fake://stalled"
        }

        async fn fetch(
            &self,
            _on_progress: &(dyn Fn(DownloadProgress) + Send + Sync),
        ) -> AppResult<Vec<u8>> {
            std::future::pending::<()>().await;
            Ok(Vec::new())
        }
    }

    // ------------------------------------------------------------------------
    // HARNESS
    // ------------------------------------------------------------------------

    struct Harness {
        _db: TestDb,
        store: Arc<SqliteBulkDatasetStore>,
        kv: Arc<dyn KeyValueStore>,
        bus: Arc<EventBus>,
        stages: Arc<Mutex<Vec<AcquisitionStage>>>,
    }

    impl Harness {
        fn new(capacity: u64) -> Self {
            let db = TestDb::new();
            let quota = StorageQuota::new(capacity);
            let store = Arc::new(SqliteBulkDatasetStore::new(db.pool.clone(), quota));
            let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::new(db.pool.clone(), quota));
            let bus = Arc::new(EventBus::new());

            let stages = Arc::new(Mutex::new(Vec::new()));
            let sink = stages.clone();
            bus.subscribe::<AcquisitionProgressed, _>(move |event| {
                let mut stages = sink.lock().unwrap();
                if stages.last() != Some(&event.stage) {
                    stages.push(event.stage);
                }
            });

            Self {
                _db: db,
                store,
                kv,
                bus,
                stages,
            }
        }

        fn service(&self, provider: Arc<dyn BulkDatasetProvider>) -> DatasetAcquisitionService {
            let janitor = Arc::new(StorageJanitor::new(self.kv.clone(), self.bus.clone()));
            DatasetAcquisitionService::new(self.store.clone(), provider, janitor, self.bus.clone())
        }

        fn seed(&self, dataset: &serde_json::Value) {
            self.store
                .store_dataset(&parse_blob(dataset), &CancellationSignal::new(), &IngestProgress::silent())
                .unwrap();
            self.stages.lock().unwrap().clear();
        }

        fn stages(&self) -> Vec<AcquisitionStage> {
            self.stages.lock().unwrap().clone()
        }

        fn version(&self) -> Option<String> {
            self.store.get_stats().unwrap().map(|meta| meta.version)
        }
    }

    // ------------------------------------------------------------------------
    // HAPPY PATH
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_absent_dataset_is_acquired() {
        let h = Harness::new(u64::MAX);
        let provider = FakeProvider::serving(to_bytes(&sample_dataset("1.0")));
        let service = h.service(provider.clone());
        assert_eq!(service.state(), AcquisitionState::Absent);

        let ingested = Arc::new(AtomicUsize::new(0));
        let counter = ingested.clone();
        h.bus.subscribe::<DatasetIngested, _>(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = service.ensure_dataset(&CancellationSignal::new()).await.unwrap();

        assert!(matches!(outcome, AcquisitionOutcome::Ingested(_)));
        assert_eq!(outcome.metadata().version, "1.0");
        assert_eq!(service.state(), AcquisitionState::Ready);
        assert!(h.store.is_available().unwrap());
        assert_eq!(provider.calls(), 1);
        assert_eq!(ingested.load(Ordering::SeqCst), 1);
        assert_eq!(
            h.stages(),
            vec![
                AcquisitionStage::Checking,
                AcquisitionStage::Downloading,
                AcquisitionStage::Processing,
                AcquisitionStage::Complete,
            ]
        );
    }

    #[tokio::test]
    async fn test_ingestion_reports_progress_per_set() {
        let h = Harness::new(u64::MAX);
        let processing = Arc::new(Mutex::new(Vec::new()));
        let sink = processing.clone();
        h.bus.subscribe::<AcquisitionProgressed, _>(move |event| {
            if event.stage == AcquisitionStage::Processing {
                sink.lock().unwrap().push((event.percent, event.message.clone()));
            }
        });
        let service = h.service(FakeProvider::serving(to_bytes(&sample_dataset("1.0"))));

        service.ensure_dataset(&CancellationSignal::new()).await.unwrap();

        let processing = processing.lock().unwrap();
        assert!(processing.contains(&(50, "Stored 1 of 2 sets".to_string())));
        assert!(processing.contains(&(90, "Stored 2 of 2 sets".to_string())));
    }

    #[tokio::test]
    async fn test_fresh_dataset_is_not_downloaded() {
        let h = Harness::new(u64::MAX);
        h.seed(&sample_dataset("1.0"));
        let provider = FakeProvider::serving(to_bytes(&sample_dataset("2.0")));
        let service = h.service(provider.clone());
        assert_eq!(service.state(), AcquisitionState::Ready);

        let outcome = service.ensure_dataset(&CancellationSignal::new()).await.unwrap();

        assert!(matches!(outcome, AcquisitionOutcome::AlreadyFresh(_)));
        assert_eq!(provider.calls(), 0);
        assert_eq!(h.version().as_deref(), Some("1.0"));
        assert_eq!(h.stages(), vec![AcquisitionStage::Checking, AcquisitionStage::Complete]);
    }

    #[tokio::test]
    async fn test_stale_dataset_is_replaced() {
        let h = Harness::new(u64::MAX);
        h.seed(&sample_dataset("1.0"));
        let provider = FakeProvider::serving(to_bytes(&sample_dataset("2.0")));
        let service = h.service(provider.clone()).with_freshness_window(Duration::zero());
        std::thread::sleep(std::time::Duration::from_millis(5));

        assert!(service.check_status().unwrap().is_stale);
        service.ensure_dataset(&CancellationSignal::new()).await.unwrap();

        assert_eq!(provider.calls(), 1);
        assert_eq!(h.version().as_deref(), Some("2.0"));
    }

    #[tokio::test]
    async fn test_identical_download_is_not_reingested() {
        let h = Harness::new(u64::MAX);
        let bytes = to_bytes(&sample_dataset("1.0"));
        let service = h.service(FakeProvider::serving(bytes));

        service.refresh(&CancellationSignal::new()).await.unwrap();
        let first = h.store.get_stats().unwrap().unwrap();
        let outcome = service.refresh(&CancellationSignal::new()).await.unwrap();

        assert!(matches!(outcome, AcquisitionOutcome::Unchanged(_)));
        assert_eq!(h.store.get_stats().unwrap().unwrap(), first);
    }

    // ------------------------------------------------------------------------
    // FAILURES
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_network_failure_keeps_prior_dataset() {
        let h = Harness::new(u64::MAX);
        h.seed(&sample_dataset("1.0"));
        let provider = FakeProvider::sequence(vec![Err(AppError::Network("connection reset".into()))]);
        let service = h.service(provider);

        let err = service.refresh(&CancellationSignal::new()).await.unwrap_err();

        assert!(matches!(err, AppError::Network(_)));
        assert!(matches!(service.state(), AcquisitionState::Error(_)));
        assert_eq!(h.version().as_deref(), Some("1.0"));
        assert_eq!(h.stages().last(), Some(&AcquisitionStage::Error));
    }

    #[tokio::test]
    async fn test_retry_after_error_succeeds() {
        let h = Harness::new(u64::MAX);
        let provider = FakeProvider::sequence(vec![
            Err(AppError::Network("timeout".into())),
            Ok(to_bytes(&sample_dataset("1.0"))),
        ]);
        let service = h.service(provider.clone());

        assert!(service.ensure_dataset(&CancellationSignal::new()).await.is_err());
        assert!(matches!(service.state(), AcquisitionState::Error(_)));

        service.ensure_dataset(&CancellationSignal::new()).await.unwrap();
        assert_eq!(service.state(), AcquisitionState::Ready);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_malformed_download_keeps_prior_dataset() {
        let h = Harness::new(u64::MAX);
        h.seed(&sample_dataset("1.0"));
        let service = h.service(FakeProvider::serving(b"{\"data\": {}}".to_vec()));

        let err = service.refresh(&CancellationSignal::new()).await.unwrap_err();

        assert!(matches!(err, AppError::MalformedDataset(_)));
        assert!(matches!(service.state(), AcquisitionState::Error(_)));
        assert_eq!(h.version().as_deref(), Some("1.0"));
    }

    #[tokio::test]
    async fn test_cancelled_download_returns_to_prior_state() {
        let h = Harness::new(u64::MAX);
        h.seed(&sample_dataset("1.0"));
        let service = h.service(Arc::new(StalledProvider));
        let cancel = CancellationSignal::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = service.refresh(&cancel).await.unwrap_err();

        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(service.state(), AcquisitionState::Ready);
        assert_eq!(h.version().as_deref(), Some("1.0"));
    }

    #[tokio::test]
    async fn test_cancelled_before_ingest_leaves_store_absent() {
        let h = Harness::new(u64::MAX);
        let service = h.service(FakeProvider::serving(to_bytes(&sample_dataset("1.0"))));
        let cancel = CancellationSignal::new();
        cancel.cancel();

        let err = service.refresh(&cancel).await.unwrap_err();

        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(service.state(), AcquisitionState::Absent);
        assert!(!h.store.is_available().unwrap());
    }

    // ------------------------------------------------------------------------
    // QUOTA PRESSURE
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_quota_pressure_runs_cleanup_and_retries() {
        // 20 printings take 851 bytes; two 700 byte cache entries and a
        // mapping leave too little room until one cache entry is evicted.
        let h = Harness::new(2_000);
        let mappings = KeyValueMappingCache::new(h.kv.clone());
        mappings
            .put(&CardMapping::new("E1", "uuid-01", MatchConfidence::certain(), MatchMethod::Direct))
            .unwrap();
        h.kv.set(&StorageKey::catalog_card("F1"), &"a".repeat(685)).unwrap();
        h.kv.set(&StorageKey::catalog_card("F2"), &"b".repeat(685)).unwrap();

        let cleanups = Arc::new(AtomicUsize::new(0));
        let counter = cleanups.clone();
        h.bus.subscribe::<StorageCleanedUp, _>(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let service = h.service(FakeProvider::serving(to_bytes(&numbered_dataset("1.0", 20))));
        let outcome = service.refresh(&CancellationSignal::new()).await.unwrap();

        assert!(matches!(outcome, AcquisitionOutcome::Ingested(_)));
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(h.kv.get(&StorageKey::catalog_card("F1")).unwrap(), None);
        assert!(h.kv.get(&StorageKey::catalog_card("F2")).unwrap().is_some());
        assert_eq!(mappings.get("E1").unwrap().unwrap().reference_id, "uuid-01");
    }

    #[tokio::test]
    async fn test_quota_failure_after_cleanup_is_terminal() {
        let h = Harness::new(1_000);
        h.seed(&numbered_dataset("1.0", 1));
        let mappings = KeyValueMappingCache::new(h.kv.clone());
        mappings
            .put(&CardMapping::new("E1", "uuid-00", MatchConfidence::certain(), MatchMethod::Direct))
            .unwrap();
        h.kv.set(&StorageKey::catalog_search("bolt"), "[]").unwrap();

        let service = h.service(FakeProvider::serving(to_bytes(&numbered_dataset("2.0", 40))));
        let err = service.refresh(&CancellationSignal::new()).await.unwrap_err();

        assert!(err.is_quota_exceeded());
        match service.state() {
            AcquisitionState::Error(message) => assert!(message.contains("Free up space")),
            other => panic!("unexpected state: {:?}", other),
        }
        assert_eq!(h.version().as_deref(), Some("1.0"));
        assert!(mappings.get("E1").unwrap().is_some());
    }
}
