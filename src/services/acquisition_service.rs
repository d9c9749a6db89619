// src/services/acquisition_service.rs
//
// Dataset Acquisition Service
//
// Decides when to download the bulk dataset, drives the download, and
// hands the blob to the dataset store.
//
// RULES:
// - One acquisition runs at a time
// - A failed or cancelled acquisition never touches the stored dataset
// - Staleness never triggers a download on its own; callers decide
// - On QuotaExceeded: one cleanup through the janitor, one retry, then Error
// - Progress goes out as AcquisitionProgressed events, stage by stage and
//   set by set while ingesting

use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::{DatasetBlob, IngestReport};
use crate::error::{AppError, AppResult};
use crate::events::{AcquisitionProgressed, AcquisitionStage, DatasetIngested, EventBus};
use crate::infrastructure::{CancellationSignal, IngestProgress, StorageJanitor};
use crate::integrations::{BulkDatasetProvider, DownloadProgress};
use crate::repositories::BulkDatasetStore;
use crate::services::acquisition_types::{AcquisitionOutcome, AcquisitionState, DatasetStatus};

pub const DEFAULT_FRESHNESS_DAYS: i64 = 7;

// Share of the processing stage covered by per-set ingestion progress
const INGEST_START_PERCENT: usize = 10;
const INGEST_SPAN_PERCENT: usize = 80;

pub struct DatasetAcquisitionService {
    dataset: Arc<dyn BulkDatasetStore>,
    provider: Arc<dyn BulkDatasetProvider>,
    janitor: Arc<StorageJanitor>,
    event_bus: Arc<EventBus>,
    freshness_window: Duration,
    state: Mutex<AcquisitionState>,
    in_flight: tokio::sync::Mutex<()>,
}

impl DatasetAcquisitionService {
    pub fn new(
        dataset: Arc<dyn BulkDatasetStore>,
        provider: Arc<dyn BulkDatasetProvider>,
        janitor: Arc<StorageJanitor>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let initial = match dataset.is_available() {
            Ok(true) => AcquisitionState::Ready,
            Ok(false) => AcquisitionState::Absent,
            Err(e) => {
                log::warn!("Could not read dataset state: {}", e);
                AcquisitionState::Absent
            }
        };

        Self {
            dataset,
            provider,
            janitor,
            event_bus,
            freshness_window: Duration::days(DEFAULT_FRESHNESS_DAYS),
            state: Mutex::new(initial),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_freshness_window(mut self, freshness_window: Duration) -> Self {
        self.freshness_window = freshness_window;
        self
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn check_status(&self) -> AppResult<DatasetStatus> {
        let now = Utc::now();
        let metadata = self.dataset.get_stats()?;
        let is_stale = metadata
            .as_ref()
            .is_some_and(|meta| meta.is_stale(now, self.freshness_window));

        Ok(DatasetStatus {
            state: self.state(),
            available: metadata.is_some(),
            metadata,
            is_stale,
            checked_at: now,
        })
    }

    /// Download only when no dataset is stored or the stored one is stale.
    pub async fn ensure_dataset(&self, cancel: &CancellationSignal) -> AppResult<AcquisitionOutcome> {
        let _guard = self.in_flight.lock().await;

        self.progress(AcquisitionStage::Checking, 0, "Checking stored dataset");
        let status = self.check_status()?;

        if let (false, Some(metadata)) = (status.needs_download(), status.metadata) {
            log::info!("Dataset {} is fresh, skipping download", metadata.version);
            self.set_state(AcquisitionState::Ready);
            self.progress(AcquisitionStage::Complete, 100, "Dataset is up to date");
            return Ok(AcquisitionOutcome::AlreadyFresh(metadata));
        }

        self.acquire(cancel).await
    }

    /// Download and ingest unconditionally.
    pub async fn refresh(&self, cancel: &CancellationSignal) -> AppResult<AcquisitionOutcome> {
        let _guard = self.in_flight.lock().await;

        self.progress(AcquisitionStage::Checking, 0, "Checking stored dataset");
        self.acquire(cancel).await
    }

    // ========================================================================
    // PIPELINE
    // ========================================================================

    async fn acquire(&self, cancel: &CancellationSignal) -> AppResult<AcquisitionOutcome> {
        let previous = self.dataset.get_stats()?;
        let prior_state = if previous.is_some() {
            AcquisitionState::Ready
        } else {
            AcquisitionState::Absent
        };

        // Download
        self.set_state(AcquisitionState::Downloading);
        self.progress(
            AcquisitionStage::Downloading,
            0,
            format!("Downloading dataset from {}", self.provider.source()),
        );

        let bytes = match self.download(cancel).await {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.fail(e, prior_state)),
        };

        // Validate
        self.set_state(AcquisitionState::Ingesting);
        self.progress(AcquisitionStage::Processing, 0, "Validating dataset");

        let blob = match Self::parse(bytes).await {
            Ok(blob) => Arc::new(blob),
            Err(e) => return Err(self.fail(e, prior_state)),
        };

        if let Some(previous) = previous {
            if previous.content_hash == blob.content_hash() {
                log::info!("Downloaded dataset matches stored version {}", previous.version);
                self.set_state(AcquisitionState::Ready);
                self.progress(AcquisitionStage::Complete, 100, "Dataset unchanged");
                return Ok(AcquisitionOutcome::Unchanged(previous));
            }
        }

        // Ingest
        self.progress(
            AcquisitionStage::Processing,
            10,
            format!("Storing {} sets", blob.set_count()),
        );

        let report = match self.ingest_with_cleanup(blob, cancel).await {
            Ok(report) => report,
            Err(e) => return Err(self.fail(e, prior_state)),
        };

        let metadata = &report.metadata;
        self.set_state(AcquisitionState::Ready);
        self.event_bus.emit(DatasetIngested::new(
            metadata.version.clone(),
            metadata.total_printings,
            metadata.total_sets,
            metadata.size_bytes,
        ));
        self.progress(
            AcquisitionStage::Complete,
            100,
            format!(
                "Dataset {} ready: {} printings in {} sets",
                metadata.version, metadata.total_printings, metadata.total_sets
            ),
        );

        Ok(AcquisitionOutcome::Ingested(report))
    }

    async fn download(&self, cancel: &CancellationSignal) -> AppResult<Vec<u8>> {
        let event_bus = self.event_bus.clone();
        let on_progress = move |progress: DownloadProgress| {
            let message = match progress.total_bytes {
                Some(total) => format!("{} of {} bytes", progress.bytes_received, total),
                None => format!("{} bytes", progress.bytes_received),
            };
            event_bus.emit(AcquisitionProgressed::new(
                AcquisitionStage::Downloading,
                progress.percent().unwrap_or(0),
                message,
            ));
        };

        tokio::select! {
            result = self.provider.fetch(&on_progress) => result,
            _ = cancel.cancelled() => Err(AppError::Cancelled),
        }
    }

    async fn parse(bytes: Vec<u8>) -> AppResult<DatasetBlob> {
        tokio::task::spawn_blocking(move || DatasetBlob::parse(&bytes))
            .await
            .map_err(|e| AppError::Other(format!("Dataset validation task failed: {}", e)))?
    }

    async fn ingest(
        &self,
        blob: Arc<DatasetBlob>,
        cancel: &CancellationSignal,
    ) -> AppResult<IngestReport> {
        let dataset = self.dataset.clone();
        let cancel = cancel.clone();
        let progress = self.ingest_progress();

        tokio::task::spawn_blocking(move || dataset.store_dataset(&blob, &cancel, &progress))
            .await
            .map_err(|e| AppError::Other(format!("Dataset ingestion task failed: {}", e)))?
    }

    /// Processing events from 10% to 90%, one per percent step.
    fn ingest_progress(&self) -> IngestProgress {
        let event_bus = self.event_bus.clone();
        let last_percent = AtomicU8::new(u8::MAX);

        IngestProgress::new(move |sets_done, sets_total| {
            let share = sets_done.min(sets_total) * INGEST_SPAN_PERCENT / sets_total.max(1);
            let percent = (INGEST_START_PERCENT + share) as u8;

            if last_percent.swap(percent, Ordering::Relaxed) != percent {
                event_bus.emit(AcquisitionProgressed::new(
                    AcquisitionStage::Processing,
                    percent,
                    format!("Stored {} of {} sets", sets_done, sets_total),
                ));
            }
        })
    }

    async fn ingest_with_cleanup(
        &self,
        blob: Arc<DatasetBlob>,
        cancel: &CancellationSignal,
    ) -> AppResult<IngestReport> {
        let error = match self.ingest(blob.clone(), cancel).await {
            Err(e) if e.is_quota_exceeded() => e,
            other => return other,
        };

        // SQLITE_FULL carries no size; free everything evictable then
        let shortfall = match error.bytes_short() {
            Some(0) | None => u64::MAX,
            Some(bytes) => bytes,
        };

        log::warn!("Dataset does not fit ({}), running storage cleanup", error);
        self.progress(AcquisitionStage::Processing, 50, "Freeing storage space");

        let cleanup = self.janitor.free_space(shortfall)?;
        if cleanup.entries_evicted == 0 {
            return Err(error);
        }

        self.progress(AcquisitionStage::Processing, 60, "Retrying dataset storage");
        self.ingest(blob, cancel).await
    }

    // ========================================================================
    // STATE AND PROGRESS
    // ========================================================================

    fn set_state(&self, state: AcquisitionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn progress(&self, stage: AcquisitionStage, percent: u8, message: impl Into<String>) {
        let message = message.into();
        log::debug!("[{}] {}% {}", stage, percent, message);
        self.event_bus
            .emit(AcquisitionProgressed::new(stage, percent, message));
    }

    /// Record a failed attempt and hand the error back.
    ///
    /// Cancellation returns to the state before the attempt; anything else
    /// ends in `Error`.
    fn fail(&self, error: AppError, prior_state: AcquisitionState) -> AppError {
        let message = Self::user_message(&error);
        log::warn!("Dataset acquisition failed: {}", error);

        match error {
            AppError::Cancelled => self.set_state(prior_state),
            _ => self.set_state(AcquisitionState::Error(message.clone())),
        }
        self.progress(AcquisitionStage::Error, 0, message);

        error
    }

    fn user_message(error: &AppError) -> String {
        match error {
            AppError::QuotaExceeded { required, available } if *required > 0 => format!(
                "Not enough storage for the dataset ({} bytes needed, {} available). Free up space and retry.",
                required, available
            ),
            AppError::QuotaExceeded { .. } => {
                "Not enough storage for the dataset. Free up space and retry.".to_string()
            }
            AppError::MalformedDataset(reason) => {
                format!("The downloaded dataset is invalid: {}", reason)
            }
            AppError::Network(reason) => format!("Download failed: {}", reason),
            AppError::Cancelled => "Dataset download cancelled".to_string(),
            other => other.to_string(),
        }
    }
}
