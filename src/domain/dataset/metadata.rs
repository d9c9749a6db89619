// src/domain/dataset/metadata.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Describes the dataset currently held by the store.
///
/// Drives staleness checks and skip-vs-redownload decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    /// `meta.version` from the provider
    pub version: String,

    /// `meta.date` from the provider, if present
    pub published_date: Option<String>,

    /// When this dataset was ingested locally
    pub ingest_date: DateTime<Utc>,

    pub total_printings: u64,
    pub total_sets: u64,

    /// Quota footprint of the stored dataset
    pub size_bytes: u64,

    /// Hex SHA-256 of the downloaded blob
    pub content_hash: String,
}

impl DatasetMetadata {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.ingest_date
    }

    /// True once the dataset is older than the freshness window.
    pub fn is_stale(&self, now: DateTime<Utc>, freshness_window: Duration) -> bool {
        self.age(now) > freshness_window
    }
}

/// Outcome of one successful ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub metadata: DatasetMetadata,

    /// Cards dropped for missing uuid or name
    pub skipped_printings: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata_ingested_at(ingest_date: DateTime<Utc>) -> DatasetMetadata {
        DatasetMetadata {
            version: "5.2.2".to_string(),
            published_date: Some("2024-06-01".to_string()),
            ingest_date,
            total_printings: 1,
            total_sets: 1,
            size_bytes: 64,
            content_hash: "abc".to_string(),
        }
    }

    #[test]
    fn test_fresh_dataset() {
        let now = Utc::now();
        let meta = metadata_ingested_at(now - Duration::days(2));
        assert!(!meta.is_stale(now, Duration::days(7)));
    }

    #[test]
    fn test_stale_dataset() {
        let now = Utc::now();
        let meta = metadata_ingested_at(now - Duration::days(8));
        assert!(meta.is_stale(now, Duration::days(7)));
        assert_eq!(meta.age(now).num_days(), 8);
    }
}
