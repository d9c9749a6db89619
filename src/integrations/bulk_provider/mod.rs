// src/integrations/bulk_provider/mod.rs
//
// Bulk Dataset Provider
//
// Source of the downloadable dataset blob. The provider only fetches bytes;
// validation and ingestion belong to the acquisition service.

pub mod client;

use async_trait::async_trait;

use crate::error::AppResult;

pub use client::HttpBulkDatasetProvider;

/// Byte progress of one download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub bytes_received: u64,

    /// From Content-Length, when the server sends one
    pub total_bytes: Option<u64>,
}

impl DownloadProgress {
    /// 0..=100, `None` when the total is unknown
    pub fn percent(&self) -> Option<u8> {
        match self.total_bytes {
            Some(0) => Some(100),
            Some(total) => Some(((self.bytes_received.min(total) * 100) / total) as u8),
            None => None,
        }
    }
}

#[async_trait]
pub trait BulkDatasetProvider: Send + Sync {
    /// Human-readable origin, used in logs and progress messages
    fn source(&self) -> &str;

    /// Download the full blob.
    ///
    /// Dropping the returned future aborts the download.
    async fn fetch(
        &self,
        on_progress: &(dyn Fn(DownloadProgress) + Send + Sync),
    ) -> AppResult<Vec<u8>>;
}
