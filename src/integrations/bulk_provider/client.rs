// src/integrations/bulk_provider/client.rs
//
// HTTP bulk dataset download
//
// ARCHITECTURE:
// - Plain GET against a static file URL (MTGJSON-style AllPrintings)
// - Body streamed chunk by chunk so progress can be reported
// - Transport failures and non-2xx statuses become `AppError::Network`
//
// RULES:
// - No parsing here; bytes are handed back untouched
// - No retries; retry policy belongs to the caller

use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;

use super::{BulkDatasetProvider, DownloadProgress};
use crate::error::{AppError, AppResult};

pub const DEFAULT_DATASET_URL: &str = "https://mtgjson.com/api/v5/AllPrintings.json";

/// Emit a progress update at most once per this many bytes
const PROGRESS_STEP_BYTES: u64 = 1024 * 1024;

/// Upper bound for trusting Content-Length when preallocating
const MAX_PREALLOCATION: u64 = 1024 * 1024 * 1024;

pub struct HttpBulkDatasetProvider {
    url: String,
    http_client: Client,
}

impl HttpBulkDatasetProvider {
    pub fn new(url: impl Into<String>) -> AppResult<Self> {
        // No overall timeout: a full download can take minutes
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("cardvault/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            http_client,
        })
    }
}

#[async_trait]
impl BulkDatasetProvider for HttpBulkDatasetProvider {
    fn source(&self) -> &str {
        &self.url
    }

    async fn fetch(
        &self,
        on_progress: &(dyn Fn(DownloadProgress) + Send + Sync),
    ) -> AppResult<Vec<u8>> {
        let mut response = self
            .http_client
            .get(&self.url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Dataset request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Network(format!(
                "Dataset server returned status: {}",
                response.status()
            )));
        }

        let total_bytes = response.content_length();
        let mut body = Vec::with_capacity(total_bytes.unwrap_or(0).min(MAX_PREALLOCATION) as usize);
        let mut last_reported: u64 = 0;

        on_progress(DownloadProgress {
            bytes_received: 0,
            total_bytes,
        });

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AppError::Network(format!("Dataset download interrupted: {}", e)))?
        {
            body.extend_from_slice(&chunk);

            let received = body.len() as u64;
            if received - last_reported >= PROGRESS_STEP_BYTES {
                last_reported = received;
                on_progress(DownloadProgress {
                    bytes_received: received,
                    total_bytes,
                });
            }
        }

        on_progress(DownloadProgress {
            bytes_received: body.len() as u64,
            total_bytes,
        });

        log::info!("Downloaded {} bytes from {}", body.len(), self.url);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = HttpBulkDatasetProvider::new(DEFAULT_DATASET_URL).unwrap();
        assert_eq!(provider.source(), DEFAULT_DATASET_URL);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        // Port 9 on localhost is not expected to serve HTTP
        let provider = HttpBulkDatasetProvider::new("http://127.0.0.1:9/AllPrintings.json").unwrap();
        let err = provider.fetch(&|_: DownloadProgress| {}).await.unwrap_err();
        assert!(matches!(err, AppError::Network(_)));
    }
}
