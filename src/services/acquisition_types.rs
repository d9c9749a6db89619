// src/services/acquisition_types.rs
//
// Acquisition Types
//
// State machine and results of dataset acquisition.
//
//   Absent -> Downloading -> Ingesting -> Ready
//   Ready  -> Downloading (explicit refresh only)
//   Downloading | Ingesting -> Error     (prior dataset untouched)
//   Downloading | Ingesting -> prior     (on cancellation)
//   Error  -> Downloading (caller retry)

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::domain::{DatasetMetadata, IngestReport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum AcquisitionState {
    Absent,
    Downloading,
    Ingesting,
    Ready,

    /// Last attempt failed; the message is meant for the user
    Error(String),
}

impl AcquisitionState {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Downloading | Self::Ingesting)
    }
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Downloading => write!(f, "downloading"),
            Self::Ingesting => write!(f, "ingesting"),
            Self::Ready => write!(f, "ready"),
            Self::Error(message) => write!(f, "error: {}", message),
        }
    }
}

/// Snapshot for status displays and refresh decisions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStatus {
    pub state: AcquisitionState,
    pub available: bool,
    pub metadata: Option<DatasetMetadata>,

    /// True when a dataset exists and is older than the freshness window
    pub is_stale: bool,
    pub checked_at: DateTime<Utc>,
}

impl DatasetStatus {
    /// Whether `ensure_dataset` would download
    pub fn needs_download(&self) -> bool {
        !self.available || self.is_stale
    }
}

/// How a successful acquisition ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionOutcome {
    /// A new dataset was committed
    Ingested(IngestReport),

    /// The download matched the stored dataset byte for byte
    Unchanged(DatasetMetadata),

    /// The stored dataset is fresh; nothing was downloaded
    AlreadyFresh(DatasetMetadata),
}

impl AcquisitionOutcome {
    pub fn metadata(&self) -> &DatasetMetadata {
        match self {
            Self::Ingested(report) => &report.metadata,
            Self::Unchanged(metadata) | Self::AlreadyFresh(metadata) => metadata,
        }
    }
}
