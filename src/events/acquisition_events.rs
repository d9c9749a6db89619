// src/events/acquisition_events.rs
//
// Progress reporting for dataset acquisition.
//
// One `AcquisitionProgressed` is emitted on every stage change and on every
// download progress tick. Listeners render them; nothing else depends on them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::DomainEvent;

/// Acquisition pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionStage {
    Checking,
    Downloading,
    Processing,
    Complete,
    Error,
}

impl AcquisitionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Downloading => "downloading",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for AcquisitionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionProgressed {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub stage: AcquisitionStage,
    /// 0..=100
    pub percent: u8,
    pub message: String,
}

impl AcquisitionProgressed {
    pub fn new(stage: AcquisitionStage, percent: u8, message: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            stage,
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

impl DomainEvent for AcquisitionProgressed {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "AcquisitionProgressed" }
}
