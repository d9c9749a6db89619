// src/infrastructure/ingest_progress.rs
//
// Per-set progress reporting for dataset ingestion.
//
// Ingestion runs on a blocking thread, so the callback must be Send + Sync.
// Clones share the callback.

use std::fmt;
use std::sync::Arc;

type SetCallback = dyn Fn(usize, usize) + Send + Sync;

#[derive(Clone, Default)]
pub struct IngestProgress {
    on_set: Option<Arc<SetCallback>>,
}

impl IngestProgress {
    /// Called with (sets done, total sets) after each set is stored
    pub fn new(on_set: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        Self {
            on_set: Some(Arc::new(on_set)),
        }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn report(&self, sets_done: usize, sets_total: usize) {
        if let Some(on_set) = &self.on_set {
            on_set(sets_done, sets_total);
        }
    }
}

impl fmt::Debug for IngestProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestProgress")
            .field("reporting", &self.on_set.is_some())
            .finish()
    }
}
