// src/integrations/mod.rs
//
// External Integrations
//
// Collaborators outside this crate: the live card catalog and the bulk
// dataset download. Integrations return plain data and never touch storage.

pub mod bulk_provider;
pub mod catalog;

pub use bulk_provider::{
    client::DEFAULT_DATASET_URL, BulkDatasetProvider, DownloadProgress, HttpBulkDatasetProvider,
};
pub use catalog::CatalogService;
