// src/domain/dataset/mod.rs
//
// Bulk dataset value objects: the provider's blob as validated at the
// ingestion boundary, and the metadata describing what is currently stored.

pub mod blob;
pub mod metadata;

pub use blob::{BlobMeta, DatasetBlob};
pub use metadata::{DatasetMetadata, IngestReport};
