// src/domain/mapping/mod.rs

pub mod entity;

pub use entity::{validate_mapping, CardMapping, MappingStats, MatchConfidence, MatchMethod};
