// src/domain/card/entity.rs
//
// Card records on both sides of reconciliation.
//
// ExternalCardRecord comes from the live catalog and is request-scoped.
// ReferencePrinting belongs to the bulk dataset and is immutable once
// ingested; a dataset refresh replaces every printing wholesale.

use serde::{Deserialize, Serialize};

/// Opaque, globally unique id of a printing in the bulk dataset.
pub type ReferenceId = String;

/// A card as known by the live catalog service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCardRecord {
    /// Catalog id, stable per printing
    pub external_id: String,

    /// Display name, may contain non-ASCII characters
    pub name: String,

    pub set_code: String,

    /// May be alphanumeric ("12a", "★3")
    pub collector_number: String,

    pub price_usd: Option<f64>,
}

impl ExternalCardRecord {
    pub fn new(
        external_id: impl Into<String>,
        name: impl Into<String>,
        set_code: impl Into<String>,
        collector_number: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            name: name.into(),
            set_code: set_code.into(),
            collector_number: collector_number.into(),
            price_usd: None,
        }
    }

    pub fn with_price(mut self, price_usd: f64) -> Self {
        self.price_usd = Some(price_usd);
        self
    }
}

/// One dated price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// ISO date (YYYY-MM-DD) as published by the provider
    pub date: String,
    pub price: f64,
}

/// One printing in the bulk reference dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencePrinting {
    pub reference_id: ReferenceId,
    pub name: String,

    /// Stored upper-case
    pub set_code: String,
    pub collector_number: String,
    pub rarity: Option<String>,

    /// Copy of the catalog's id for the same printing, when the dataset has one
    pub external_id_hint: Option<String>,

    /// Ordered by date; empty when the dataset carries no prices
    pub prices: Vec<PricePoint>,
}

impl ReferencePrinting {
    /// Bytes this printing occupies for quota accounting.
    ///
    /// Counts every stored text column, the normalized name, and 16 bytes
    /// per price point.
    pub fn storage_footprint(&self, normalized_name: &str) -> u64 {
        let text = self.reference_id.len()
            + self.name.len()
            + normalized_name.len()
            + self.set_code.len()
            + self.collector_number.len()
            + self.rarity.as_deref().map_or(0, str::len)
            + self.external_id_hint.as_deref().map_or(0, str::len);
        (text + self.prices.len() * 16) as u64
    }
}

/// Printings sharing a set code. Only exists as an ingestion grouping.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSet {
    pub code: String,
    pub name: String,
    pub printings: Vec<ReferencePrinting>,

    /// Cards dropped while decoding (missing uuid or name)
    pub skipped: usize,
}

impl ReferenceSet {
    pub fn storage_footprint(&self) -> u64 {
        (self.code.len() + self.name.len()) as u64
    }
}
