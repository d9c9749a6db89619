// src/domain/dataset/blob.rs
//
// The bulk dataset as delivered by the provider.
//
// Wire shape (preserved exactly):
//
//   {
//     "meta": { "version": "...", "date": "YYYY-MM-DD" },
//     "data": {
//       "<SETCODE>": {
//         "name": "...", "code": "...",
//         "cards": [
//           { "uuid", "name", "setCode", "number", "rarity",
//             "identifiers": { "externalIdHint" | "scryfallId" },
//             "prices": { "<date>": <price> } }
//         ]
//       }
//     }
//   }
//
// The envelope is validated up front. Sets stay as raw JSON and are decoded
// one at a time, so ingestion never holds every typed printing at once.

use serde::Deserialize;
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::domain::card::{validate_printing, PricePoint, ReferencePrinting, ReferenceSet};
use crate::error::{AppError, AppResult};

// ============================================================================
// WIRE STRUCTURES
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    meta: Option<RawMeta>,
    data: Option<Box<RawValue>>,
}

#[derive(Debug, Deserialize)]
struct RawMeta {
    version: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSet {
    name: Option<String>,
    code: Option<String>,
    cards: Vec<Box<RawValue>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCard {
    uuid: Option<String>,
    name: Option<String>,
    set_code: Option<String>,
    number: Option<String>,
    rarity: Option<String>,
    identifiers: Option<RawIdentifiers>,
    prices: Option<BTreeMap<String, Option<f64>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIdentifiers {
    external_id_hint: Option<String>,

    /// MTGJSON's name for the catalog id; `externalIdHint` wins when both are present
    scryfall_id: Option<String>,
}

impl RawIdentifiers {
    fn hint(self) -> Option<String> {
        let non_blank = |id: &String| !id.trim().is_empty();
        self.external_id_hint
            .filter(non_blank)
            .or(self.scryfall_id.filter(non_blank))
    }
}

// ============================================================================
// VALIDATED BLOB
// ============================================================================

/// `meta` block of a validated blob.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobMeta {
    pub version: String,
    pub date: Option<String>,
}

/// A downloaded dataset whose envelope passed validation.
#[derive(Debug)]
pub struct DatasetBlob {
    meta: BlobMeta,
    sets: BTreeMap<String, Box<RawValue>>,
    content_hash: String,
    byte_len: usize,
}

impl DatasetBlob {
    /// Validate the envelope of a downloaded blob.
    ///
    /// Fails with `MalformedDataset` when the bytes are not JSON, when `meta`
    /// or `data` is missing, when `meta.version` is empty, or when `data` is
    /// not an object.
    pub fn parse(bytes: &[u8]) -> AppResult<Self> {
        let envelope: RawEnvelope = serde_json::from_slice(bytes)
            .map_err(|e| AppError::MalformedDataset(format!("not a JSON object: {}", e)))?;

        let meta = envelope
            .meta
            .ok_or_else(|| AppError::MalformedDataset("missing 'meta' key".to_string()))?;
        let data = envelope
            .data
            .ok_or_else(|| AppError::MalformedDataset("missing 'data' key".to_string()))?;

        let version = meta
            .version
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::MalformedDataset("missing 'meta.version'".to_string()))?;

        let sets: BTreeMap<String, Box<RawValue>> = serde_json::from_str(data.get())
            .map_err(|e| AppError::MalformedDataset(format!("'data' is not a set map: {}", e)))?;

        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let content_hash = format!("{:x}", hasher.finalize());

        Ok(Self {
            meta: BlobMeta {
                version,
                date: meta.date,
            },
            sets,
            content_hash,
            byte_len: bytes.len(),
        })
    }

    pub fn meta(&self) -> &BlobMeta {
        &self.meta
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    /// Decode sets lazily, in set-code order.
    ///
    /// A set that is not an object with a `cards` array yields
    /// `MalformedDataset`. Individual cards that fail to decode or validate
    /// are skipped and counted in `ReferenceSet::skipped`.
    pub fn decode_sets(&self) -> impl Iterator<Item = AppResult<ReferenceSet>> + '_ {
        self.sets
            .iter()
            .map(|(key, raw)| Self::decode_set(key, raw))
    }

    fn decode_set(key: &str, raw: &RawValue) -> AppResult<ReferenceSet> {
        let set: RawSet = serde_json::from_str(raw.get())
            .map_err(|e| AppError::MalformedDataset(format!("set '{}': {}", key, e)))?;

        let code = set
            .code
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| key.to_string())
            .trim()
            .to_uppercase();
        let name = set.name.unwrap_or_else(|| code.clone());

        let mut printings = Vec::with_capacity(set.cards.len());
        let mut skipped = 0;

        for raw_card in &set.cards {
            match Self::decode_card(&code, raw_card) {
                Some(printing) => printings.push(printing),
                None => skipped += 1,
            }
        }

        Ok(ReferenceSet {
            code,
            name,
            printings,
            skipped,
        })
    }

    fn decode_card(set_code: &str, raw: &RawValue) -> Option<ReferencePrinting> {
        let card: RawCard = match serde_json::from_str(raw.get()) {
            Ok(card) => card,
            Err(e) => {
                log::warn!("Skipping undecodable card in set {}: {}", set_code, e);
                return None;
            }
        };

        let prices = card
            .prices
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(date, price)| price.map(|price| PricePoint { date, price }))
            .collect();

        let printing = ReferencePrinting {
            reference_id: card.uuid?.trim().to_string(),
            name: card.name?,
            set_code: card
                .set_code
                .filter(|c| !c.trim().is_empty())
                .map(|c| c.trim().to_uppercase())
                .unwrap_or_else(|| set_code.to_string()),
            collector_number: card.number.unwrap_or_default(),
            rarity: card.rarity,
            external_id_hint: card.identifiers.and_then(RawIdentifiers::hint),
            prices,
        };

        match validate_printing(&printing) {
            Ok(()) => Some(printing),
            Err(e) => {
                log::debug!("Skipping invalid printing in set {}: {}", set_code, e);
                None
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
