// src/domain/similarity.rs
//
// Name normalization and edit-distance similarity.
//
// Pure functions, no I/O. Comparisons run on Unicode code points after NFC
// composition, so "é" typed as one code point or as "e" + combining acute
// counts as the same single unit.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Edit distance used by `similarity`.
///
/// The default is `OptimalStringAlignment`. "lightning blot" against
/// "lightning bolt" then scores 13/14 and clears the 0.9 fuzzy threshold,
/// giving a fuzzy confidence of 13/14 * 0.8 ≈ 0.743. Under `Levenshtein` the
/// same pair scores 12/14 ≈ 0.857 and is rejected; choose it to count a
/// transposition as two edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditDistance {
    /// Insertions, deletions and substitutions
    Levenshtein,

    /// Levenshtein plus adjacent transpositions ("blot" -> "bolt" is one edit)
    #[default]
    OptimalStringAlignment,
}

impl EditDistance {
    pub fn distance(&self, a: &str, b: &str) -> usize {
        match self {
            EditDistance::Levenshtein => strsim::levenshtein(a, b),
            EditDistance::OptimalStringAlignment => strsim::osa_distance(a, b),
        }
    }
}

/// Normalize a card name for comparison.
///
/// NFC compose, lowercase, drop everything that is not a letter, digit or
/// whitespace, collapse whitespace runs, trim.
pub fn normalize_name(name: &str) -> String {
    let composed: String = name.nfc().collect();

    let kept: String = composed
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity of two already-normalized names in [0, 1].
///
/// `1 - distance / max(len(a), len(b))` over code points. Two empty strings
/// are identical; empty against non-empty scores 0.
pub fn similarity(a: &str, b: &str, metric: EditDistance) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }

    let distance = metric.distance(a, b);
    1.0 - distance as f64 / longest as f64
}

// ============================================================================
// TESTS
// ============================================================================
