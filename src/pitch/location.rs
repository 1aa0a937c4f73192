use std::sync::Arc;

use crate::types::{BatterSide, LocationType, ParsedLocation};

/// Rewrites a location label for the batter's side before it is cleaned.
pub trait LabelAdjuster: Send + Sync {
    fn adjust(&self, raw: &str, side: BatterSide) -> String;
}

impl<F> LabelAdjuster for F
where
    F: Fn(&str, BatterSide) -> String + Send + Sync,
{
    fn adjust(&self, raw: &str, side: BatterSide) -> String {
        self(raw, side)
    }
}

/// Leaves labels untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAdjust;

impl LabelAdjuster for NoAdjust {
    fn adjust(&self, raw: &str, _side: BatterSide) -> String {
        raw.to_string()
    }
}

/// Swaps whole words (case-insensitive) for left-handed batters.
///
/// Words are split on single spaces so the separators, runs of spaces included,
/// survive the rewrite exactly.
#[derive(Debug, Clone)]
pub struct WordSwapAdjuster {
    pairs: Vec<(String, String)>,
}

impl WordSwapAdjuster {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        let pairs = pairs
            .into_iter()
            .map(|(a, b)| (a.to_lowercase(), b.to_lowercase()))
            .collect();
        Self { pairs }
    }

    fn swap_word<'a>(&'a self, word: &'a str) -> &'a str {
        let lower = word.to_lowercase();
        for (a, b) in &self.pairs {
            if lower == *a {
                return b;
            }
            if lower == *b {
                return a;
            }
        }
        word
    }
}

impl LabelAdjuster for WordSwapAdjuster {
    fn adjust(&self, raw: &str, side: BatterSide) -> String {
        if side == BatterSide::Right || self.pairs.is_empty() {
            return raw.to_string();
        }
        raw.split(' ')
            .map(|w| self.swap_word(w))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Canonicalizes free-text location labels into `(zone, type)`.
#[derive(Clone)]
pub struct LocationNormalizer {
    adjuster: Arc<dyn LabelAdjuster>,
}

impl LocationNormalizer {
    pub fn new(adjuster: Arc<dyn LabelAdjuster>) -> Self {
        Self { adjuster }
    }

    pub fn normalize(&self, raw: &str, side: BatterSide) -> ParsedLocation {
        let adjusted = self.adjuster.adjust(raw, side);
        let cleaned = clean_label(&adjusted);

        if let Some(rest) = cleaned.strip_prefix("strike ") {
            return ParsedLocation {
                location_type: Some(LocationType::Strike),
                zone: rest.trim().to_string(),
            };
        }
        if let Some(rest) = cleaned.strip_prefix("ball ") {
            return ParsedLocation {
                location_type: Some(LocationType::Ball),
                zone: rest.trim().to_string(),
            };
        }
        ParsedLocation { location_type: None, zone: cleaned }
    }
}

impl Default for LocationNormalizer {
    fn default() -> Self {
        Self::new(Arc::new(NoAdjust))
    }
}

/// Dashes become spaces, `&` becomes `and`, then one non-repeating pass turns
/// each `"  "` into `" "` before trimming and lowercasing. Runs of three or more
/// spaces therefore keep some of their width.
fn clean_label(label: &str) -> String {
    label
        .replace(['\u{2014}', '\u{2013}', '-'], " ")
        .replace('&', "and")
        .replace("  ", " ")
        .trim()
        .to_lowercase()
}
